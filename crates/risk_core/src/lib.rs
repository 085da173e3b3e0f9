//! Pet health risk assessment core
//!
//! Validates caller observations against a static schema registry, fills
//! them into the feature schema recorded with a trained model, and runs
//! versioned model artifacts to produce a four-level risk category with
//! safety flags.
//!
//! Modules:
//! - `schema`: Field registry (ranges, category sets, defaults)
//! - `validation`: Input validator
//! - `features`: Observation records and feature normalization
//! - `preprocess`: Standardization / one-hot encoding fitted with each model
//! - `models`: Classifier families, target encoder, inference bundle
//! - `artifacts`: Versioned artifact discovery, loading and persistence
//! - `prediction`: Prediction engine with safety fallback
//! - `types`: Risk categories, assessments and response payloads
//! - `config`, `logging`: Service configuration and tracing setup

pub mod artifacts;
pub mod config;
pub mod errors;
pub mod features;
pub mod logging;
pub mod models;
pub mod prediction;
pub mod preprocess;
pub mod schema;
pub mod types;
pub mod validation;

pub use artifacts::{
    discover_latest, load_version, persist, ArtifactMetadata, ArtifactSet, ArtifactStore,
    FeatureImportance, PersistedArtifacts,
};
pub use config::ServiceConfig;
pub use errors::{ArtifactError, PredictionError, ValidationError};
pub use features::{normalize, FeatureVector, ObservationRecord};
pub use models::{ClassifierModel, LabelCodec, ModelBundle, RiskModel, TargetEncoder};
pub use prediction::{assess, PredictionEngine};
pub use preprocess::Preprocessor;
pub use types::{
    FeatureValue, ModelInfo, PerformanceMetrics, PredictionResponse, Readiness, RiskAssessment,
    RiskCategory,
};
pub use validation::validate;

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
