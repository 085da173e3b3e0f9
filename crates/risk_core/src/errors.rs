//! Error types for the risk assessment core

use std::path::PathBuf;
use thiserror::Error;

/// Caller input rejected by the schema validator.
///
/// The `Display` output is the human-readable reason and is safe to return
/// to the caller as-is.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Request body is not a JSON object
    #[error("Observation must be a JSON object")]
    NotAnObject,

    /// A required field is absent
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Species outside the closed species set
    #[error("Invalid species: {value}")]
    InvalidSpecies { value: String },

    /// Numeric field could not be coerced to a number
    #[error("Invalid {field}: must be numeric")]
    NotNumeric { field: String },

    /// Numeric field outside its inclusive range
    #[error("Invalid {field}: {value} (must be {min}-{max})")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Categorical field outside its closed value set
    #[error("Invalid {field}: {value}")]
    InvalidCategory { field: String, value: String },

    /// Boolean field holding something other than a JSON boolean
    #[error("Invalid {field}: must be boolean")]
    NotBoolean { field: String },
}

impl ValidationError {
    /// Name of the offending field, when the failure is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::NotAnObject => None,
            ValidationError::InvalidSpecies { .. } => Some("species"),
            ValidationError::MissingField { field }
            | ValidationError::NotNumeric { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidCategory { field, .. }
            | ValidationError::NotBoolean { field } => Some(field),
        }
    }
}

/// Failures while discovering, loading or persisting an artifact set.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// No versioned model artifact in the directory
    #[error("No model artifacts found in {}", dir.display())]
    NotFound { dir: PathBuf },

    /// One member of the triple is missing for a version
    #[error("Required artifact missing: {}", path.display())]
    MissingArtifact { path: PathBuf },

    /// Metadata document exists but is not valid
    #[error("Invalid model metadata for version {version}: {reason}")]
    InvalidMetadata { version: String, reason: String },

    /// Metadata has no feature schema
    #[error("Model metadata for version {version} has no feature_names")]
    MissingFeatureNames { version: String },

    /// Members of the triple disagree with each other
    #[error("Inconsistent artifact set {version}: {reason}")]
    Inconsistent { version: String, reason: String },

    /// Persist target already holds a published model for this version
    #[error("Artifact version {version} already exists at {}", path.display())]
    VersionExists { version: String, path: PathBuf },

    /// Model or encoder file could not be decoded
    #[error("Corrupt artifact {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// I/O error
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization error while writing
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ArtifactError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArtifactError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures surfaced by the prediction engine.
#[derive(Error, Debug)]
pub enum PredictionError {
    /// Caller input failed schema validation
    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// No artifact set is loaded
    #[error("Service not ready: no model loaded")]
    NotReady,

    /// Unexpected internal fault during inference
    #[error("Inference failed: {0}")]
    Inference(String),
}

impl PredictionError {
    /// Message that may be shown to the caller. Internal detail of
    /// inference faults is withheld.
    pub fn public_message(&self) -> String {
        match self {
            PredictionError::Validation(e) => e.to_string(),
            PredictionError::NotReady => "Service not ready".to_string(),
            PredictionError::Inference(_) => "Internal service error".to_string(),
        }
    }

    /// True when the caller should fix the request rather than retry.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PredictionError::Validation(_))
    }
}

/// Result type for artifact operations
pub type ArtifactResult<T> = std::result::Result<T, ArtifactError>;
