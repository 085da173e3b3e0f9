//! Pet health risk trainer - offline candidate training and selection
//!
//! Loads a labelled observation dataset, fits logistic regression, random
//! forest and gradient boosting candidates behind a shared preprocessing
//! step, picks the winner with a safety-weighted score and emits a
//! versioned artifact set for the prediction service.

pub mod boosting;
pub mod cart;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod forest;
pub mod importance;
pub mod logistic;
pub mod metrics;
pub mod selection;
pub mod split;
pub mod trainer;

use std::path::Path;

pub use boosting::{BoostingConfig, BoostingTrainer};
pub use dataset::{find_latest, resolve_input, Dataset};
pub use deterministic::{seeded_rng, SplitTieBreaker};
pub use errors::TrainerError;
pub use forest::{ForestConfig, ForestTrainer};
pub use importance::rank_importance;
pub use logistic::{fit_logistic, LogisticParams};
pub use metrics::ClassificationReport;
pub use selection::{select_best, selection_score};
pub use split::{stratified_split, Split};
pub use trainer::{
    Candidate, TrainedArtifact, TrainingParams, TrainingPipeline, TrainingResult, TrainingRun,
};

/// Load a CSV dataset and train every candidate on it.
pub fn train_from_csv(path: &Path, params: TrainingParams) -> Result<TrainingRun, TrainerError> {
    let dataset = Dataset::from_csv(path)?;
    TrainingPipeline::new(params).train(&dataset)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
