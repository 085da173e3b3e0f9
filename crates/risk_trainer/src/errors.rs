use pet_risk_core::ArtifactError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the training pipeline. All of them abort the run.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("no dataset matching pet_health_dataset_*.csv in {}", dir.display())]
    NoDataset { dir: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

impl TrainerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrainerError::Io {
            path: path.into(),
            source,
        }
    }
}
