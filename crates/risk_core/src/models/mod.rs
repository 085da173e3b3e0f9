//! Classifier models and the preprocessing bundle served at inference time
//!
//! Three model families share one interface:
//!
//! - **Logistic regression**: multinomial softmax over a linear score
//! - **Random forest**: bagged classification trees, averaged leaf
//!   class distributions
//! - **Gradient boosting**: one regression tree per class per round over
//!   softmax log-odds
//!
//! A [`ModelBundle`] pairs a fitted [`Preprocessor`] with one classifier so
//! the encoding used at training time is versioned with the model and
//! cannot skew at serving time. The prediction engine only sees the
//! [`RiskModel`] capability, which keeps the concrete algorithm swappable.

pub mod boosting;
pub mod encoder;
pub mod forest;
pub mod logistic;
pub mod tree;

pub use boosting::BoostedModel;
pub use encoder::{LabelCodec, TargetEncoder};
pub use forest::ForestModel;
pub use logistic::LogisticModel;
pub use tree::{Node, Tree};

use crate::features::FeatureVector;
use crate::preprocess::Preprocessor;
use serde::{Deserialize, Serialize};

/// Shared classifier behaviour.
pub trait Classifier {
    fn n_classes(&self) -> usize;

    /// Class probabilities for one encoded input row.
    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, String>;

    /// One importance value per encoded input column.
    fn feature_importances(&self) -> Vec<f64>;

    /// Structural check against the encoded input width.
    fn validate(&self, n_features: usize) -> Result<(), String>;
}

/// Any of the supported classifier families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierModel {
    LogisticRegression(LogisticModel),
    RandomForest(ForestModel),
    GradientBoosting(BoostedModel),
}

impl ClassifierModel {
    /// Candidate name recorded as `model_type` in metadata.
    pub fn model_type(&self) -> &'static str {
        match self {
            ClassifierModel::LogisticRegression(_) => "logistic_regression",
            ClassifierModel::RandomForest(_) => "random_forest",
            ClassifierModel::GradientBoosting(_) => "gradient_boosting",
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            ClassifierModel::LogisticRegression(m) => m,
            ClassifierModel::RandomForest(m) => m,
            ClassifierModel::GradientBoosting(m) => m,
        }
    }
}

impl Classifier for ClassifierModel {
    fn n_classes(&self) -> usize {
        self.inner().n_classes()
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, String> {
        self.inner().predict_proba(x)
    }

    fn feature_importances(&self) -> Vec<f64> {
        self.inner().feature_importances()
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        self.inner().validate(n_features)
    }
}

/// Inference capability consumed by the prediction engine.
pub trait RiskModel: Send + Sync {
    /// Predicted class index and the full probability vector.
    fn predict(&self, features: &FeatureVector) -> Result<(usize, Vec<f64>), String>;
}

/// Preprocessing step plus classifier, persisted as one artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub preprocessor: Preprocessor,
    pub classifier: ClassifierModel,
}

impl ModelBundle {
    pub fn new(preprocessor: Preprocessor, classifier: ClassifierModel) -> Self {
        Self {
            preprocessor,
            classifier,
        }
    }

    pub fn model_type(&self) -> &'static str {
        self.classifier.model_type()
    }

    pub fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>, String> {
        let encoded = self.preprocessor.transform(features)?;
        self.classifier.predict_proba(&encoded)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.classifier.validate(self.preprocessor.output_width())
    }
}

impl RiskModel for ModelBundle {
    fn predict(&self, features: &FeatureVector) -> Result<(usize, Vec<f64>), String> {
        let probabilities = self.predict_proba(features)?;
        let index = argmax(&probabilities).ok_or("model produced no probabilities")?;
        Ok((index, probabilities))
    }
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Numerically stable softmax.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
