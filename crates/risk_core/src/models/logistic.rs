//! Multinomial logistic regression

use super::{softmax, Classifier};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    /// One coefficient row per class
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl LogisticModel {
    /// Zero-initialized model; predicts the uniform distribution.
    pub fn zeros(n_classes: usize, n_features: usize) -> Self {
        Self {
            coefficients: vec![vec![0.0; n_features]; n_classes],
            intercepts: vec![0.0; n_classes],
        }
    }

    /// Linear class scores before the softmax.
    pub fn decision_function(&self, x: &[f64]) -> Vec<f64> {
        self.coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(row, b)| b + row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>())
            .collect()
    }
}

impl Classifier for LogisticModel {
    fn n_classes(&self) -> usize {
        self.intercepts.len()
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, String> {
        let width = self.coefficients.first().map_or(0, Vec::len);
        if x.len() != width {
            return Err(format!("expected {} inputs, got {}", width, x.len()));
        }
        Ok(softmax(&self.decision_function(x)))
    }

    /// Absolute coefficients of the first class row.
    fn feature_importances(&self) -> Vec<f64> {
        self.coefficients
            .first()
            .map(|row| row.iter().map(|w| w.abs()).collect())
            .unwrap_or_default()
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.coefficients.len() != self.intercepts.len() || self.intercepts.is_empty() {
            return Err("coefficient rows and intercepts disagree".to_string());
        }
        if self.coefficients.iter().any(|row| row.len() != n_features) {
            return Err(format!("coefficient rows must have {n_features} columns"));
        }
        if self
            .coefficients
            .iter()
            .flatten()
            .chain(&self.intercepts)
            .any(|w| !w.is_finite())
        {
            return Err("non-finite coefficient".to_string());
        }
        Ok(())
    }
}
