//! Bagged classification-tree ensemble

use super::tree::Tree;
use super::Classifier;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub n_classes: usize,
    /// Trees whose leaves hold class distributions
    pub trees: Vec<Tree>,
    /// Mean impurity decrease per encoded column, normalized to sum to 1
    pub importances: Vec<f64>,
}

impl Classifier for ForestModel {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        let mut sum = vec![0.0; self.n_classes];
        for (i, tree) in self.trees.iter().enumerate() {
            let leaf = tree
                .evaluate(x)
                .ok_or_else(|| format!("tree {i} could not be evaluated"))?;
            for (acc, p) in sum.iter_mut().zip(leaf) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        Ok(sum.into_iter().map(|v| v / n).collect())
    }

    fn feature_importances(&self) -> Vec<f64> {
        self.importances.clone()
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if self.importances.len() != n_features {
            return Err(format!(
                "importances cover {} columns, expected {}",
                self.importances.len(),
                n_features
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_classes)
                .map_err(|e| format!("Tree {i} validation failed: {e}"))?;
            if tree
                .nodes
                .iter()
                .any(|n| !n.is_leaf() && n.feature_idx as usize >= n_features)
            {
                return Err(format!("Tree {i} splits on a column outside the input"));
            }
        }
        Ok(())
    }
}
