//! Multiclass gradient-boosted trees
//!
//! Each boosting round fits one regression tree per class on the softmax
//! gradient. Inference sums the initial log-odds with every round's scaled
//! leaf value and applies a softmax.

use super::tree::Tree;
use super::{softmax, Classifier};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoostedModel {
    pub n_classes: usize,

    /// Shrinkage applied to every tree output
    pub learning_rate: f64,

    /// Initial per-class log-odds (log class priors)
    pub init: Vec<f64>,

    /// `rounds[r][k]` is the tree for class `k` in round `r`
    pub rounds: Vec<Vec<Tree>>,

    /// Split gain per encoded column, normalized to sum to 1
    pub importances: Vec<f64>,
}

impl BoostedModel {
    /// Raw per-class scores before the softmax.
    pub fn raw_scores(&self, x: &[f64]) -> Result<Vec<f64>, String> {
        let mut scores = self.init.clone();
        for (r, round) in self.rounds.iter().enumerate() {
            for (k, tree) in round.iter().enumerate() {
                let leaf = tree
                    .evaluate(x)
                    .and_then(|payload| payload.first().copied())
                    .ok_or_else(|| format!("round {r} class {k} tree could not be evaluated"))?;
                scores[k] += self.learning_rate * leaf;
            }
        }
        Ok(scores)
    }
}

impl Classifier for BoostedModel {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, String> {
        Ok(softmax(&self.raw_scores(x)?))
    }

    fn feature_importances(&self) -> Vec<f64> {
        self.importances.clone()
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.init.len() != self.n_classes {
            return Err(format!(
                "init has {} values, expected {}",
                self.init.len(),
                self.n_classes
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err("learning rate must be positive".to_string());
        }
        if self.importances.len() != n_features {
            return Err(format!(
                "importances cover {} columns, expected {}",
                self.importances.len(),
                n_features
            ));
        }
        for (r, round) in self.rounds.iter().enumerate() {
            if round.len() != self.n_classes {
                return Err(format!("round {r} has {} trees", round.len()));
            }
            for tree in round {
                tree.validate(1)
                    .map_err(|e| format!("round {r} validation failed: {e}"))?;
                if tree
                    .nodes
                    .iter()
                    .any(|n| !n.is_leaf() && n.feature_idx as usize >= n_features)
                {
                    return Err(format!("round {r} splits on a column outside the input"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tree::Node;

    fn model() -> BoostedModel {
        let split = |left: f64, right: f64| {
            Tree::new(vec![
                Node::internal(0, 0, 0.5, 1, 2),
                Node::leaf(1, vec![left]),
                Node::leaf(2, vec![right]),
            ])
        };
        BoostedModel {
            n_classes: 2,
            learning_rate: 0.5,
            init: vec![0.0, 0.0],
            rounds: vec![vec![split(2.0, -2.0), split(-2.0, 2.0)]],
            importances: vec![1.0],
        }
    }

    #[test]
    fn scores_accumulate_scaled_leaves() {
        let m = model();
        assert_eq!(m.raw_scores(&[0.0]).unwrap(), vec![1.0, -1.0]);
        let p = m.predict_proba(&[1.0]).unwrap();
        assert!(p[1] > p[0]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn validation_checks_shape() {
        let mut m = model();
        assert!(m.validate(1).is_ok());
        m.rounds[0].pop();
        assert!(m.validate(1).is_err());
    }

    #[test]
    fn no_rounds_returns_prior() {
        let m = BoostedModel {
            n_classes: 2,
            learning_rate: 0.1,
            init: vec![(0.25f64).ln(), (0.75f64).ln()],
            rounds: vec![],
            importances: vec![],
        };
        let p = m.predict_proba(&[]).unwrap();
        assert!((p[1] - 0.75).abs() < 1e-12);
    }
}
