//! Random forest trainer
//!
//! Each tree sees a bootstrap sample of the training rows and draws
//! `sqrt(d)` candidate features per split. Class-balanced sample weights
//! enter the Gini criterion directly.

use pet_risk_core::models::ForestModel;
use rand::Rng;
use tracing::debug;

use crate::boosting::normalized;
use crate::cart::{CartBuilder, Gini, TreeConfig};
use crate::deterministic::seeded_rng;
use crate::errors::TrainerError;
use crate::split::balanced_sample_weights;

#[derive(Clone, Debug)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub balanced: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            balanced: true,
        }
    }
}

pub struct ForestTrainer {
    config: ForestConfig,
}

impl ForestTrainer {
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }

    pub fn train(
        &self,
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        seed: u64,
    ) -> Result<ForestModel, TrainerError> {
        let n = x.len();
        if n == 0 || n != y.len() {
            return Err(TrainerError::Training(format!(
                "random forest needs matching non-empty inputs (rows {n}, labels {})",
                y.len()
            )));
        }
        if self.config.n_trees == 0 {
            return Err(TrainerError::Training("random forest needs at least one tree".to_string()));
        }
        let d = x[0].len();

        let weights = if self.config.balanced {
            balanced_sample_weights(y, n_classes)
        } else {
            vec![1.0; n]
        };
        let gini = Gini {
            labels: y,
            weights: &weights,
            n_classes,
        };
        let tree_config = TreeConfig {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            max_features: Some(((d as f64).sqrt().floor() as usize).max(1)),
        };
        let builder = CartBuilder::new(x, &gini, tree_config);

        let mut trees = Vec::with_capacity(self.config.n_trees);
        let mut importances = vec![0.0; d];
        for t in 0..self.config.n_trees {
            let mut rng = seeded_rng(seed, t as u64 + 1);
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

            let built = builder.build(&bootstrap, &mut rng);
            for (acc, v) in importances.iter_mut().zip(normalized(built.importances)) {
                *acc += v;
            }
            debug!(tree = t + 1, leaves = built.tree.leaf_count(), "Forest tree built");
            trees.push(built.tree);
        }

        let n_trees = trees.len() as f64;
        Ok(ForestModel {
            n_classes,
            trees,
            importances: normalized(importances.into_iter().map(|v| v / n_trees).collect()),
        })
    }
}
