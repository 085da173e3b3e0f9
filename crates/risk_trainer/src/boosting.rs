//! Gradient-boosted tree trainer
//!
//! Multinomial deviance boosting: every round computes the softmax
//! probabilities of the current ensemble, then fits one Newton-step
//! regression tree per class on the residuals `y_k - p_k`.

use pet_risk_core::models::{softmax, BoostedModel, Tree};
use tracing::debug;

use crate::cart::{CartBuilder, NewtonRegression, TreeConfig};
use crate::deterministic::seeded_rng;
use crate::errors::TrainerError;

/// Stream offset so boosting draws never overlap forest bootstrap streams.
const BOOSTING_STREAM: u64 = 1 << 32;

#[derive(Clone, Debug)]
pub struct BoostingConfig {
    pub rounds: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub learning_rate: f64,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            rounds: 100,
            max_depth: 6,
            min_samples_leaf: 1,
            learning_rate: 0.1,
        }
    }
}

pub struct BoostingTrainer {
    config: BoostingConfig,
}

impl BoostingTrainer {
    pub fn new(config: BoostingConfig) -> Self {
        Self { config }
    }

    pub fn train(
        &self,
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        seed: u64,
    ) -> Result<BoostedModel, TrainerError> {
        let n = x.len();
        if n == 0 || n != y.len() {
            return Err(TrainerError::Training(format!(
                "gradient boosting needs matching non-empty inputs (rows {n}, labels {})",
                y.len()
            )));
        }
        if !(self.config.learning_rate > 0.0) {
            return Err(TrainerError::Training(format!(
                "learning rate must be positive, got {}",
                self.config.learning_rate
            )));
        }
        let d = x[0].len();

        let init = self.calculate_init(y, n_classes);
        let mut raw: Vec<Vec<f64>> = vec![init.clone(); n];
        let mut rounds = Vec::with_capacity(self.config.rounds);
        let mut importances = vec![0.0; d];

        let tree_config = TreeConfig {
            max_depth: self.config.max_depth,
            min_samples_leaf: self.config.min_samples_leaf,
            ..TreeConfig::default()
        };
        let samples: Vec<usize> = (0..n).collect();
        let scale = (n_classes as f64 - 1.0) / n_classes as f64;
        let mut rng = seeded_rng(seed, BOOSTING_STREAM);

        for round in 0..self.config.rounds {
            let probabilities: Vec<Vec<f64>> = raw.iter().map(|r| softmax(r)).collect();
            let mut trees = Vec::with_capacity(n_classes);

            for k in 0..n_classes {
                let (residuals, hessians) = self.calculate_gradients_hessians(y, &probabilities, k);
                let criterion = NewtonRegression {
                    residuals: &residuals,
                    hessians: &hessians,
                    scale,
                };
                let built = CartBuilder::new(x, &criterion, tree_config.clone())
                    .build(&samples, &mut rng);

                for (acc, gain) in importances.iter_mut().zip(&built.importances) {
                    *acc += gain;
                }
                trees.push(built.tree);
            }

            self.update_predictions(&trees, x, &mut raw)?;
            rounds.push(trees);
            debug!(round = round + 1, total = self.config.rounds, "Boosting round complete");
        }

        Ok(BoostedModel {
            n_classes,
            learning_rate: self.config.learning_rate,
            init,
            rounds,
            importances: normalized(importances),
        })
    }

    /// Log class priors; absent classes get a large negative score.
    fn calculate_init(&self, y: &[usize], n_classes: usize) -> Vec<f64> {
        let mut counts = vec![0usize; n_classes];
        for &label in y {
            counts[label] += 1;
        }
        let n = y.len() as f64;
        counts
            .into_iter()
            .map(|c| {
                if c == 0 {
                    f64::MIN_POSITIVE.ln()
                } else {
                    (c as f64 / n).ln()
                }
            })
            .collect()
    }

    /// Residuals `y_k - p_k` and hessians `p_k (1 - p_k)` for class `k`
    fn calculate_gradients_hessians(
        &self,
        y: &[usize],
        probabilities: &[Vec<f64>],
        k: usize,
    ) -> (Vec<f64>, Vec<f64>) {
        y.iter()
            .zip(probabilities)
            .map(|(&label, p)| {
                let target = if label == k { 1.0 } else { 0.0 };
                (target - p[k], p[k] * (1.0 - p[k]))
            })
            .unzip()
    }

    fn update_predictions(
        &self,
        trees: &[Tree],
        x: &[Vec<f64>],
        raw: &mut [Vec<f64>],
    ) -> Result<(), TrainerError> {
        for (row, scores) in x.iter().zip(raw.iter_mut()) {
            for (k, tree) in trees.iter().enumerate() {
                let leaf = tree
                    .evaluate(row)
                    .and_then(|payload| payload.first().copied())
                    .ok_or_else(|| {
                        TrainerError::Training(format!("freshly built tree for class {k} is malformed"))
                    })?;
                scores[k] += self.config.learning_rate * leaf;
            }
        }
        Ok(())
    }
}

/// Scale to sum 1; all-zero input stays all zero.
pub(crate) fn normalized(values: Vec<f64>) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.into_iter().map(|v| v / total).collect()
    } else {
        values
    }
}
