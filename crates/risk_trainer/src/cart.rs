//! CART (Classification and Regression Tree) builder
//!
//! Exact-greedy binary splits over sorted feature values with a pluggable
//! impurity [`Criterion`]. Classification trees (Gini, class-distribution
//! leaves) feed the random forest; Newton-step regression trees feed
//! gradient boosting.

use pet_risk_core::models::{Node, Tree};
use rand::rngs::StdRng;
use rand::seq::index::sample;

use crate::deterministic::SplitTieBreaker;

const EPS: f64 = 1e-12;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn per split; `None` considers all of them
    pub max_features: Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

/// Node impurity over additive per-sample statistics.
pub trait Criterion {
    type Stats: Clone;

    fn empty(&self) -> Self::Stats;

    fn add(&self, stats: &mut Self::Stats, sample: usize);

    /// `total - part`
    fn difference(&self, total: &Self::Stats, part: &Self::Stats) -> Self::Stats;

    fn weight(&self, stats: &Self::Stats) -> f64;

    fn impurity(&self, stats: &Self::Stats) -> f64;

    fn leaf_value(&self, stats: &Self::Stats) -> Vec<f64>;
}

/// Weighted Gini impurity; leaves hold normalized class distributions.
pub struct Gini<'a> {
    pub labels: &'a [usize],
    pub weights: &'a [f64],
    pub n_classes: usize,
}

impl Criterion for Gini<'_> {
    type Stats = Vec<f64>;

    fn empty(&self) -> Vec<f64> {
        vec![0.0; self.n_classes]
    }

    fn add(&self, stats: &mut Vec<f64>, sample: usize) {
        stats[self.labels[sample]] += self.weights[sample];
    }

    fn difference(&self, total: &Vec<f64>, part: &Vec<f64>) -> Vec<f64> {
        total.iter().zip(part).map(|(t, p)| t - p).collect()
    }

    fn weight(&self, stats: &Vec<f64>) -> f64 {
        stats.iter().sum()
    }

    fn impurity(&self, stats: &Vec<f64>) -> f64 {
        let w = self.weight(stats);
        if w <= EPS {
            return 0.0;
        }
        1.0 - stats.iter().map(|c| (c / w).powi(2)).sum::<f64>()
    }

    fn leaf_value(&self, stats: &Vec<f64>) -> Vec<f64> {
        let w = self.weight(stats);
        if w <= EPS {
            return vec![1.0 / self.n_classes as f64; self.n_classes];
        }
        stats.iter().map(|c| c / w).collect()
    }
}

/// Squared-error splits on residuals with a one-step Newton leaf value
/// `scale * Σr / Σh`.
pub struct NewtonRegression<'a> {
    pub residuals: &'a [f64],
    pub hessians: &'a [f64],
    pub scale: f64,
}

/// (count, Σr, Σr², Σh)
pub type RegressionStats = [f64; 4];

impl Criterion for NewtonRegression<'_> {
    type Stats = RegressionStats;

    fn empty(&self) -> RegressionStats {
        [0.0; 4]
    }

    fn add(&self, stats: &mut RegressionStats, sample: usize) {
        let r = self.residuals[sample];
        stats[0] += 1.0;
        stats[1] += r;
        stats[2] += r * r;
        stats[3] += self.hessians[sample];
    }

    fn difference(&self, total: &RegressionStats, part: &RegressionStats) -> RegressionStats {
        [
            total[0] - part[0],
            total[1] - part[1],
            total[2] - part[2],
            total[3] - part[3],
        ]
    }

    fn weight(&self, stats: &RegressionStats) -> f64 {
        stats[0]
    }

    fn impurity(&self, stats: &RegressionStats) -> f64 {
        if stats[0] <= EPS {
            return 0.0;
        }
        let mean = stats[1] / stats[0];
        (stats[2] / stats[0] - mean * mean).max(0.0)
    }

    fn leaf_value(&self, stats: &RegressionStats) -> Vec<f64> {
        if stats[3].abs() <= EPS {
            return vec![0.0];
        }
        vec![self.scale * stats[1] / stats[3]]
    }
}

/// A fitted tree plus its per-feature impurity decrease
#[derive(Debug, Clone)]
pub struct BuiltTree {
    pub tree: Tree,
    /// Weighted impurity decrease per feature, not normalized
    pub importances: Vec<f64>,
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain + EPS
            || ((self.gain - other.gain).abs() <= EPS && self.tie_breaker < other.tie_breaker)
    }
}

/// Build a tree using the exact-greedy CART algorithm
pub struct CartBuilder<'a, C: Criterion> {
    features: &'a [Vec<f64>],
    criterion: &'a C,
    config: TreeConfig,
    feature_count: usize,
}

impl<'a, C: Criterion> CartBuilder<'a, C> {
    pub fn new(features: &'a [Vec<f64>], criterion: &'a C, config: TreeConfig) -> Self {
        let feature_count = features.first().map_or(0, Vec::len);
        Self {
            features,
            criterion,
            config,
            feature_count,
        }
    }

    /// Build a tree over the given sample indices
    pub fn build(&self, samples: &[usize], rng: &mut StdRng) -> BuiltTree {
        let mut nodes = Vec::new();
        let mut importances = vec![0.0; self.feature_count];

        self.build_node(samples.to_vec(), 0, &mut nodes, &mut importances, rng);

        BuiltTree {
            tree: Tree::new(nodes),
            importances,
        }
    }

    /// Recursively build tree nodes; children always follow their parent
    fn build_node(
        &self,
        indices: Vec<usize>,
        depth: usize,
        nodes: &mut Vec<Node>,
        importances: &mut [f64],
        rng: &mut StdRng,
    ) -> i32 {
        let current_idx = nodes.len() as i32;
        let stats = self.stats(&indices);
        let impurity = self.criterion.impurity(&stats);

        // Check stopping conditions
        if depth >= self.config.max_depth
            || indices.len() < self.config.min_samples_split
            || indices.len() < 2 * self.config.min_samples_leaf
            || impurity <= EPS
        {
            nodes.push(Node::leaf(current_idx, self.criterion.leaf_value(&stats)));
            return current_idx;
        }

        let Some(split) = self.find_best_split(&indices, &stats, impurity, rng) else {
            nodes.push(Node::leaf(current_idx, self.criterion.leaf_value(&stats)));
            return current_idx;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.features[i][split.feature_idx] <= split.threshold);

        importances[split.feature_idx] += split.gain;

        // Reserve space for current node
        nodes.push(Node::internal(
            current_idx,
            split.feature_idx as i32,
            split.threshold,
            -1,
            -1,
        ));

        let left_idx = self.build_node(left, depth + 1, nodes, importances, rng);
        let right_idx = self.build_node(right, depth + 1, nodes, importances, rng);

        nodes[current_idx as usize].left = left_idx;
        nodes[current_idx as usize].right = right_idx;

        current_idx
    }

    fn stats(&self, indices: &[usize]) -> C::Stats {
        let mut stats = self.criterion.empty();
        for &i in indices {
            self.criterion.add(&mut stats, i);
        }
        stats
    }

    /// Find best split over the candidate features
    fn find_best_split(
        &self,
        indices: &[usize],
        total: &C::Stats,
        impurity: f64,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let parent = self.criterion.weight(total) * impurity;
        let min_leaf = self.config.min_samples_leaf.max(1);

        let mut best: Option<SplitCandidate> = None;
        for feature_idx in self.candidate_features(rng) {
            let mut sorted = indices.to_vec();
            sorted.sort_by(|&a, &b| {
                self.features[a][feature_idx].total_cmp(&self.features[b][feature_idx])
            });

            let mut left = self.criterion.empty();
            for pos in 0..sorted.len().saturating_sub(1) {
                self.criterion.add(&mut left, sorted[pos]);

                let lo = self.features[sorted[pos]][feature_idx];
                let hi = self.features[sorted[pos + 1]][feature_idx];
                if lo >= hi {
                    continue;
                }
                let n_left = pos + 1;
                if n_left < min_leaf || sorted.len() - n_left < min_leaf {
                    continue;
                }

                let right = self.criterion.difference(total, &left);
                let (w_left, w_right) = (self.criterion.weight(&left), self.criterion.weight(&right));
                if w_left <= EPS || w_right <= EPS {
                    continue;
                }
                let gain = parent
                    - w_left * self.criterion.impurity(&left)
                    - w_right * self.criterion.impurity(&right);
                if gain <= EPS {
                    continue;
                }

                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                let candidate = SplitCandidate {
                    feature_idx,
                    threshold,
                    gain,
                    tie_breaker: SplitTieBreaker::new(feature_idx, pos),
                };
                if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    fn candidate_features(&self, rng: &mut StdRng) -> Vec<usize> {
        match self.config.max_features {
            Some(k) if k > 0 && k < self.feature_count => {
                let mut picked = sample(rng, self.feature_count, k).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..self.feature_count).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deterministic::seeded_rng;

    #[test]
    fn test_separable_classes() {
        let features = vec![vec![1.0, 5.0], vec![2.0, 5.0], vec![8.0, 5.0], vec![9.0, 5.0]];
        let labels = vec![0, 0, 1, 1];
        let weights = vec![1.0; 4];
        let gini = Gini {
            labels: &labels,
            weights: &weights,
            n_classes: 2,
        };

        let builder = CartBuilder::new(&features, &gini, TreeConfig::default());
        let built = builder.build(&[0, 1, 2, 3], &mut seeded_rng(1, 0));

        assert_eq!(built.tree.nodes.len(), 3);
        assert_eq!(built.tree.nodes[0].feature_idx, 0);
        assert_eq!(built.tree.nodes[0].threshold, 5.0);
        assert_eq!(built.tree.evaluate(&[0.0, 5.0]), Some(&[1.0, 0.0][..]));
        assert_eq!(built.tree.evaluate(&[10.0, 5.0]), Some(&[0.0, 1.0][..]));
        assert!(built.importances[0] > 0.0);
        assert_eq!(built.importances[1], 0.0);
        assert!(built.tree.validate(2).is_ok());
    }

    #[test]
    fn test_leaf_only_tree() {
        let features = vec![vec![1.0]];
        let labels = vec![0];
        let weights = vec![1.0];
        let gini = Gini {
            labels: &labels,
            weights: &weights,
            n_classes: 3,
        };
        let built = CartBuilder::new(&features, &gini, TreeConfig::default())
            .build(&[0], &mut seeded_rng(1, 0));

        assert_eq!(built.tree.nodes.len(), 1);
        assert_eq!(built.tree.nodes[0].leaf, Some(vec![1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_depth_limit() {
        let features: Vec<Vec<f64>> = (0..16).map(|i| vec![i as f64]).collect();
        let labels: Vec<usize> = (0..16).map(|i| i % 2).collect();
        let weights = vec![1.0; 16];
        let gini = Gini {
            labels: &labels,
            weights: &weights,
            n_classes: 2,
        };
        let config = TreeConfig {
            max_depth: 2,
            ..TreeConfig::default()
        };
        let samples: Vec<usize> = (0..16).collect();
        let built = CartBuilder::new(&features, &gini, config).build(&samples, &mut seeded_rng(1, 0));
        assert!(built.tree.leaf_count() <= 4);
    }

    #[test]
    fn test_newton_leaf_values() {
        let features = vec![vec![0.0], vec![0.0], vec![1.0], vec![1.0]];
        let residuals = vec![0.5, 0.5, -0.5, -0.5];
        let hessians = vec![0.25; 4];
        let criterion = NewtonRegression {
            residuals: &residuals,
            hessians: &hessians,
            scale: 0.5,
        };
        let built = CartBuilder::new(&features, &criterion, TreeConfig::default())
            .build(&[0, 1, 2, 3], &mut seeded_rng(1, 0));

        assert_eq!(built.tree.evaluate(&[0.0]), Some(&[1.0][..]));
        assert_eq!(built.tree.evaluate(&[1.0]), Some(&[-1.0][..]));
        assert!(built.tree.validate(1).is_ok());
    }

    #[test]
    fn test_deterministic_given_seed() {
        let features: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![(i * 7 % 13) as f64, (i * 3 % 5) as f64, (i % 4) as f64])
            .collect();
        let labels: Vec<usize> = (0..40).map(|i| (i * 7 % 13) % 3).collect();
        let weights = vec![1.0; 40];
        let gini = Gini {
            labels: &labels,
            weights: &weights,
            n_classes: 3,
        };
        let config = TreeConfig {
            max_features: Some(2),
            ..TreeConfig::default()
        };
        let samples: Vec<usize> = (0..40).collect();
        let a = CartBuilder::new(&features, &gini, config.clone()).build(&samples, &mut seeded_rng(9, 2));
        let b = CartBuilder::new(&features, &gini, config).build(&samples, &mut seeded_rng(9, 2));
        assert_eq!(a.tree, b.tree);
    }
}
