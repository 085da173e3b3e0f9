//! Stratified train / validation / test split and class balancing

use rand::seq::SliceRandom;
use std::collections::BTreeMap;

use crate::deterministic::seeded_rng;
use crate::errors::TrainerError;

const SPLIT_STREAM: u64 = 0;

/// Row indices of each partition, each in ascending order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split row indices so every class keeps its proportions in all three
/// partitions. A class with at least three rows always lands in each one.
pub fn stratified_split(
    labels: &[usize],
    val_fraction: f64,
    test_fraction: f64,
    seed: u64,
) -> Result<Split, TrainerError> {
    if !(val_fraction > 0.0 && test_fraction > 0.0 && val_fraction + test_fraction < 1.0) {
        return Err(TrainerError::Training(format!(
            "invalid split fractions: val {val_fraction}, test {test_fraction}"
        )));
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut rng = seeded_rng(seed, SPLIT_STREAM);
    let mut split = Split {
        train: Vec::new(),
        val: Vec::new(),
        test: Vec::new(),
    };

    for (_, mut members) in by_class {
        members.shuffle(&mut rng);
        let n = members.len();
        let (n_val, n_test) = held_out_sizes(n, val_fraction, test_fraction);

        split.test.extend_from_slice(&members[..n_test]);
        split.val.extend_from_slice(&members[n_test..n_test + n_val]);
        split.train.extend_from_slice(&members[n_test + n_val..]);
    }

    split.train.sort_unstable();
    split.val.sort_unstable();
    split.test.sort_unstable();
    Ok(split)
}

/// Per-sample weights `n / (k * n_c)`, `k` being the number of classes
/// present, so every class carries the same total weight.
pub fn balanced_sample_weights(labels: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_classes];
    for &label in labels {
        counts[label] += 1;
    }
    let present = counts.iter().filter(|&&c| c > 0).count().max(1);
    let n = labels.len() as f64;
    labels
        .iter()
        .map(|&label| n / (present as f64 * counts[label] as f64))
        .collect()
}

fn held_out_sizes(n: usize, val_fraction: f64, test_fraction: f64) -> (usize, usize) {
    let mut n_val = (n as f64 * val_fraction).round() as usize;
    let mut n_test = (n as f64 * test_fraction).round() as usize;
    if n >= 3 {
        n_val = n_val.max(1);
        n_test = n_test.max(1);
    }
    // Keep at least one training row
    while n_val + n_test >= n && n_val + n_test > 0 {
        if n_val >= n_test {
            n_val -= 1;
        } else {
            n_test -= 1;
        }
    }
    (n_val, n_test)
}
