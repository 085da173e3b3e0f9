//! Evaluation metrics for candidate models

use pet_risk_core::models::argmax;
use serde::Serialize;
use std::collections::BTreeMap;

/// Fraction of predictions equal to the truth; 0 for empty input.
pub fn accuracy(truth: &[usize], pred: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth.iter().zip(pred).filter(|(t, p)| t == p).count();
    correct as f64 / truth.len() as f64
}

/// `matrix[t][p]` counts rows of true class `t` predicted as `p`.
pub fn confusion_matrix(truth: &[usize], pred: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut matrix = vec![vec![0; n_classes]; n_classes];
    for (&t, &p) in truth.iter().zip(pred) {
        if t < n_classes && p < n_classes {
            matrix[t][p] += 1;
        }
    }
    matrix
}

/// Predicted class per probability row.
pub fn predicted_classes(probabilities: &[Vec<f64>]) -> Vec<usize> {
    probabilities
        .iter()
        .map(|p| argmax(p).unwrap_or(0))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class precision / recall / F1 over every class that appears in the
/// truth or the predictions, plus accuracy and macro / weighted averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    #[serde(flatten)]
    pub classes: BTreeMap<String, ClassScores>,
    pub accuracy: f64,
    #[serde(rename = "macro avg")]
    pub macro_avg: ClassScores,
    #[serde(rename = "weighted avg")]
    pub weighted_avg: ClassScores,
}

impl ClassificationReport {
    pub fn new(truth: &[usize], pred: &[usize], class_names: &[String]) -> Self {
        let n_classes = class_names.len();
        let matrix = confusion_matrix(truth, pred, n_classes);
        let total = truth.len();

        let mut classes = BTreeMap::new();
        for (k, name) in class_names.iter().enumerate() {
            let support: usize = matrix[k].iter().sum();
            let predicted: usize = matrix.iter().map(|row| row[k]).sum();
            if support == 0 && predicted == 0 {
                continue;
            }
            let hits = matrix[k][k] as f64;
            let precision = ratio(hits, predicted as f64);
            let recall = ratio(hits, support as f64);
            classes.insert(
                name.clone(),
                ClassScores {
                    precision,
                    recall,
                    f1_score: ratio(2.0 * precision * recall, precision + recall),
                    support,
                },
            );
        }

        let present = classes.len() as f64;
        let mean = |f: fn(&ClassScores) -> f64| {
            ratio(classes.values().map(f).sum::<f64>(), present)
        };
        let weighted = |f: fn(&ClassScores) -> f64| {
            ratio(
                classes.values().map(|c| f(c) * c.support as f64).sum::<f64>(),
                total as f64,
            )
        };

        let macro_avg = ClassScores {
            precision: mean(|c| c.precision),
            recall: mean(|c| c.recall),
            f1_score: mean(|c| c.f1_score),
            support: total,
        };
        let weighted_avg = ClassScores {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1_score: weighted(|c| c.f1_score),
            support: total,
        };

        Self {
            classes,
            accuracy: accuracy(truth, pred),
            macro_avg,
            weighted_avg,
        }
    }

    /// Recall of one class; 0 when the class never occurred.
    pub fn recall(&self, class_name: &str) -> f64 {
        self.classes.get(class_name).map_or(0.0, |c| c.recall)
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Macro-averaged one-vs-rest ROC AUC.
///
/// `None` when any class has no positive or no negative rows, since AUC is
/// undefined there.
pub fn roc_auc_ovr(truth: &[usize], probabilities: &[Vec<f64>], n_classes: usize) -> Option<f64> {
    if n_classes < 2 || truth.len() != probabilities.len() {
        return None;
    }
    let mut total = 0.0;
    for k in 0..n_classes {
        let positive: Vec<bool> = truth.iter().map(|&t| t == k).collect();
        let scores = probabilities
            .iter()
            .map(|p| p.get(k).copied())
            .collect::<Option<Vec<f64>>>()?;
        total += binary_auc(&positive, &scores)?;
    }
    Some(total / n_classes as f64)
}

/// Mann-Whitney U statistic with average ranks for ties.
fn binary_auc(positive: &[bool], scores: &[f64]) -> Option<f64> {
    let n_pos = positive.iter().filter(|&&p| p).count();
    let n_neg = positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; the tie group shares its mean rank.
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        rank_sum += avg_rank * order[start..end].iter().filter(|&&i| positive[i]).count() as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    Some((rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}
