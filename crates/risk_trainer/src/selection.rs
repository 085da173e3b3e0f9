//! Safety-weighted model selection
//!
//! Aggregate accuracy alone would reward a model that quietly misses the
//! dangerous categories. The score therefore adds the test recall of
//! Critical and High cases on top of validation accuracy.

use pet_risk_core::RiskCategory;
use tracing::info;

use crate::trainer::TrainingResult;

pub const CRITICAL_RECALL_WEIGHT: f64 = 0.3;
pub const HIGH_RECALL_WEIGHT: f64 = 0.2;

/// `val_accuracy + 0.3 * recall(Critical) + 0.2 * recall(High)`.
///
/// Not bounded by 1.
pub fn selection_score(result: &TrainingResult) -> f64 {
    result.val_score
        + CRITICAL_RECALL_WEIGHT * result.report.recall(RiskCategory::Critical.as_str())
        + HIGH_RECALL_WEIGHT * result.report.recall(RiskCategory::High.as_str())
}

/// Highest-scoring result; on equal scores the earlier one stays.
pub fn select_best(results: &[TrainingResult]) -> Option<&TrainingResult> {
    let mut best: Option<(&TrainingResult, f64)> = None;
    for result in results {
        let score = selection_score(result);
        info!(
            candidate = %result.name,
            val_score = result.val_score,
            critical_recall = result.report.recall(RiskCategory::Critical.as_str()),
            high_recall = result.report.recall(RiskCategory::High.as_str()),
            score,
            "Selection score"
        );
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((result, score));
        }
    }

    if let Some((winner, score)) = best {
        info!(candidate = %winner.name, score, "Selected model");
    }
    best.map(|(winner, _)| winner)
}
