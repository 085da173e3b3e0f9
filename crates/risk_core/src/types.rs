//! Shared data types: feature values, risk categories and output payloads

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Confidence above which a high-risk category requires attention.
pub const HIGH_RISK_THRESHOLD: f64 = 0.5;

/// Confidence above which the prediction is flagged as confident.
pub const CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Notice attached to every prediction payload.
pub const SAFETY_NOTICE: &str =
    "This is a risk assessment only. Consult a veterinarian for medical advice.";

/// A single typed feature value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl FeatureValue {
    /// Numeric view used by scaling. Flags map to 1.0 / 0.0.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            FeatureValue::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
            FeatureValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Category label used by one-hot encoding.
    pub fn as_category(&self) -> String {
        match self {
            FeatureValue::Text(s) => s.clone(),
            FeatureValue::Number(v) => v.to_string(),
            FeatureValue::Flag(b) => b.to_string(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FeatureValue::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<bool> for FeatureValue {
    fn from(b: bool) -> Self {
        FeatureValue::Flag(b)
    }
}

impl From<&str> for FeatureValue {
    fn from(s: &str) -> Self {
        FeatureValue::Text(s.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(s: String) -> Self {
        FeatureValue::Text(s)
    }
}

/// Ordinal risk category: Low < Medium < High < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 4] = [
        RiskCategory::Low,
        RiskCategory::Medium,
        RiskCategory::High,
        RiskCategory::Critical,
    ];

    /// Category substituted for any unrecognized model output.
    pub const FALLBACK: RiskCategory = RiskCategory::Medium;

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "Low",
            RiskCategory::Medium => "Medium",
            RiskCategory::High => "High",
            RiskCategory::Critical => "Critical",
        }
    }

    /// Parse an exact label. Anything else is not a category.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == label)
    }

    /// Bucket a continuous risk score into its category.
    ///
    /// Cut points are 0.25 / 0.5 / 0.75 with right-closed bins; 0.0 itself
    /// belongs to `Low`. Scores outside `[0, 1]` have no category.
    pub fn from_score(score: f64) -> Option<Self> {
        if !(0.0..=1.0).contains(&score) {
            return None;
        }
        Some(if score <= 0.25 {
            RiskCategory::Low
        } else if score <= 0.5 {
            RiskCategory::Medium
        } else if score <= 0.75 {
            RiskCategory::High
        } else {
            RiskCategory::Critical
        })
    }

    pub fn is_high_risk(&self) -> bool {
        matches!(self, RiskCategory::High | RiskCategory::Critical)
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one inference, before presentation rounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub category: RiskCategory,
    pub confidence: f64,
    pub probability_distribution: BTreeMap<String, f64>,
    pub high_risk: bool,
    pub requires_attention: bool,
    pub model_version: String,
}

/// Training-time performance figures recorded in model metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub train_score: f64,
    pub val_score: f64,
    pub test_score: f64,
    #[serde(default)]
    pub auc_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentBody {
    pub category: RiskCategory,
    pub confidence: f64,
    pub probability_distribution: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentFlags {
    pub high_risk: bool,
    pub requires_attention: bool,
    pub confidence_threshold_met: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub model_version: String,
    pub prediction_timestamp: String,
    pub service_version: String,
}

/// Inference response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub risk_assessment: AssessmentBody,
    pub flags: AssessmentFlags,
    pub metadata: ResponseMetadata,
    pub safety_notice: String,
}

impl PredictionResponse {
    /// Build the presentation payload. Flags are derived from the unrounded
    /// confidence; rounding is applied only to the reported numbers.
    pub fn from_assessment(
        assessment: &RiskAssessment,
        service_version: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            risk_assessment: AssessmentBody {
                category: assessment.category,
                confidence: round3(assessment.confidence),
                probability_distribution: assessment
                    .probability_distribution
                    .iter()
                    .map(|(class, p)| (class.clone(), round3(*p)))
                    .collect(),
            },
            flags: AssessmentFlags {
                high_risk: assessment.high_risk,
                requires_attention: assessment.requires_attention,
                confidence_threshold_met: assessment.confidence > CONFIDENCE_THRESHOLD,
            },
            metadata: ResponseMetadata {
                model_version: assessment.model_version.clone(),
                prediction_timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
                service_version: service_version.to_string(),
            },
            safety_notice: SAFETY_NOTICE.to_string(),
        }
    }
}

/// Model info payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_version: String,
    pub feature_count: usize,
    pub target_classes: Vec<String>,
    pub model_type: String,
    pub performance_metrics: PerformanceMetrics,
}

/// Readiness signal consumed by health checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    pub model_version: Option<String>,
}

/// Round to three decimal places for presentation.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
