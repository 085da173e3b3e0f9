//! Prediction engine
//!
//! validate → normalize against the served feature schema → model →
//! decode → safety check → assessment. A decoded label outside the four
//! risk categories is logged and replaced by `Medium`; it never reaches a
//! caller.

use crate::artifacts::{ArtifactSet, ArtifactStore};
use crate::errors::PredictionError;
use crate::features::{normalize, ObservationRecord};
use crate::types::{PredictionResponse, RiskAssessment, RiskCategory, HIGH_RISK_THRESHOLD};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Serves predictions from the store's current artifact set.
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    store: Arc<ArtifactStore>,
    service_version: String,
}

impl PredictionEngine {
    pub fn new(store: Arc<ArtifactStore>, service_version: impl Into<String>) -> Self {
        Self {
            store,
            service_version: service_version.into(),
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// Assess a raw JSON observation.
    ///
    /// Readiness is checked first, so a caller without a loaded model is
    /// told to retry later regardless of the input.
    pub fn predict(&self, raw: &Value) -> Result<RiskAssessment, PredictionError> {
        let artifacts = self.store.current().ok_or(PredictionError::NotReady)?;
        let record = ObservationRecord::from_json(raw)?;
        assess(&record, &artifacts)
    }

    /// Assess an already typed observation. The record is validated the
    /// same way raw input is.
    pub fn predict_record(
        &self,
        record: &ObservationRecord,
    ) -> Result<RiskAssessment, PredictionError> {
        let artifacts = self.store.current().ok_or(PredictionError::NotReady)?;
        let raw = serde_json::to_value(record)
            .map_err(|e| PredictionError::Inference(e.to_string()))?;
        let record = ObservationRecord::from_json(&raw)?;
        assess(&record, &artifacts)
    }

    /// Assess a raw observation and build the response payload.
    pub fn predict_response(&self, raw: &Value) -> Result<PredictionResponse, PredictionError> {
        let assessment = self.predict(raw)?;
        Ok(PredictionResponse::from_assessment(
            &assessment,
            &self.service_version,
            Utc::now(),
        ))
    }
}

/// Run one validated record through an artifact set.
pub fn assess(
    record: &ObservationRecord,
    artifacts: &ArtifactSet,
) -> Result<RiskAssessment, PredictionError> {
    let features = normalize(record, artifacts.feature_names())?;

    let (index, probabilities) = artifacts.model.predict(&features).map_err(|e| {
        error!(version = %artifacts.version, error = %e, "Model inference failed");
        PredictionError::Inference(e)
    })?;

    let classes = artifacts.encoder.classes();
    if classes.len() != probabilities.len() {
        error!(
            version = %artifacts.version,
            classes = classes.len(),
            probabilities = probabilities.len(),
            "Encoder and model disagree on class count"
        );
        return Err(PredictionError::Inference(format!(
            "model returned {} probabilities for {} classes",
            probabilities.len(),
            classes.len()
        )));
    }

    let decoded = artifacts.encoder.decode(index);
    let category = match decoded.and_then(RiskCategory::from_label) {
        Some(category) => category,
        None => {
            warn!(
                version = %artifacts.version,
                index,
                label = ?decoded,
                fallback = %RiskCategory::FALLBACK,
                "Model produced an unrecognized risk category"
            );
            RiskCategory::FALLBACK
        }
    };

    let confidence = probabilities.iter().copied().fold(0.0_f64, f64::max);
    let probability_distribution: BTreeMap<String, f64> = classes
        .iter()
        .cloned()
        .zip(probabilities.iter().copied())
        .collect();

    let high_risk = category.is_high_risk();
    let requires_attention = high_risk && confidence > HIGH_RISK_THRESHOLD;

    info!(
        version = %artifacts.version,
        category = %category,
        confidence,
        high_risk,
        "Risk assessed"
    );

    Ok(RiskAssessment {
        category,
        confidence,
        probability_distribution,
        high_risk,
        requires_attention,
        model_version: artifacts.version.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactMetadata;
    use crate::features::FeatureVector;
    use crate::models::{LabelCodec, RiskModel, TargetEncoder};
    use crate::types::PerformanceMetrics;
    use serde_json::json;

    struct Fixed(usize, Vec<f64>);

    impl RiskModel for Fixed {
        fn predict(&self, _: &FeatureVector) -> Result<(usize, Vec<f64>), String> {
            Ok((self.0, self.1.clone()))
        }
    }

    fn set(index: usize, probabilities: Vec<f64>) -> ArtifactSet {
        let encoder = TargetEncoder::fit(["Critical", "High", "Low", "Medium"]);
        let metadata = ArtifactMetadata {
            model_type: "stub".to_string(),
            timestamp: "20240101_000000".to_string(),
            feature_names: vec!["species".into(), "symptom_count".into()],
            target_classes: encoder.classes().to_vec(),
            performance_metrics: PerformanceMetrics::default(),
            feature_importance: vec![],
            model_hash: None,
        };
        ArtifactSet::new(
            "20240101_000000",
            Arc::new(Fixed(index, probabilities)),
            Arc::new(encoder),
            metadata,
        )
    }

    fn engine(set: Option<ArtifactSet>) -> PredictionEngine {
        let store = Arc::new(ArtifactStore::new("unused"));
        if let Some(set) = set {
            store.install(set);
        }
        PredictionEngine::new(store, "1.0.0")
    }

    fn minimal() -> Value {
        json!({"species": "dog", "symptoms_present": "none", "symptom_count": 0})
    }

    #[test]
    fn not_ready_before_any_load() {
        let err = engine(None).predict(&minimal()).unwrap_err();
        assert!(matches!(err, PredictionError::NotReady));
        let err = engine(None).predict(&json!({})).unwrap_err();
        assert!(matches!(err, PredictionError::NotReady));
    }

    #[test]
    fn invalid_input_is_a_validation_error() {
        let e = engine(Some(set(0, vec![0.7, 0.1, 0.1, 0.1])));
        let err = e.predict(&json!({"species": "dog"})).unwrap_err();
        assert!(err.is_client_error());
        assert!(err.public_message().contains("symptoms_present"));
    }

    #[test]
    fn critical_with_high_confidence_requires_attention() {
        let e = engine(Some(set(0, vec![0.7, 0.1, 0.1, 0.1])));
        let a = e.predict(&minimal()).unwrap();
        assert_eq!(a.category, RiskCategory::Critical);
        assert!(a.high_risk);
        assert!(a.requires_attention);
        assert_eq!(a.confidence, 0.7);
        assert_eq!(a.model_version, "20240101_000000");
    }

    #[test]
    fn attention_needs_confidence_above_half() {
        let e = engine(Some(set(1, vec![0.2, 0.5, 0.2, 0.1])));
        let a = e.predict(&minimal()).unwrap();
        assert_eq!(a.category, RiskCategory::High);
        assert!(a.high_risk);
        assert!(!a.requires_attention);
    }

    #[test]
    fn low_is_never_high_risk() {
        let e = engine(Some(set(2, vec![0.0, 0.0, 0.99, 0.01])));
        let a = e.predict(&minimal()).unwrap();
        assert!(!a.high_risk && !a.requires_attention);
    }

    #[test]
    fn rounding_happens_only_in_the_response() {
        let e = engine(Some(set(0, vec![0.50049, 0.2, 0.2, 0.09951])));
        let a = e.predict(&minimal()).unwrap();
        assert!(a.requires_attention);
        let response = e.predict_response(&minimal()).unwrap();
        assert_eq!(response.risk_assessment.confidence, 0.5);
        assert!(response.flags.requires_attention);
        assert!(!response.flags.confidence_threshold_met);
    }

    #[test]
    fn class_count_mismatch_is_internal() {
        let e = engine(Some(set(0, vec![1.0])));
        let err = e.predict(&minimal()).unwrap_err();
        assert!(matches!(err, PredictionError::Inference(_)));
        assert_eq!(err.public_message(), "Internal service error");
    }

    #[test]
    fn typed_records_are_validated() {
        let e = engine(Some(set(0, vec![0.7, 0.1, 0.1, 0.1])));
        let record = ObservationRecord::new()
            .with("species", "dragon")
            .with("symptoms_present", "none")
            .with("symptom_count", 0.0);
        assert!(e.predict_record(&record).unwrap_err().is_client_error());
    }
}
