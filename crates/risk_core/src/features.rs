//! Observation records and feature normalization
//!
//! An [`ObservationRecord`] is the validated, typed form of caller input and
//! may be partial. [`normalize`] turns it into a [`FeatureVector`] whose
//! fields are exactly a model's `feature_names`, in that order.

use crate::errors::{PredictionError, ValidationError};
use crate::schema::{
    self, boolean_default, numeric_default, string_default, BOOLEAN_FIELDS, CATEGORICAL_FIELDS,
};
use crate::types::FeatureValue;
use crate::validation::{coerce_number, validate_value};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Immutable, partially populated observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservationRecord {
    fields: BTreeMap<String, FeatureValue>,
}

impl ObservationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used for programmatic construction.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Validate raw JSON input and convert it to typed fields.
    ///
    /// Numeric fields are stored as their coerced numbers. `null` on a
    /// free-text field counts as absent. Unknown fields with scalar values
    /// are kept but never reach a model unless named in its schema.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let raw = validate_value(value)?;

        let mut fields = BTreeMap::new();
        for (name, value) in raw {
            let typed = if schema::numeric_bounds(name).is_some() {
                coerce_number(value).map(FeatureValue::Number)
            } else {
                match value {
                    Value::Bool(b) => Some(FeatureValue::Flag(*b)),
                    Value::Number(n) => n.as_f64().map(FeatureValue::Number),
                    Value::String(s) => Some(FeatureValue::Text(s.clone())),
                    _ => None,
                }
            };
            if let Some(typed) = typed {
                fields.insert(name.clone(), typed);
            }
        }

        Ok(Self { fields })
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Complete, ordered feature record for one model schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<FeatureValue>,
}

impl FeatureVector {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.values[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.names.iter().map(String::as_str).zip(self.values.iter())
    }

    /// Convert back into a record holding every field.
    pub fn to_record(&self) -> ObservationRecord {
        ObservationRecord {
            fields: self
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        }
    }
}

/// Fill `feature_names` from the record, defaulting whatever is missing.
///
/// Defaults are applied tier by tier: string/categorical, then numeric, then
/// boolean. A later tier only fills slots still empty after the earlier
/// ones. A name with no registered default that the record does not supply
/// means the model schema and the registry disagree.
pub fn normalize(
    record: &ObservationRecord,
    feature_names: &[String],
) -> Result<FeatureVector, PredictionError> {
    let mut slots: Vec<Option<FeatureValue>> = feature_names
        .iter()
        .map(|name| record.get(name).cloned())
        .collect();

    fill_tier(&mut slots, feature_names, |name| {
        string_default(name).map(FeatureValue::from)
    });
    fill_tier(&mut slots, feature_names, |name| {
        numeric_default(name).map(FeatureValue::Number)
    });
    fill_tier(&mut slots, feature_names, |name| {
        boolean_default(name).map(FeatureValue::Flag)
    });

    let values = slots
        .into_iter()
        .zip(feature_names)
        .map(|(slot, name)| {
            slot.ok_or_else(|| {
                PredictionError::Inference(format!(
                    "feature '{name}' has no value and no registered default"
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FeatureVector {
        names: feature_names.to_vec(),
        values,
    })
}

fn fill_tier(
    slots: &mut [Option<FeatureValue>],
    names: &[String],
    default: impl Fn(&str) -> Option<FeatureValue>,
) {
    for (slot, name) in slots.iter_mut().zip(names) {
        if slot.is_none() {
            *slot = default(name);
        }
    }
}

/// Feature schema used when a dataset carries every registered field.
pub fn default_feature_names() -> Vec<String> {
    let mut names = vec!["species".to_string(), "breed".to_string()];
    names.extend(schema::NUMERIC_FIELDS.iter().map(|(n, _, _)| n.to_string()));
    names.extend(CATEGORICAL_FIELDS.iter().map(|(n, _)| n.to_string()));
    names.push("symptoms_present".to_string());
    names.extend(BOOLEAN_FIELDS.iter().map(|n| n.to_string()));
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn minimal_record_gets_registered_defaults() {
        let record = ObservationRecord::from_json(
            &json!({"species": "cat", "symptoms_present": "none", "symptom_count": 0}),
        )
        .unwrap();
        let names = default_feature_names();
        let vector = normalize(&record, &names).unwrap();

        assert_eq!(vector.names(), names.as_slice());
        assert_eq!(vector.get("species"), Some(&FeatureValue::from("cat")));
        assert_eq!(vector.get("temperature_c"), Some(&FeatureValue::Number(38.5)));
        assert_eq!(vector.get("heart_rate_bpm"), Some(&FeatureValue::Number(120.0)));
        assert_eq!(vector.get("hydration_normal"), Some(&FeatureValue::Flag(true)));
        assert_eq!(vector.get("gait_normal"), Some(&FeatureValue::Flag(true)));
        assert_eq!(vector.get("is_senior"), Some(&FeatureValue::Flag(false)));
        assert_eq!(vector.get("breed"), Some(&FeatureValue::from("Unknown")));
        assert_eq!(vector.get("coat_condition"), Some(&FeatureValue::from("good")));
        assert_eq!(vector.get("symptom_count"), Some(&FeatureValue::Number(0.0)));
    }

    #[test]
    fn output_order_follows_schema_not_record() {
        let record = ObservationRecord::new()
            .with("weight_kg", 12.0)
            .with("species", "dog");
        let names = vec!["weight_kg".to_string(), "species".to_string(), "gender".to_string()];
        let vector = normalize(&record, &names).unwrap();
        assert_eq!(
            vector.values(),
            &[
                FeatureValue::Number(12.0),
                FeatureValue::from("dog"),
                FeatureValue::from("unknown"),
            ]
        );
    }

    #[test]
    fn fields_outside_schema_are_dropped() {
        let record = ObservationRecord::new()
            .with("species", "dog")
            .with("owner", "Ada");
        let names = vec!["species".to_string()];
        let vector = normalize(&record, &names).unwrap();
        assert_eq!(vector.len(), 1);
        assert!(vector.get("owner").is_none());
    }

    #[test]
    fn unregistered_missing_feature_is_a_schema_fault() {
        let names = vec!["microchip_id".to_string()];
        let err = normalize(&ObservationRecord::new(), &names).unwrap_err();
        assert!(matches!(err, PredictionError::Inference(_)));
    }

    #[test]
    fn numeric_strings_are_stored_as_numbers() {
        let record = ObservationRecord::from_json(&json!({
            "species": "dog", "symptoms_present": "none", "symptom_count": "2"
        }))
        .unwrap();
        assert_eq!(record.get("symptom_count"), Some(&FeatureValue::Number(2.0)));
    }

    #[test]
    fn null_text_counts_as_absent() {
        let record = ObservationRecord::from_json(&json!({
            "species": "dog", "symptoms_present": null, "symptom_count": 1
        }))
        .unwrap();
        assert!(!record.contains("symptoms_present"));
        let vector = normalize(&record, &["symptoms_present".to_string()]).unwrap();
        assert_eq!(vector.values(), &[FeatureValue::from("none")]);
    }

    fn complete_record() -> impl Strategy<Value = ObservationRecord> {
        (
            0.0f64..=300.0,
            30.0f64..=45.0,
            any::<bool>(),
            prop::sample::select(vec!["mild", "moderate", "severe"]),
        )
            .prop_map(|(age, temp, hydrated, severity)| {
                let names = default_feature_names();
                let base = normalize(&ObservationRecord::new().with("species", "dog"), &names)
                    .unwrap()
                    .to_record();
                base.with("age_months", age)
                    .with("temperature_c", temp)
                    .with("hydration_normal", hydrated)
                    .with("max_symptom_severity", severity)
            })
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent_on_complete_records(record in complete_record()) {
            let names = default_feature_names();
            let once = normalize(&record, &names).unwrap();
            prop_assert_eq!(once.to_record(), record.clone());
            let twice = normalize(&once.to_record(), &names).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
