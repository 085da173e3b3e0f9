//! Input validation against the observation schema
//!
//! Checks run in a fixed order and stop at the first failure:
//! required fields, species, numeric ranges, categorical value sets,
//! boolean types. Fields absent from the record are never checked, apart
//! from the required ones.

use crate::errors::ValidationError;
use crate::schema::{BOOLEAN_FIELDS, CATEGORICAL_FIELDS, NUMERIC_FIELDS, REQUIRED_FIELDS, SPECIES};
use serde_json::{Map, Value};

/// Validate a raw JSON value that should hold an observation object.
pub fn validate_value(value: &Value) -> Result<&Map<String, Value>, ValidationError> {
    let record = value.as_object().ok_or(ValidationError::NotAnObject)?;
    validate(record)?;
    Ok(record)
}

/// Validate an observation record.
pub fn validate(record: &Map<String, Value>) -> Result<(), ValidationError> {
    for field in REQUIRED_FIELDS {
        if !record.contains_key(field) {
            return Err(ValidationError::MissingField {
                field: field.to_string(),
            });
        }
    }

    let species = &record["species"];
    if !species.as_str().is_some_and(|s| SPECIES.contains(&s)) {
        return Err(ValidationError::InvalidSpecies {
            value: display_value(species),
        });
    }

    for &(field, min, max) in NUMERIC_FIELDS {
        if let Some(value) = record.get(field) {
            let number = coerce_number(value).ok_or_else(|| ValidationError::NotNumeric {
                field: field.to_string(),
            })?;
            if !(min..=max).contains(&number) {
                return Err(ValidationError::OutOfRange {
                    field: field.to_string(),
                    value: number,
                    min,
                    max,
                });
            }
        }
    }

    for &(field, allowed) in CATEGORICAL_FIELDS {
        if let Some(value) = record.get(field) {
            if !value.as_str().is_some_and(|s| allowed.contains(&s)) {
                return Err(ValidationError::InvalidCategory {
                    field: field.to_string(),
                    value: display_value(value),
                });
            }
        }
    }

    for &field in BOOLEAN_FIELDS {
        if let Some(value) = record.get(field) {
            if !value.is_boolean() {
                return Err(ValidationError::NotBoolean {
                    field: field.to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Coerce a JSON value to a number. Numeric strings are accepted and
/// booleans count as 1 and 0; nulls and containers are not numbers.
pub(crate) fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn minimal() -> Map<String, Value> {
        json!({"species": "cat", "symptoms_present": "none", "symptom_count": 0})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn minimal_record_is_valid() {
        assert!(validate(&minimal()).is_ok());
    }

    #[test]
    fn missing_required_fields_are_named() {
        for field in REQUIRED_FIELDS {
            let mut record = minimal();
            record.remove(field);
            let err = validate(&record).unwrap_err();
            assert_eq!(
                err,
                ValidationError::MissingField {
                    field: field.to_string()
                }
            );
            assert!(err.to_string().contains(field));
        }
    }

    #[test]
    fn required_checked_before_species() {
        let record = json!({"species": "dragon"});
        let err = validate_value(&record).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { .. }));
    }

    #[test]
    fn unknown_species_rejected() {
        let mut record = minimal();
        record.insert("species".into(), json!("dragon"));
        assert_eq!(
            validate(&record).unwrap_err().to_string(),
            "Invalid species: dragon"
        );
    }

    #[test]
    fn temperature_out_of_range_mentions_bounds() {
        let mut record = minimal();
        record.insert("temperature_c".into(), json!(100));
        let reason = validate(&record).unwrap_err().to_string();
        assert!(reason.contains("temperature_c"));
        assert!(reason.contains("30-45"));
    }

    #[test]
    fn non_numeric_is_distinct_from_out_of_range() {
        let mut record = minimal();
        record.insert("weight_kg".into(), json!("heavy"));
        assert_eq!(
            validate(&record).unwrap_err(),
            ValidationError::NotNumeric {
                field: "weight_kg".into()
            }
        );

        record.insert("weight_kg".into(), json!([20]));
        assert!(matches!(
            validate(&record).unwrap_err(),
            ValidationError::NotNumeric { .. }
        ));
    }

    #[test]
    fn booleans_coerce_to_numbers() {
        let mut record = minimal();
        record.insert("symptom_count".into(), json!(true));
        assert!(validate(&record).is_ok());
        assert_eq!(coerce_number(&json!(true)), Some(1.0));
        assert_eq!(coerce_number(&json!(false)), Some(0.0));

        record.insert("temperature_c".into(), json!(false));
        assert!(matches!(
            validate(&record).unwrap_err(),
            ValidationError::OutOfRange { .. }
        ));
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let mut record = minimal();
        record.insert("temperature_c".into(), json!("38.5"));
        assert!(validate(&record).is_ok());
    }

    #[test]
    fn null_numeric_is_rejected() {
        let mut record = minimal();
        record.insert("age_months".into(), Value::Null);
        assert!(matches!(
            validate(&record).unwrap_err(),
            ValidationError::NotNumeric { .. }
        ));
    }

    #[test]
    fn categorical_values_checked() {
        let mut record = minimal();
        record.insert("energy_level".into(), json!("hyper"));
        assert_eq!(
            validate(&record).unwrap_err().to_string(),
            "Invalid energy_level: hyper"
        );
        record.insert("energy_level".into(), json!("lethargic"));
        assert!(validate(&record).is_ok());
    }

    #[test]
    fn truthy_values_are_not_booleans() {
        for truthy in [json!("true"), json!(1), json!("yes")] {
            let mut record = minimal();
            record.insert("hydration_normal".into(), truthy);
            assert_eq!(
                validate(&record).unwrap_err(),
                ValidationError::NotBoolean {
                    field: "hydration_normal".into()
                }
            );
        }
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let mut record = minimal();
        record.insert("owner_name".into(), json!({"first": "Ada"}));
        assert!(validate(&record).is_ok());
    }

    #[test]
    fn non_object_rejected() {
        assert_eq!(
            validate_value(&json!([1, 2])).unwrap_err(),
            ValidationError::NotAnObject
        );
    }

    proptest! {
        #[test]
        fn numeric_bounds_are_inclusive(idx in 0..NUMERIC_FIELDS.len()) {
            let (field, min, max) = NUMERIC_FIELDS[idx];
            // symptom_count is required, so it is always present in the base record
            for edge in [min, max] {
                let mut record = minimal();
                record.insert(field.into(), json!(edge));
                prop_assert!(validate(&record).is_ok());
            }
            for outside in [min - 1.0, max + 1.0] {
                let mut record = minimal();
                record.insert(field.into(), json!(outside));
                let is_out_of_range = matches!(
                    validate(&record),
                    Err(ValidationError::OutOfRange { .. })
                );
                prop_assert!(is_out_of_range);
            }
        }

        #[test]
        fn in_range_numbers_pass(idx in 0..NUMERIC_FIELDS.len(), t in 0.0f64..=1.0) {
            let (field, min, max) = NUMERIC_FIELDS[idx];
            let mut record = minimal();
            record.insert(field.into(), json!(min + t * (max - min)));
            prop_assert!(validate(&record).is_ok());
        }
    }
}
