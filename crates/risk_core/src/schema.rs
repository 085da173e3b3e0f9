//! Fixed observation schema shared by validation, normalization and training.
//!
//! Every field the system recognizes is listed here once. The validator, the
//! normalizer's default tiers and the trainer's column typing all read from
//! these tables so they cannot drift apart.

/// Fields that must be present in every observation.
pub const REQUIRED_FIELDS: [&str; 3] = ["species", "symptoms_present", "symptom_count"];

/// Closed species set.
pub const SPECIES: &[&str] = &[
    "dog", "cat", "bird", "rabbit", "hamster", "fish", "reptile", "other",
];

/// Numeric vitals with inclusive `(min, max)` bounds.
pub const NUMERIC_FIELDS: &[(&str, f64, f64)] = &[
    ("age_months", 0.0, 300.0),
    ("weight_kg", 0.0, 200.0),
    ("temperature_c", 30.0, 45.0),
    ("heart_rate_bpm", 10.0, 1000.0),
    ("respiratory_rate_bpm", 5.0, 200.0),
    ("symptom_count", 0.0, 20.0),
];

/// Categorical descriptors with their closed value sets.
pub const CATEGORICAL_FIELDS: &[(&str, &[&str])] = &[
    ("gender", &["male", "female", "unknown"]),
    ("max_symptom_severity", &["none", "mild", "moderate", "severe"]),
    (
        "symptom_duration",
        &["none", "less-than-day", "1-3-days", "4-7-days", "more-than-week"],
    ),
    ("appetite_level", &["normal", "increased", "decreased", "none"]),
    ("energy_level", &["normal", "high", "low", "lethargic"]),
    ("coat_condition", &["good", "fair", "poor"]),
];

/// Boolean flags.
pub const BOOLEAN_FIELDS: &[&str] = &["is_senior", "is_young", "hydration_normal", "gait_normal"];

/// Free-form text fields (not validated against a value set).
pub const TEXT_FIELDS: &[&str] = &["breed", "symptoms_present"];

/// First default tier: categorical and string fields.
pub const STRING_DEFAULTS: &[(&str, &str)] = &[
    ("breed", "Unknown"),
    ("gender", "unknown"),
    ("symptoms_present", "none"),
    ("max_symptom_severity", "none"),
    ("symptom_duration", "none"),
    ("appetite_level", "normal"),
    ("energy_level", "normal"),
    ("coat_condition", "good"),
];

/// Second default tier: numeric fields. Clinically conservative values.
pub const NUMERIC_DEFAULTS: &[(&str, f64)] = &[
    ("age_months", 24.0),
    ("weight_kg", 5.0),
    ("temperature_c", 38.5),
    ("heart_rate_bpm", 120.0),
    ("respiratory_rate_bpm", 25.0),
    ("symptom_count", 0.0),
];

/// Third default tier: boolean flags. Assumes normal hydration and gait.
pub const BOOLEAN_DEFAULTS: &[(&str, bool)] = &[
    ("is_senior", false),
    ("is_young", false),
    ("hydration_normal", true),
    ("gait_normal", true),
];

/// String defaults applied when filling gaps in a training dataset.
pub const TRAINING_STRING_FILL: &[&str] = &[
    "breed",
    "gender",
    "symptoms_present",
    "max_symptom_severity",
    "symptom_duration",
];

/// Dataset columns that are never features.
pub const NON_FEATURE_COLUMNS: &[&str] = &[
    "record_id",
    "pet_id",
    "risk_score",
    "risk_category",
    "recommendation",
];

/// Dataset columns that would leak the target and are dropped on load.
pub const LEAKAGE_COLUMNS: &[&str] = &["risk_category", "recommendation"];

/// Column type used by the preprocessing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Boolean,
}

/// Column type for a feature name. Unregistered names are treated as text.
pub fn column_kind(name: &str) -> ColumnKind {
    if numeric_bounds(name).is_some() {
        ColumnKind::Numeric
    } else if BOOLEAN_FIELDS.contains(&name) {
        ColumnKind::Boolean
    } else {
        ColumnKind::Categorical
    }
}

pub fn numeric_bounds(name: &str) -> Option<(f64, f64)> {
    NUMERIC_FIELDS
        .iter()
        .find(|(field, _, _)| *field == name)
        .map(|&(_, min, max)| (min, max))
}

pub fn categorical_values(name: &str) -> Option<&'static [&'static str]> {
    CATEGORICAL_FIELDS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|&(_, values)| values)
}

pub fn string_default(name: &str) -> Option<&'static str> {
    lookup(STRING_DEFAULTS, name)
}

pub fn numeric_default(name: &str) -> Option<f64> {
    lookup(NUMERIC_DEFAULTS, name)
}

pub fn boolean_default(name: &str) -> Option<bool> {
    lookup(BOOLEAN_DEFAULTS, name)
}

fn lookup<T: Copy>(table: &[(&str, T)], name: &str) -> Option<T> {
    table
        .iter()
        .find(|(field, _)| *field == name)
        .map(|&(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_validated_field_has_a_default() {
        for (name, _, _) in NUMERIC_FIELDS {
            assert!(numeric_default(name).is_some(), "{name}");
        }
        for (name, values) in CATEGORICAL_FIELDS {
            let default = string_default(name).expect(name);
            assert!(values.contains(&default), "{name} default outside value set");
        }
        for name in BOOLEAN_FIELDS {
            assert!(boolean_default(name).is_some(), "{name}");
        }
    }

    #[test]
    fn numeric_defaults_are_within_bounds() {
        for (name, default) in NUMERIC_DEFAULTS {
            let (min, max) = numeric_bounds(name).expect(name);
            assert!((min..=max).contains(default), "{name}");
        }
    }

    #[test]
    fn column_kinds() {
        assert_eq!(column_kind("temperature_c"), ColumnKind::Numeric);
        assert_eq!(column_kind("gait_normal"), ColumnKind::Boolean);
        assert_eq!(column_kind("species"), ColumnKind::Categorical);
        assert_eq!(column_kind("breed"), ColumnKind::Categorical);
        assert_eq!(column_kind("something_new"), ColumnKind::Categorical);
    }
}
