//! Feature importance ranking for the selected model

use pet_risk_core::models::Classifier;
use pet_risk_core::{FeatureImportance, ModelBundle};

/// Importances of the bundle's classifier, named after the encoded columns
/// of its preprocessing step and ranked descending. Equal values keep the
/// encoding order.
pub fn rank_importance(bundle: &ModelBundle) -> Vec<FeatureImportance> {
    let values = bundle.classifier.feature_importances();
    let mut names = bundle.preprocessor.output_feature_names();
    if names.len() != values.len() {
        names = (0..values.len()).map(|i| format!("feature_{i}")).collect();
    }

    let mut ranked: Vec<FeatureImportance> = names
        .into_iter()
        .zip(values)
        .map(|(feature, importance)| FeatureImportance { feature, importance })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use pet_risk_core::models::LogisticModel;
    use pet_risk_core::preprocess::{CategoricalColumn, NumericColumn};
    use pet_risk_core::{ClassifierModel, Preprocessor};

    fn preprocessor() -> Preprocessor {
        Preprocessor {
            numeric: vec![NumericColumn {
                name: "temperature_c".to_string(),
                mean: 38.5,
                scale: 1.0,
            }],
            categorical: vec![CategoricalColumn {
                name: "species".to_string(),
                categories: vec!["bird".into(), "cat".into(), "dog".into()],
            }],
            boolean: vec!["gait_normal".to_string()],
        }
    }

    #[test]
    fn test_linear_importance_is_absolute_first_row() {
        let classifier = LogisticModel {
            coefficients: vec![vec![-0.5, 2.0, 0.0, 0.5], vec![9.0, 9.0, 9.0, 9.0]],
            intercepts: vec![0.0, 0.0],
        };
        let bundle = ModelBundle::new(preprocessor(), ClassifierModel::LogisticRegression(classifier));
        let ranked = rank_importance(&bundle);

        let names: Vec<&str> = ranked.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(names, vec!["species_cat", "temperature_c", "gait_normal", "species_dog"]);
        assert_eq!(ranked[1].importance, 0.5);
        assert_eq!(ranked[3].importance, 0.0);
    }

    #[test]
    fn test_width_mismatch_uses_positional_names() {
        let classifier = LogisticModel {
            coefficients: vec![vec![1.0, 3.0]],
            intercepts: vec![0.0],
        };
        let bundle = ModelBundle::new(preprocessor(), ClassifierModel::LogisticRegression(classifier));
        let ranked = rank_importance(&bundle);
        assert_eq!(ranked[0].feature, "feature_1");
        assert_eq!(ranked[1].feature, "feature_0");
    }
}
