//! Preprocessing step fitted together with each classifier
//!
//! Numeric columns are standardized, categorical columns are one-hot
//! encoded with the first (sorted) level dropped, boolean columns pass
//! through as 0/1. Categories never seen during fitting encode as all
//! zeros instead of failing.

use crate::features::FeatureVector;
use crate::schema::{column_kind, ColumnKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    pub mean: f64,
    pub scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    /// All fitted levels in sorted order; the first one is dropped.
    pub categories: Vec<String>,
}

impl CategoricalColumn {
    fn kept(&self) -> &[String] {
        self.categories.get(1..).unwrap_or(&[])
    }
}

/// Fitted column transformer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub numeric: Vec<NumericColumn>,
    pub categorical: Vec<CategoricalColumn>,
    pub boolean: Vec<String>,
}

impl Preprocessor {
    /// Fit on training rows that all share the same feature schema.
    pub fn fit(rows: &[FeatureVector]) -> Result<Self, String> {
        let first = rows.first().ok_or("cannot fit preprocessing on zero rows")?;
        let mut preprocessor = Preprocessor::default();

        for (idx, name) in first.names().iter().enumerate() {
            match column_kind(name) {
                ColumnKind::Numeric => {
                    let values = rows
                        .iter()
                        .map(|row| {
                            row.values()[idx].as_f64().ok_or_else(|| {
                                format!("non-numeric value in numeric column '{name}'")
                            })
                        })
                        .collect::<Result<Vec<f64>, String>>()?;
                    let n = values.len() as f64;
                    let mean = values.iter().sum::<f64>() / n;
                    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                    let std = variance.sqrt();
                    preprocessor.numeric.push(NumericColumn {
                        name: name.clone(),
                        mean,
                        scale: if std > f64::EPSILON { std } else { 1.0 },
                    });
                }
                ColumnKind::Categorical => {
                    let levels: BTreeSet<String> = rows
                        .iter()
                        .map(|row| row.values()[idx].as_category())
                        .collect();
                    preprocessor.categorical.push(CategoricalColumn {
                        name: name.clone(),
                        categories: levels.into_iter().collect(),
                    });
                }
                ColumnKind::Boolean => preprocessor.boolean.push(name.clone()),
            }
        }

        Ok(preprocessor)
    }

    /// Encode one feature vector into the model input space.
    pub fn transform(&self, features: &FeatureVector) -> Result<Vec<f64>, String> {
        let mut out = Vec::with_capacity(self.output_width());

        for column in &self.numeric {
            let value = features
                .get(&column.name)
                .and_then(|v| v.as_f64())
                .ok_or_else(|| format!("numeric feature '{}' missing or invalid", column.name))?;
            out.push((value - column.mean) / column.scale);
        }

        for column in &self.categorical {
            let value = features
                .get(&column.name)
                .map(|v| v.as_category())
                .ok_or_else(|| format!("categorical feature '{}' missing", column.name))?;
            out.extend(
                column
                    .kept()
                    .iter()
                    .map(|level| if *level == value { 1.0 } else { 0.0 }),
            );
        }

        for name in &self.boolean {
            let value = features
                .get(name)
                .and_then(|v| v.as_f64())
                .ok_or_else(|| format!("boolean feature '{name}' missing or invalid"))?;
            out.push(value);
        }

        Ok(out)
    }

    /// Input column names, in encoding order.
    pub fn input_columns(&self) -> Vec<&str> {
        self.numeric
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.categorical.iter().map(|c| c.name.as_str()))
            .chain(self.boolean.iter().map(String::as_str))
            .collect()
    }

    /// Human-readable names of the encoded columns.
    pub fn output_feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|c| c.name.clone()).collect();
        for column in &self.categorical {
            names.extend(
                column
                    .kept()
                    .iter()
                    .map(|level| format!("{}_{}", column.name, level)),
            );
        }
        names.extend(self.boolean.iter().cloned());
        names
    }

    pub fn output_width(&self) -> usize {
        self.numeric.len()
            + self.categorical.iter().map(|c| c.kept().len()).sum::<usize>()
            + self.boolean.len()
    }
}
