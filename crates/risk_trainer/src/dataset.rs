//! CSV dataset loading and preparation
//!
//! Reads one observation per row, enforces the dataset preconditions
//! (risk_score present and within [0, 1], species present), drops target
//! leakage columns, fills gaps and derives the risk category target.

use pet_risk_core::schema::{
    self, boolean_default, column_kind, ColumnKind, LEAKAGE_COLUMNS, NON_FEATURE_COLUMNS,
    TRAINING_STRING_FILL,
};
use pet_risk_core::{normalize, FeatureValue, FeatureVector, ObservationRecord, RiskCategory};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

use crate::errors::TrainerError;

/// File name prefix of generated datasets.
pub const DATASET_PREFIX: &str = "pet_health_dataset_";

/// Level used for categorical gaps with no training fill value.
pub const MISSING_CATEGORY: &str = "missing";

/// Cell texts read as missing values, as pandas `read_csv` does by default.
/// Matching is case-sensitive: lowercase `none` is a real category level.
pub const MISSING_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// An empty cell or a missing-value token.
pub fn is_missing(cell: &str) -> bool {
    cell.is_empty() || MISSING_TOKENS.contains(&cell)
}

/// Prepared training dataset
#[derive(Clone, Debug)]
pub struct Dataset {
    /// Feature columns in file order
    pub feature_names: Vec<String>,
    pub rows: Vec<FeatureVector>,
    pub risk_scores: Vec<f64>,
    pub labels: Vec<RiskCategory>,
    /// Leakage columns removed on load
    pub dropped_columns: Vec<String>,
    /// BLAKE3 hex digest of the source bytes
    pub source_hash: String,
}

impl Dataset {
    /// Load dataset from CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, TrainerError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| TrainerError::io(path, e))?;
        Self::from_reader(bytes.as_slice())
    }

    /// Load dataset from any CSV source with a header row
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, TrainerError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| TrainerError::Dataset(format!("failed to read dataset: {e}")))?;
        let source_hash = hex::encode(blake3::hash(&bytes).as_bytes());

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(bytes.as_slice());
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let column = |name: &str| headers.iter().position(|h| h == name);

        let score_idx = column("risk_score")
            .ok_or_else(|| TrainerError::Dataset("missing risk_score column".to_string()))?;
        let species_idx = column("species")
            .ok_or_else(|| TrainerError::Dataset("missing species column".to_string()))?;

        let dropped_columns: Vec<String> = LEAKAGE_COLUMNS
            .iter()
            .filter(|&&c| column(c).is_some())
            .map(|c| c.to_string())
            .collect();
        if !dropped_columns.is_empty() {
            info!(columns = ?dropped_columns, "Removing potential leakage columns");
        }

        let features: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !NON_FEATURE_COLUMNS.contains(&h.as_str()))
            .map(|(i, h)| (i, h.clone()))
            .collect();
        for (_, name) in &features {
            if schema::string_default(name).is_none()
                && schema::numeric_default(name).is_none()
                && boolean_default(name).is_none()
            {
                warn!(column = %name, "Unregistered feature column; requests must supply it");
            }
        }

        let mut cells: Vec<Vec<Option<String>>> = Vec::new();
        let mut risk_scores = Vec::new();
        for (row_idx, record) in rdr.records().enumerate() {
            let record = record?;
            let line = row_idx + 2;

            let score_text = record.get(score_idx).unwrap_or("");
            if is_missing(score_text) {
                return Err(TrainerError::Dataset(format!(
                    "line {line}: risk_score is missing"
                )));
            }
            let score: f64 = score_text.parse().map_err(|_| {
                TrainerError::Dataset(format!("line {line}: risk_score '{score_text}' is not a number"))
            })?;
            if !(0.0..=1.0).contains(&score) {
                return Err(TrainerError::Dataset(format!(
                    "line {line}: risk_score {score} is outside [0, 1]"
                )));
            }
            if record.get(species_idx).map_or(true, is_missing) {
                return Err(TrainerError::Dataset(format!("line {line}: species is missing")));
            }

            risk_scores.push(score);
            cells.push(
                features
                    .iter()
                    .map(|(i, _)| {
                        record
                            .get(*i)
                            .filter(|s| !is_missing(s))
                            .map(str::to_string)
                    })
                    .collect(),
            );
        }

        if risk_scores.is_empty() {
            return Err(TrainerError::Dataset("dataset is empty".to_string()));
        }

        let feature_names: Vec<String> = features.into_iter().map(|(_, name)| name).collect();
        let rows = fill_rows(&feature_names, &cells)?;
        let labels = risk_scores
            .iter()
            .map(|&s| {
                RiskCategory::from_score(s)
                    .ok_or_else(|| TrainerError::Dataset(format!("risk_score {s} has no category")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            feature_names,
            rows,
            risk_scores,
            labels,
            dropped_columns,
            source_hash,
        })
    }

    /// Get number of samples
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if dataset is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Samples per derived category
    pub fn class_counts(&self) -> BTreeMap<RiskCategory, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(*label).or_insert(0) += 1;
        }
        counts
    }
}

/// Type every cell and fill the gaps: string fill values first, then
/// column medians for numerics, then boolean defaults.
fn fill_rows(
    names: &[String],
    cells: &[Vec<Option<String>>],
) -> Result<Vec<FeatureVector>, TrainerError> {
    let mut columns: Vec<Vec<Option<FeatureValue>>> = Vec::with_capacity(names.len());

    for (col, name) in names.iter().enumerate() {
        let raw = cells.iter().map(|row| row[col].as_deref());
        let typed: Vec<Option<FeatureValue>> = match column_kind(name) {
            ColumnKind::Numeric => {
                let mut values = raw
                    .enumerate()
                    .map(|(row, cell)| {
                        cell.map(|s| {
                            s.parse::<f64>()
                                .ok()
                                .filter(|v| v.is_finite())
                                .ok_or_else(|| {
                                    TrainerError::Dataset(format!(
                                        "line {}: {name} '{s}' is not a finite number",
                                        row + 2
                                    ))
                                })
                        })
                        .transpose()
                    })
                    .collect::<Result<Vec<Option<f64>>, _>>()?;
                let fill = median(values.iter().flatten().copied())
                    .or_else(|| schema::numeric_default(name))
                    .ok_or_else(|| TrainerError::Dataset(format!("column {name} has no values")))?;
                values
                    .iter_mut()
                    .map(|v| Some(FeatureValue::Number(v.take().unwrap_or(fill))))
                    .collect()
            }
            ColumnKind::Boolean => raw
                .enumerate()
                .map(|(row, cell)| match cell {
                    Some(s) => parse_flag(s).map(|b| Some(FeatureValue::Flag(b))).ok_or_else(|| {
                        TrainerError::Dataset(format!(
                            "line {}: {name} '{s}' is not a boolean",
                            row + 2
                        ))
                    }),
                    None => Ok(Some(FeatureValue::Flag(
                        boolean_default(name).unwrap_or(false),
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            ColumnKind::Categorical => {
                let fill = if TRAINING_STRING_FILL.contains(&name.as_str()) {
                    schema::string_default(name).unwrap_or(MISSING_CATEGORY)
                } else {
                    MISSING_CATEGORY
                };
                raw.map(|cell| Some(FeatureValue::from(cell.unwrap_or(fill))))
                    .collect()
            }
        };
        columns.push(typed);
    }

    (0..cells.len())
        .map(|row| {
            let record = names
                .iter()
                .zip(&mut columns)
                .fold(ObservationRecord::new(), |record, (name, column)| {
                    match column[row].take() {
                        Some(value) => record.with(name.clone(), value),
                        None => record,
                    }
                });
            normalize(&record, names).map_err(|e| TrainerError::Dataset(e.to_string()))
        })
        .collect()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Median of the values; the mean of the two middle values for even counts.
pub fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sorted: Vec<f64> = values.collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Most recently modified `pet_health_dataset_*.csv` in `dir`.
pub fn find_latest(dir: &Path) -> Result<PathBuf, TrainerError> {
    let entries = fs::read_dir(dir).map_err(|e| TrainerError::io(dir, e))?;

    let mut best: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| TrainerError::io(dir, e))?;
        let name = entry.file_name();
        let matches = name
            .to_str()
            .map_or(false, |n| n.starts_with(DATASET_PREFIX) && n.ends_with(".csv"));
        if !matches {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| TrainerError::io(entry.path(), e))?;
        let candidate = (modified, entry.path());
        if best.as_ref().map_or(true, |b| candidate > *b) {
            best = Some(candidate);
        }
    }

    best.map(|(_, path)| path).ok_or_else(|| TrainerError::NoDataset {
        dir: dir.to_path_buf(),
    })
}

/// A file is used as-is; a directory resolves to its newest dataset.
pub fn resolve_input(path: &Path) -> Result<PathBuf, TrainerError> {
    if path.is_dir() {
        find_latest(path)
    } else {
        Ok(path.to_path_buf())
    }
}
