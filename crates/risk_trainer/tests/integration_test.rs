//! End-to-end tests for the training pipeline
//!
//! Dataset on disk -> candidates -> selection -> persisted artifact set ->
//! loaded by the artifact store -> served by the prediction engine.

use anyhow::Result;
use chrono::{DateTime, Utc};
use pet_risk_core::artifacts::report_path;
use pet_risk_core::{ArtifactStore, PredictionEngine, RiskCategory};
use pet_risk_trainer::{
    resolve_input, train_from_csv, BoostingConfig, Dataset, ForestConfig, TrainerError,
    TrainingParams, TrainingPipeline,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const HEADER: &str = "record_id,pet_id,species,breed,age_months,weight_kg,temperature_c,heart_rate_bpm,symptoms_present,symptom_count,max_symptom_severity,symptom_duration,appetite_level,hydration_normal,risk_score,risk_category,recommendation";

const SPECIES: [&str; 3] = ["dog", "cat", "rabbit"];
const SEVERITY: [&str; 4] = ["none", "mild", "moderate", "severe"];
const DURATION: [&str; 4] = ["none", "less-than-day", "1-3-days", "more-than-week"];
const CATEGORY: [&str; 4] = ["Low", "Medium", "High", "Critical"];

/// Four well-separated risk levels with a few gaps to fill.
fn write_dataset(dir: &Path, rows: usize) -> Result<PathBuf> {
    let mut text = format!("{HEADER}\n");
    for i in 0..rows {
        let level = i % 4;
        let breed = if i % 7 == 0 { "" } else { "Mixed" };
        let age = if i % 11 == 0 {
            String::new()
        } else {
            (12 + i % 60).to_string()
        };
        let symptoms = if level == 0 { "none" } else { "lethargy;vomiting" };
        let score = 0.1 + 0.25 * level as f64 + (i % 3) as f64 * 0.02;
        text.push_str(&format!(
            "r{i},p{i},{},{breed},{age},{:.1},{:.1},{},{symptoms},{},{},{},{},{},{score:.3},{},see vet\n",
            SPECIES[i % 3],
            4.0 + (i % 9) as f64,
            38.0 + level as f64 + (i % 5) as f64 * 0.1,
            90 + level * 20 + i % 10,
            level * 2 + i % 2,
            SEVERITY[level],
            DURATION[level],
            if level < 2 { "normal" } else { "decreased" },
            if level < 2 { "True" } else { "False" },
            CATEGORY[level],
        ));
    }

    let path = dir.join("pet_health_dataset_20240101_120000.csv");
    fs::write(&path, text)?;
    Ok(path)
}

fn quick_params() -> TrainingParams {
    TrainingParams {
        forest: ForestConfig {
            n_trees: 10,
            ..ForestConfig::default()
        },
        boosting: BoostingConfig {
            rounds: 10,
            ..BoostingConfig::default()
        },
        ..TrainingParams::default()
    }
}

fn created_at() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T08:30:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn test_train_persist_load_predict() -> Result<()> {
    let data_dir = TempDir::new()?;
    let models_dir = TempDir::new()?;
    write_dataset(data_dir.path(), 120)?;

    let input = resolve_input(data_dir.path())?;
    let dataset = Dataset::from_csv(&input)?;
    assert_eq!(dataset.dropped_columns, vec!["risk_category", "recommendation"]);
    assert!(!dataset.feature_names.iter().any(|f| f == "risk_score"));

    let run = TrainingPipeline::new(quick_params()).train(&dataset)?;
    assert_eq!(run.results.len(), 3);
    let best = run.select_best()?;
    let artifact = run.build_artifact(&best.name, created_at())?;
    let persisted = artifact.persist(models_dir.path())?;
    assert_eq!(persisted.version, "20240601_083000");
    assert!(report_path(models_dir.path(), &persisted.version).exists());

    let leftovers: Vec<_> = fs::read_dir(models_dir.path())?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());

    let store = Arc::new(ArtifactStore::new(models_dir.path()));
    store.load_latest()?;
    let info = store.model_info().expect("model loaded");
    assert_eq!(info.model_version, "20240601_083000");
    assert_eq!(info.feature_count, dataset.feature_names.len());
    assert_eq!(info.model_type, best.name);
    assert_eq!(info.target_classes, ["Critical", "High", "Low", "Medium"]);

    let engine = PredictionEngine::new(store, "test");
    let minimal = engine.predict(&json!({
        "species": "cat",
        "symptoms_present": "none",
        "symptom_count": 0
    }))?;
    assert!(RiskCategory::ALL.contains(&minimal.category));
    assert!((0.0..=1.0).contains(&minimal.confidence));
    let total: f64 = minimal.probability_distribution.values().sum();
    assert!((total - 1.0).abs() < 1e-3);

    let severe = engine.predict(&json!({
        "species": "dog",
        "symptoms_present": "lethargy;vomiting",
        "symptom_count": 6,
        "temperature_c": 41.2,
        "heart_rate_bpm": 155,
        "max_symptom_severity": "severe",
        "symptom_duration": "more-than-week",
        "appetite_level": "decreased",
        "hydration_normal": false
    }))?;
    assert!(severe.high_risk, "got {}", severe.category);

    Ok(())
}

#[test]
fn test_deterministic_training() -> Result<()> {
    let data_dir = TempDir::new()?;
    let path = write_dataset(data_dir.path(), 80)?;

    let run1 = train_from_csv(&path, quick_params())?;
    let run2 = train_from_csv(&path, quick_params())?;
    assert_eq!(run1.select_best()?.name, run2.select_best()?.name);

    let name = run1.select_best()?.name.clone();
    let dir1 = TempDir::new()?;
    let dir2 = TempDir::new()?;
    let a = run1.build_artifact(&name, created_at())?.persist(dir1.path())?;
    let b = run2.build_artifact(&name, created_at())?.persist(dir2.path())?;

    assert_eq!(a.model_hash, b.model_hash, "Model hashes should be identical");
    assert_eq!(fs::read(&a.metadata_path)?, fs::read(&b.metadata_path)?);
    Ok(())
}

#[test]
fn test_invalid_dataset_aborts_before_training() -> Result<()> {
    let data_dir = TempDir::new()?;
    let path = data_dir.path().join("pet_health_dataset_bad.csv");
    fs::write(
        &path,
        format!("{HEADER}\nr1,p1,dog,Lab,24,20.0,38.5,100,none,0,none,none,normal,True,1.5,Critical,x\n"),
    )?;

    let err = train_from_csv(&path, quick_params()).unwrap_err();
    assert!(matches!(err, TrainerError::Dataset(_)));
    Ok(())
}

#[test]
fn test_missing_dataset_directory_reports_no_dataset() -> Result<()> {
    let empty = TempDir::new()?;
    assert!(matches!(
        resolve_input(empty.path()),
        Err(TrainerError::NoDataset { .. })
    ));
    Ok(())
}
