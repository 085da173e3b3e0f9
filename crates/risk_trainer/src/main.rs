//! Pet health risk trainer CLI
//!
//! Trains every candidate on the newest dataset, selects one with the
//! safety-weighted score and writes a versioned artifact set.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use pet_risk_core::{logging, ArtifactStore, PredictionEngine};
use pet_risk_trainer::{
    resolve_input, selection_score, BoostingConfig, Dataset, ForestConfig, LogisticParams,
    TrainingParams, TrainingPipeline,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "pet-risk-train")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and select pet health risk models", long_about = None)]
struct Args {
    /// Dataset CSV, or a directory holding pet_health_dataset_*.csv files
    #[arg(short, long, default_value = ".")]
    input: PathBuf,

    /// Output directory for the versioned artifacts
    #[arg(short, long, default_value = "models")]
    output: PathBuf,

    /// Random seed for the split and the tree ensembles
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Validation fraction
    #[arg(long, default_value = "0.2")]
    val_fraction: f64,

    /// Test fraction
    #[arg(long, default_value = "0.2")]
    test_fraction: f64,

    /// Logistic regression iteration limit
    #[arg(long, default_value = "1000")]
    max_iter: usize,

    /// Number of random forest trees
    #[arg(long, default_value = "100")]
    forest_trees: usize,

    /// Maximum random forest tree depth
    #[arg(long, default_value = "10")]
    forest_max_depth: usize,

    /// Number of boosting rounds
    #[arg(long, default_value = "100")]
    boosting_rounds: usize,

    /// Maximum boosting tree depth
    #[arg(long, default_value = "6")]
    boosting_max_depth: usize,

    /// Boosting learning rate
    #[arg(long, default_value = "0.1")]
    learning_rate: f64,

    /// Skip loading the written version back for a sample prediction
    #[arg(long)]
    no_smoke_check: bool,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    logging::init(log_level, args.json_logs).context("Failed to set tracing subscriber")?;

    info!("Pet health risk trainer v{}", env!("CARGO_PKG_VERSION"));

    let input = resolve_input(&args.input).context("Failed to locate dataset")?;
    info!("Loading dataset from: {}", input.display());
    let dataset = Dataset::from_csv(&input).context("Failed to load dataset")?;
    info!(
        rows = dataset.len(),
        features = dataset.feature_names.len(),
        distribution = ?dataset.class_counts(),
        "Dataset loaded"
    );

    let params = TrainingParams {
        seed: args.seed,
        val_fraction: args.val_fraction,
        test_fraction: args.test_fraction,
        logistic: LogisticParams {
            max_iter: args.max_iter,
            ..LogisticParams::default()
        },
        forest: ForestConfig {
            n_trees: args.forest_trees,
            max_depth: args.forest_max_depth,
            ..ForestConfig::default()
        },
        boosting: BoostingConfig {
            rounds: args.boosting_rounds,
            max_depth: args.boosting_max_depth,
            learning_rate: args.learning_rate,
            ..BoostingConfig::default()
        },
    };

    let run = TrainingPipeline::new(params)
        .train(&dataset)
        .context("Training failed")?;
    for result in &run.results {
        info!(
            "  {}: val={:.3} test={:.3} score={:.3}",
            result.name,
            result.val_score,
            result.test_score,
            selection_score(result)
        );
    }

    let best = run.select_best()?;
    info!("Best model: {}", best.name);

    let artifact = run
        .build_artifact(&best.name, Utc::now())
        .context("Failed to assemble artifact set")?;
    for entry in artifact.metadata.feature_importance.iter().take(10) {
        info!("  {}: {:.4}", entry.feature, entry.importance);
    }

    let persisted = artifact
        .persist(&args.output)
        .context("Failed to write artifacts")?;
    info!("Training completed successfully");
    info!("  Version: {}", persisted.version);
    info!("  Model: {}", persisted.model_path.display());
    info!("  Hash: {}", persisted.model_hash);

    if !args.no_smoke_check {
        smoke_check(&args.output, &persisted.version)?;
    }

    Ok(())
}

/// Load the freshly written version and assess one sample observation.
fn smoke_check(models_dir: &Path, version: &str) -> Result<()> {
    let store = Arc::new(ArtifactStore::new(models_dir));
    store
        .load_version(version)
        .with_context(|| format!("Written version {version} failed to load"))?;

    let engine = PredictionEngine::new(store, env!("CARGO_PKG_VERSION"));
    let sample = json!({
        "species": "dog",
        "breed": "Labrador Retriever",
        "age_months": 36,
        "weight_kg": 28.5,
        "temperature_c": 39.2,
        "heart_rate_bpm": 110,
        "symptoms_present": "lethargy,vomiting",
        "symptom_count": 2,
        "max_symptom_severity": "moderate",
        "symptom_duration": "1-3-days",
        "appetite_level": "decreased",
        "energy_level": "low",
        "hydration_normal": false,
    });

    match engine.predict(&sample) {
        Ok(assessment) => info!(
            category = %assessment.category,
            confidence = assessment.confidence,
            "Smoke check prediction"
        ),
        Err(e) => warn!(error = %e, "Smoke check prediction failed"),
    }
    Ok(())
}
