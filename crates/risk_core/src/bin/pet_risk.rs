//! Pet health risk CLI
//!
//! Loads the newest artifact set and answers prediction, model-info and
//! readiness queries as JSON on stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pet_risk_core::{logging, ArtifactStore, PredictionEngine, ServiceConfig};
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "pet-risk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pet health risk assessment from versioned model artifacts", long_about = None)]
struct Args {
    /// TOML config file (overrides PET_RISK_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Models directory (overrides config and environment)
    #[arg(short, long)]
    models_dir: Option<PathBuf>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assess one observation (JSON object from a file, or stdin when omitted)
    Predict {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Describe the loaded model
    Info,
    /// Report readiness and the loaded version
    Health,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let mut config = ServiceConfig::from_file(path)?;
            config.apply_overrides(|var| std::env::var(var).ok())?;
            config
        }
        None => ServiceConfig::load()?,
    };
    if let Some(dir) = args.models_dir {
        config.models_dir = dir;
    }
    logging::init(&config.log_level, config.json_logs || args.json_logs)
        .context("Failed to set tracing subscriber")?;

    info!(
        "Pet risk service v{} (models: {})",
        config.service_version,
        config.models_dir.display()
    );

    let store = Arc::new(ArtifactStore::new(&config.models_dir));
    if let Err(e) = store.load_latest() {
        // Health still answers; the other commands fail below.
        error!(error = %e, "No artifact set loaded");
    }

    match args.command {
        Command::Health => print_json(&serde_json::to_value(store.readiness())?),
        Command::Info => {
            let info = store
                .model_info()
                .context("Service not ready: no model loaded")?;
            print_json(&serde_json::to_value(info)?)
        }
        Command::Predict { input } => {
            let raw = read_observation(input)?;
            let engine = PredictionEngine::new(store, config.service_version.clone());
            match engine.predict_response(&raw) {
                Ok(response) => print_json(&serde_json::to_value(response)?),
                Err(e) => {
                    error!(error = %e, "Prediction failed");
                    anyhow::bail!("{}", e.public_message())
                }
            }
        }
    }
}

fn read_observation(input: Option<PathBuf>) -> Result<Value> {
    let text = match input {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read observation from stdin")?;
            buf
        }
    };
    serde_json::from_str(&text).context("Observation is not valid JSON")
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
