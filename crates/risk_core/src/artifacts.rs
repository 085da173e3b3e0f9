//! Versioned artifact storage
//!
//! One training run produces one version token and three co-versioned files
//! in the models directory:
//!
//! - `pet_health_model_<version>.json`: preprocessing + classifier bundle
//! - `target_encoder_<version>.json`: class label encoder
//! - `model_metadata_<version>.json`: feature schema, classes, metrics
//!
//! plus an optional `evaluation_report_<version>.json` that is never needed
//! for loading. A version is loadable only when the whole triple is present
//! and consistent. [`ArtifactStore`] holds the currently served set behind a
//! lock and swaps it atomically on reload.

use crate::errors::{ArtifactError, ArtifactResult};
use crate::models::{Classifier, LabelCodec, ModelBundle, RiskModel, TargetEncoder};
use crate::types::{ModelInfo, PerformanceMetrics, Readiness};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, instrument, warn};

const MODEL_PREFIX: &str = "pet_health_model_";
const ENCODER_PREFIX: &str = "target_encoder_";
const METADATA_PREFIX: &str = "model_metadata_";
const REPORT_PREFIX: &str = "evaluation_report_";
const EXTENSION: &str = ".json";

/// Version token format (UTC creation time).
pub const VERSION_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Version token for an artifact created at `at`.
pub fn version_token(at: DateTime<Utc>) -> String {
    at.format(VERSION_FORMAT).to_string()
}

pub fn model_path(dir: &Path, version: &str) -> PathBuf {
    dir.join(format!("{MODEL_PREFIX}{version}{EXTENSION}"))
}

pub fn encoder_path(dir: &Path, version: &str) -> PathBuf {
    dir.join(format!("{ENCODER_PREFIX}{version}{EXTENSION}"))
}

pub fn metadata_path(dir: &Path, version: &str) -> PathBuf {
    dir.join(format!("{METADATA_PREFIX}{version}{EXTENSION}"))
}

pub fn report_path(dir: &Path, version: &str) -> PathBuf {
    dir.join(format!("{REPORT_PREFIX}{version}{EXTENSION}"))
}

/// BLAKE3 digest of a serialized model, hex encoded.
pub fn model_digest(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// One entry of the ranked importance list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Metadata document stored alongside each model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub model_type: String,
    /// Version token of the training run
    pub timestamp: String,
    /// Input schema, in the order the normalizer must produce it
    pub feature_names: Vec<String>,
    pub target_classes: Vec<String>,
    pub performance_metrics: PerformanceMetrics,
    #[serde(default)]
    pub feature_importance: Vec<FeatureImportance>,
    /// BLAKE3 hex digest of the model file
    #[serde(default)]
    pub model_hash: Option<String>,
}

/// The unit consumed at inference time. Never mutated after construction.
pub struct ArtifactSet {
    pub version: String,
    pub model: Arc<dyn RiskModel>,
    pub encoder: Arc<dyn LabelCodec>,
    pub metadata: ArtifactMetadata,
}

impl ArtifactSet {
    pub fn new(
        version: impl Into<String>,
        model: Arc<dyn RiskModel>,
        encoder: Arc<dyn LabelCodec>,
        metadata: ArtifactMetadata,
    ) -> Self {
        Self {
            version: version.into(),
            model,
            encoder,
            metadata,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.metadata.feature_names
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model_version: self.version.clone(),
            feature_count: self.metadata.feature_names.len(),
            target_classes: self.metadata.target_classes.clone(),
            model_type: self.metadata.model_type.clone(),
            performance_metrics: self.metadata.performance_metrics.clone(),
        }
    }
}

impl fmt::Debug for ArtifactSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactSet")
            .field("version", &self.version)
            .field("model_type", &self.metadata.model_type)
            .field("feature_count", &self.metadata.feature_names.len())
            .finish()
    }
}

/// Locate the newest version in `dir`.
///
/// Candidates are the versioned model files; the most recently modified one
/// wins and equal times fall back to the larger version token. Only model
/// files are considered, so a version whose model was never written is
/// invisible here.
pub fn discover_latest(dir: &Path) -> ArtifactResult<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ArtifactError::NotFound {
                dir: dir.to_path_buf(),
            })
        }
        Err(e) => return Err(ArtifactError::io(dir, e)),
    };

    let mut best: Option<(SystemTime, String)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| ArtifactError::io(dir, e))?;
        let name = entry.file_name();
        let Some(version) = name
            .to_str()
            .and_then(|n| n.strip_prefix(MODEL_PREFIX))
            .and_then(|n| n.strip_suffix(EXTENSION))
            .filter(|v| !v.is_empty())
        else {
            continue;
        };

        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| ArtifactError::io(entry.path(), e))?;
        let candidate = (modified, version.to_string());
        if best.as_ref().map_or(true, |b| candidate > *b) {
            best = Some(candidate);
        }
    }

    best.map(|(_, version)| version)
        .ok_or_else(|| ArtifactError::NotFound {
            dir: dir.to_path_buf(),
        })
}

/// Load and cross-check one version. All-or-nothing.
#[instrument(skip(dir), fields(dir = %dir.display()))]
pub fn load_version(dir: &Path, version: &str) -> ArtifactResult<ArtifactSet> {
    let model_file = model_path(dir, version);
    let encoder_file = encoder_path(dir, version);
    let metadata_file = metadata_path(dir, version);

    for path in [&model_file, &encoder_file, &metadata_file] {
        if !path.is_file() {
            return Err(ArtifactError::MissingArtifact { path: path.clone() });
        }
    }

    let metadata = read_metadata(&metadata_file, version)?;

    let model_bytes = fs::read(&model_file).map_err(|e| ArtifactError::io(&model_file, e))?;
    if let Some(expected) = &metadata.model_hash {
        let actual = model_digest(&model_bytes);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(ArtifactError::Corrupt {
                path: model_file,
                reason: format!("hash mismatch: expected {expected}, got {actual}"),
            });
        }
    }
    let bundle: ModelBundle =
        serde_json::from_slice(&model_bytes).map_err(|e| ArtifactError::Corrupt {
            path: model_file.clone(),
            reason: e.to_string(),
        })?;
    bundle.validate().map_err(|reason| ArtifactError::Corrupt {
        path: model_file.clone(),
        reason,
    })?;

    let encoder_bytes =
        fs::read(&encoder_file).map_err(|e| ArtifactError::io(&encoder_file, e))?;
    let encoder: TargetEncoder =
        serde_json::from_slice(&encoder_bytes).map_err(|e| ArtifactError::Corrupt {
            path: encoder_file.clone(),
            reason: e.to_string(),
        })?;

    check_consistency(version, &metadata, &bundle, &encoder)?;

    info!(
        version,
        model_type = %metadata.model_type,
        feature_count = metadata.feature_names.len(),
        target_classes = ?metadata.target_classes,
        "Loaded artifact set"
    );

    Ok(ArtifactSet::new(
        version,
        Arc::new(bundle),
        Arc::new(encoder),
        metadata,
    ))
}

fn read_metadata(path: &Path, version: &str) -> ArtifactResult<ArtifactMetadata> {
    let text = fs::read_to_string(path).map_err(|e| ArtifactError::io(path, e))?;
    let invalid = |reason: String| ArtifactError::InvalidMetadata {
        version: version.to_string(),
        reason,
    };

    let raw: Value = serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;
    let object = raw
        .as_object()
        .ok_or_else(|| invalid("not a JSON object".to_string()))?;
    match object.get("feature_names") {
        None | Some(Value::Null) => {
            return Err(ArtifactError::MissingFeatureNames {
                version: version.to_string(),
            })
        }
        Some(Value::Array(names)) if names.is_empty() => {
            return Err(ArtifactError::MissingFeatureNames {
                version: version.to_string(),
            })
        }
        Some(_) => {}
    }

    serde_json::from_value(raw).map_err(|e| invalid(e.to_string()))
}

fn check_consistency(
    version: &str,
    metadata: &ArtifactMetadata,
    bundle: &ModelBundle,
    encoder: &TargetEncoder,
) -> ArtifactResult<()> {
    let inconsistent = |reason: String| ArtifactError::Inconsistent {
        version: version.to_string(),
        reason,
    };

    if encoder.classes() != metadata.target_classes.as_slice() {
        return Err(inconsistent(format!(
            "encoder classes {:?} differ from metadata target_classes {:?}",
            encoder.classes(),
            metadata.target_classes
        )));
    }
    if bundle.classifier.n_classes() != metadata.target_classes.len() {
        return Err(inconsistent(format!(
            "model predicts {} classes, metadata lists {}",
            bundle.classifier.n_classes(),
            metadata.target_classes.len()
        )));
    }

    let expected: BTreeSet<&str> = metadata.feature_names.iter().map(String::as_str).collect();
    let actual: BTreeSet<&str> = bundle.preprocessor.input_columns().into_iter().collect();
    if expected != actual || expected.len() != metadata.feature_names.len() {
        return Err(inconsistent(
            "model input columns differ from metadata feature_names".to_string(),
        ));
    }

    Ok(())
}

/// Where a persisted version landed.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedArtifacts {
    pub version: String,
    pub model_path: PathBuf,
    pub encoder_path: PathBuf,
    pub metadata_path: PathBuf,
    pub report_path: Option<PathBuf>,
    pub model_hash: String,
}

/// Write one version to `dir`.
///
/// Every file is first written under a temporary name. The model file is
/// renamed into place last, so discovery never sees a version whose other
/// members are missing. On failure all files of this attempt are removed.
/// A version whose model file is already published is never overwritten.
/// The model hash is computed here and stored in the metadata.
#[instrument(skip_all, fields(dir = %dir.display(), version = %metadata.timestamp))]
pub fn persist(
    dir: &Path,
    bundle: &ModelBundle,
    encoder: &TargetEncoder,
    mut metadata: ArtifactMetadata,
    report: Option<&Value>,
) -> ArtifactResult<PersistedArtifacts> {
    let version = metadata.timestamp.clone();
    fs::create_dir_all(dir).map_err(|e| ArtifactError::io(dir, e))?;

    let target = model_path(dir, &version);
    if target.exists() {
        return Err(ArtifactError::VersionExists {
            version,
            path: target,
        });
    }

    let model_bytes = serde_json::to_vec_pretty(bundle)?;
    let model_hash = model_digest(&model_bytes);
    metadata.model_hash = Some(model_hash.clone());

    let mut staged: Vec<(PathBuf, Vec<u8>)> = vec![
        (
            encoder_path(dir, &version),
            serde_json::to_vec_pretty(encoder)?,
        ),
        (
            metadata_path(dir, &version),
            serde_json::to_vec_pretty(&metadata)?,
        ),
    ];
    if let Some(report) = report {
        staged.push((report_path(dir, &version), serde_json::to_vec_pretty(report)?));
    }
    // Discovery keys off this file: it must be last.
    staged.push((model_path(dir, &version), model_bytes));

    let mut written: Vec<PathBuf> = Vec::with_capacity(staged.len() * 2);
    if let Err(e) = write_staged(&staged, &mut written) {
        for path in &written {
            let _ = fs::remove_file(path);
        }
        warn!(%version, error = %e, "Artifact persistence failed; partial files removed");
        return Err(e);
    }

    info!(%version, %model_hash, "Persisted artifact set");

    Ok(PersistedArtifacts {
        model_path: model_path(dir, &version),
        encoder_path: encoder_path(dir, &version),
        metadata_path: metadata_path(dir, &version),
        report_path: report.map(|_| report_path(dir, &version)),
        version,
        model_hash,
    })
}

fn write_staged(staged: &[(PathBuf, Vec<u8>)], written: &mut Vec<PathBuf>) -> ArtifactResult<()> {
    let mut temps = Vec::with_capacity(staged.len());
    for (target, bytes) in staged {
        let tmp = temp_path(target);
        written.push(tmp.clone());
        fs::write(&tmp, bytes).map_err(|e| ArtifactError::io(&tmp, e))?;
        temps.push((tmp, target));
    }
    for (tmp, target) in temps {
        fs::rename(&tmp, target).map_err(|e| ArtifactError::io(target, e))?;
        written.push(target.clone());
        debug!(path = %target.display(), "Artifact file written");
    }
    Ok(())
}

fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.tmp"))
}

/// Process-wide holder of the served artifact set.
///
/// Readers clone an `Arc` under a short read lock and never observe a
/// partially built set: loading happens outside the lock and only the final
/// pointer swap takes the write lock.
#[derive(Debug)]
pub struct ArtifactStore {
    models_dir: PathBuf,
    current: RwLock<Option<Arc<ArtifactSet>>>,
}

impl ArtifactStore {
    /// Create an unloaded store over `models_dir`.
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            current: RwLock::new(None),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    /// Snapshot of the served set, if any.
    pub fn current(&self) -> Option<Arc<ArtifactSet>> {
        self.current.read().clone()
    }

    /// Discover and load the newest version. On failure the store keeps
    /// whatever it was serving before.
    pub fn load_latest(&self) -> ArtifactResult<Arc<ArtifactSet>> {
        let version = discover_latest(&self.models_dir)?;
        self.load_version(&version)
    }

    /// Load a specific version and make it current.
    pub fn load_version(&self, version: &str) -> ArtifactResult<Arc<ArtifactSet>> {
        let set = load_version(&self.models_dir, version)?;
        Ok(self.install(set))
    }

    /// Explicit reload of the newest version.
    ///
    /// A failure never un-readies a store that is already serving.
    pub fn reload_latest(&self) -> ArtifactResult<Arc<ArtifactSet>> {
        let previous = self.current().map(|s| s.version.clone());
        match self.load_latest() {
            Ok(set) => {
                info!(previous = ?previous, current = %set.version, "Artifact set reloaded");
                Ok(set)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    serving = ?previous,
                    "Reload failed; keeping previous artifact set"
                );
                Err(e)
            }
        }
    }

    /// Swap in an already constructed set.
    pub fn install(&self, set: ArtifactSet) -> Arc<ArtifactSet> {
        let set = Arc::new(set);
        *self.current.write() = Some(Arc::clone(&set));
        set
    }

    pub fn readiness(&self) -> Readiness {
        let current = self.current();
        Readiness {
            ready: current.is_some(),
            model_version: current.map(|s| s.version.clone()),
        }
    }

    pub fn model_info(&self) -> Option<ModelInfo> {
        self.current().map(|s| s.model_info())
    }
}
