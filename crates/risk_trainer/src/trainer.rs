//! Candidate training pipeline
//!
//! Encodes the target, splits the rows, fits one preprocessing step on the
//! training partition and then every candidate classifier on top of it.
//! Each candidate becomes a [`ModelBundle`] and is scored on all three
//! partitions. Selection and artifact construction work on the resulting
//! [`TrainingRun`].

use chrono::{DateTime, Utc};
use pet_risk_core::artifacts::version_token;
use pet_risk_core::models::{Classifier, LabelCodec};
use pet_risk_core::{
    ArtifactMetadata, ArtifactSet, ClassifierModel, FeatureImportance, FeatureVector, ModelBundle,
    PerformanceMetrics, PersistedArtifacts, Preprocessor, RiskModel, TargetEncoder,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::boosting::{BoostingConfig, BoostingTrainer};
use crate::dataset::Dataset;
use crate::errors::TrainerError;
use crate::forest::{ForestConfig, ForestTrainer};
use crate::importance::rank_importance;
use crate::logistic::{fit_logistic, LogisticParams};
use crate::metrics::{accuracy, predicted_classes, roc_auc_ovr, ClassificationReport};
use crate::selection::{select_best, selection_score};
use crate::split::{stratified_split, Split};

/// Number of ranked features copied into the evaluation report.
const REPORT_TOP_FEATURES: usize = 10;

/// Training configuration
#[derive(Clone, Debug)]
pub struct TrainingParams {
    pub seed: u64,
    pub val_fraction: f64,
    pub test_fraction: f64,
    pub logistic: LogisticParams,
    pub forest: ForestConfig,
    pub boosting: BoostingConfig,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            seed: 42,
            val_fraction: 0.2,
            test_fraction: 0.2,
            logistic: LogisticParams::default(),
            forest: ForestConfig::default(),
            boosting: BoostingConfig::default(),
        }
    }
}

/// Candidate model families, in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Candidate {
    LogisticRegression,
    RandomForest,
    GradientBoosting,
}

impl Candidate {
    pub const ALL: [Candidate; 3] = [
        Candidate::LogisticRegression,
        Candidate::RandomForest,
        Candidate::GradientBoosting,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Candidate::LogisticRegression => "logistic_regression",
            Candidate::RandomForest => "random_forest",
            Candidate::GradientBoosting => "gradient_boosting",
        }
    }
}

/// One fitted and evaluated candidate
#[derive(Clone, Debug)]
pub struct TrainingResult {
    pub name: String,
    pub bundle: ModelBundle,
    pub train_score: f64,
    pub val_score: f64,
    pub test_score: f64,
    pub auc_score: Option<f64>,
    /// Classification report on the test partition
    pub report: ClassificationReport,
    pub test_predictions: Vec<usize>,
    pub test_probabilities: Vec<Vec<f64>>,
}

impl TrainingResult {
    pub fn performance(&self) -> PerformanceMetrics {
        PerformanceMetrics {
            train_score: self.train_score,
            val_score: self.val_score,
            test_score: self.test_score,
            auc_score: self.auc_score,
        }
    }
}

/// Every candidate of one training run plus the shared fitted state
#[derive(Clone, Debug)]
pub struct TrainingRun {
    /// Results in [`Candidate::ALL`] order
    pub results: Vec<TrainingResult>,
    pub encoder: TargetEncoder,
    pub feature_names: Vec<String>,
    pub split: Split,
    /// BLAKE3 digest of the source dataset
    pub source_hash: String,
}

impl TrainingRun {
    pub fn get(&self, name: &str) -> Option<&TrainingResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Candidate with the highest safety-weighted score
    pub fn select_best(&self) -> Result<&TrainingResult, TrainerError> {
        select_best(&self.results)
            .ok_or_else(|| TrainerError::Training("no candidate models were trained".to_string()))
    }

    /// Assemble the artifact set for candidate `name`, versioned by `created_at`.
    pub fn build_artifact(
        &self,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<TrainedArtifact, TrainerError> {
        let result = self
            .get(name)
            .ok_or_else(|| TrainerError::Training(format!("unknown candidate '{name}'")))?;
        let version = version_token(created_at);
        let feature_importance = rank_importance(&result.bundle);

        let metadata = ArtifactMetadata {
            model_type: result.bundle.model_type().to_string(),
            timestamp: version.clone(),
            feature_names: self.feature_names.clone(),
            target_classes: self.encoder.classes().to_vec(),
            performance_metrics: result.performance(),
            feature_importance: feature_importance.clone(),
            model_hash: None,
        };
        let report = self.evaluation_report(result, &version, &feature_importance);

        Ok(TrainedArtifact {
            version,
            bundle: result.bundle.clone(),
            encoder: self.encoder.clone(),
            metadata,
            report,
        })
    }

    fn evaluation_report(
        &self,
        best: &TrainingResult,
        version: &str,
        importance: &[FeatureImportance],
    ) -> Value {
        let comparison: serde_json::Map<String, Value> = self
            .results
            .iter()
            .map(|r| {
                (
                    r.name.clone(),
                    json!({
                        "train_score": r.train_score,
                        "val_score": r.val_score,
                        "test_score": r.test_score,
                        "auc_score": r.auc_score,
                        "selection_score": selection_score(r),
                    }),
                )
            })
            .collect();
        let top = &importance[..importance.len().min(REPORT_TOP_FEATURES)];

        json!({
            "version": version,
            "selected_model": best.name,
            "model_comparison": comparison,
            "best_model_report": best.report,
            "feature_importance_top10": top,
            "training_data_hash": self.source_hash,
            "split_sizes": {
                "train": self.split.train.len(),
                "val": self.split.val.len(),
                "test": self.split.test.len(),
            },
        })
    }
}

/// A selected model with everything needed to serve or persist it
#[derive(Clone, Debug)]
pub struct TrainedArtifact {
    pub version: String,
    pub bundle: ModelBundle,
    pub encoder: TargetEncoder,
    pub metadata: ArtifactMetadata,
    pub report: Value,
}

impl TrainedArtifact {
    /// In-memory artifact set, equivalent to loading the persisted version.
    pub fn to_artifact_set(&self) -> ArtifactSet {
        let model: Arc<dyn RiskModel> = Arc::new(self.bundle.clone());
        ArtifactSet::new(
            self.version.clone(),
            model,
            Arc::new(self.encoder.clone()),
            self.metadata.clone(),
        )
    }

    /// Write the versioned files to `dir`.
    pub fn persist(&self, dir: &Path) -> Result<PersistedArtifacts, TrainerError> {
        Ok(pet_risk_core::persist(
            dir,
            &self.bundle,
            &self.encoder,
            self.metadata.clone(),
            Some(&self.report),
        )?)
    }
}

/// Encoded rows and class indices of one partition
struct Partition {
    x: Vec<Vec<f64>>,
    y: Vec<usize>,
}

impl Partition {
    fn select(encoded: &[Vec<f64>], labels: &[usize], indices: &[usize]) -> Self {
        Self {
            x: indices.iter().map(|&i| encoded[i].clone()).collect(),
            y: indices.iter().map(|&i| labels[i]).collect(),
        }
    }
}

/// Fits and evaluates every candidate
pub struct TrainingPipeline {
    params: TrainingParams,
}

impl TrainingPipeline {
    pub fn new(params: TrainingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    pub fn train(&self, dataset: &Dataset) -> Result<TrainingRun, TrainerError> {
        if dataset.is_empty() {
            return Err(TrainerError::Dataset("dataset is empty".to_string()));
        }

        let encoder = TargetEncoder::fit(dataset.labels.iter().map(|c| c.as_str()));
        let n_classes = encoder.n_classes();
        if n_classes < 2 {
            return Err(TrainerError::Training(format!(
                "need at least two risk categories, found {n_classes}"
            )));
        }
        let labels = dataset
            .labels
            .iter()
            .map(|c| {
                encoder.encode(c.as_str()).ok_or_else(|| {
                    TrainerError::Training(format!("category {c} missing from encoder"))
                })
            })
            .collect::<Result<Vec<usize>, _>>()?;

        let split = stratified_split(
            &labels,
            self.params.val_fraction,
            self.params.test_fraction,
            self.params.seed,
        )?;
        info!(
            train = split.train.len(),
            val = split.val.len(),
            test = split.test.len(),
            "Stratified split"
        );

        let train_rows: Vec<FeatureVector> =
            split.train.iter().map(|&i| dataset.rows[i].clone()).collect();
        let preprocessor = Preprocessor::fit(&train_rows).map_err(TrainerError::Training)?;
        let encoded = dataset
            .rows
            .iter()
            .map(|row| preprocessor.transform(row))
            .collect::<Result<Vec<_>, _>>()
            .map_err(TrainerError::Training)?;
        info!(
            inputs = dataset.feature_names.len(),
            encoded = preprocessor.output_width(),
            "Preprocessing fitted"
        );

        let train = Partition::select(&encoded, &labels, &split.train);
        let val = Partition::select(&encoded, &labels, &split.val);
        let test = Partition::select(&encoded, &labels, &split.test);

        let mut results = Vec::with_capacity(Candidate::ALL.len());
        for candidate in Candidate::ALL {
            info!(candidate = candidate.name(), "Training candidate");
            let classifier = self.fit_candidate(candidate, &train, n_classes)?;
            let bundle = ModelBundle::new(preprocessor.clone(), classifier);
            bundle
                .validate()
                .map_err(|e| TrainerError::Training(format!("{}: {e}", candidate.name())))?;

            let result = evaluate(candidate.name(), bundle, &train, &val, &test, encoder.classes())?;
            info!(
                candidate = %result.name,
                train_score = result.train_score,
                val_score = result.val_score,
                test_score = result.test_score,
                auc_score = ?result.auc_score,
                "Candidate evaluated"
            );
            results.push(result);
        }

        Ok(TrainingRun {
            results,
            encoder,
            feature_names: dataset.feature_names.clone(),
            split,
            source_hash: dataset.source_hash.clone(),
        })
    }

    fn fit_candidate(
        &self,
        candidate: Candidate,
        train: &Partition,
        n_classes: usize,
    ) -> Result<ClassifierModel, TrainerError> {
        let seed = self.params.seed;
        Ok(match candidate {
            Candidate::LogisticRegression => ClassifierModel::LogisticRegression(fit_logistic(
                &train.x,
                &train.y,
                n_classes,
                &self.params.logistic,
            )?),
            Candidate::RandomForest => ClassifierModel::RandomForest(
                ForestTrainer::new(self.params.forest.clone()).train(&train.x, &train.y, n_classes, seed)?,
            ),
            Candidate::GradientBoosting => ClassifierModel::GradientBoosting(
                BoostingTrainer::new(self.params.boosting.clone()).train(
                    &train.x,
                    &train.y,
                    n_classes,
                    seed,
                )?,
            ),
        })
    }
}

fn evaluate(
    name: &str,
    bundle: ModelBundle,
    train: &Partition,
    val: &Partition,
    test: &Partition,
    class_names: &[String],
) -> Result<TrainingResult, TrainerError> {
    let probabilities = |part: &Partition| {
        part.x
            .iter()
            .map(|row| bundle.classifier.predict_proba(row))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TrainerError::Training(format!("{name}: {e}")))
    };

    let train_pred = predicted_classes(&probabilities(train)?);
    let val_pred = predicted_classes(&probabilities(val)?);
    let test_probabilities = probabilities(test)?;
    let test_predictions = predicted_classes(&test_probabilities);

    Ok(TrainingResult {
        name: name.to_string(),
        train_score: accuracy(&train.y, &train_pred),
        val_score: accuracy(&val.y, &val_pred),
        test_score: accuracy(&test.y, &test_predictions),
        auc_score: roc_auc_ovr(&test.y, &test_probabilities, class_names.len()),
        report: ClassificationReport::new(&test.y, &test_predictions, class_names),
        test_predictions,
        test_probabilities,
        bundle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pet_risk_core::{ObservationRecord, RiskCategory};

    fn synthetic_dataset(n: usize) -> Dataset {
        let feature_names: Vec<String> = ["species", "temperature_c", "symptom_count", "hydration_normal"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut rows = Vec::new();
        let mut risk_scores = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n {
            let level = i % 4;
            let score = 0.1 + 0.25 * level as f64;
            let record = ObservationRecord::new()
                .with("species", if i % 2 == 0 { "dog" } else { "cat" })
                .with("temperature_c", 38.0 + level as f64 + (i % 3) as f64 * 0.1)
                .with("symptom_count", (level * 2) as f64)
                .with("hydration_normal", level < 2);
            rows.push(pet_risk_core::normalize(&record, &feature_names).unwrap());
            risk_scores.push(score);
            labels.push(RiskCategory::from_score(score).unwrap());
        }
        Dataset {
            feature_names,
            rows,
            risk_scores,
            labels,
            dropped_columns: Vec::new(),
            source_hash: "00".repeat(32),
        }
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

    #[test]
    fn test_all_candidates_trained() {
        let dataset = synthetic_dataset(80);
        let run = TrainingPipeline::new(quick_params()).train(&dataset).unwrap();

        let names: Vec<&str> = run.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["logistic_regression", "random_forest", "gradient_boosting"]);
        assert_eq!(run.encoder.classes(), ["Critical", "High", "Low", "Medium"]);
        for result in &run.results {
            assert!(result.val_score >= 0.8, "{} val {}", result.name, result.val_score);
            assert_eq!(result.test_probabilities.len(), run.split.test.len());
            assert_eq!(result.report.classes.len(), 4);
        }
    }

    #[test]
    fn test_single_class_rejected() {
        let mut dataset = synthetic_dataset(8);
        dataset.labels = vec![RiskCategory::Low; 8];
        let err = TrainingPipeline::new(quick_params()).train(&dataset).unwrap_err();
        assert!(err.to_string().contains("two risk categories"));
    }

    #[test]
    fn test_build_artifact_metadata() {
        let dataset = synthetic_dataset(40);
        let run = TrainingPipeline::new(quick_params()).train(&dataset).unwrap();
        let best = run.select_best().unwrap().name.clone();
        let created = DateTime::parse_from_rfc3339("2024-03-05T10:20:30Z")
            .unwrap()
            .with_timezone(&Utc);

        let artifact = run.build_artifact(&best, created).unwrap();
        assert_eq!(artifact.version, "20240305_102030");
        assert_eq!(artifact.metadata.model_type, best);
        assert_eq!(artifact.metadata.feature_names, dataset.feature_names);
        assert_eq!(artifact.metadata.target_classes, ["Critical", "High", "Low", "Medium"]);
        assert!(!artifact.metadata.feature_importance.is_empty());
        assert_eq!(artifact.report["selected_model"], best.as_str());
        assert_eq!(artifact.report["model_comparison"].as_object().unwrap().len(), 3);
        assert!(artifact.report["feature_importance_top10"].as_array().unwrap().len() <= 10);

        let set = artifact.to_artifact_set();
        assert_eq!(set.version, "20240305_102030");
        assert!(run.build_artifact("svm", created).is_err());
    }

    #[test]
    fn test_training_is_deterministic() {
        let dataset = synthetic_dataset(40);
        let a = TrainingPipeline::new(quick_params()).train(&dataset).unwrap();
        let b = TrainingPipeline::new(quick_params()).train(&dataset).unwrap();
        for (ra, rb) in a.results.iter().zip(&b.results) {
            assert_eq!(ra.bundle, rb.bundle);
            assert_eq!(ra.test_probabilities, rb.test_probabilities);
        }
    }
}
