//! AutoML backend seam
//!
//! Candidate search and batch inference belong to the managed service. The
//! local executor reaches them through [`AutoMlBackend`]; the
//! [`MajorityClassBackend`] stand-in lets the rest of the chain run without
//! it.

use crate::control_plane::async_trait;
use crate::error::{Result, WorkflowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// One AutoML fitting job
#[derive(Debug, Clone)]
pub struct TrainingJob {
    /// Headered CSV with the target column last
    pub training_file: PathBuf,
    pub target_attribute: String,
    /// Directory the candidate's artifacts are written into
    pub output_dir: PathBuf,
    pub mode: String,
    pub max_runtime_secs: u64,
}

/// Best candidate of a job; file names are relative to the job's output dir
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedCandidate {
    pub candidate_name: String,
    pub model_file: String,
    pub model_insights_file: String,
    pub explainability_file: String,
}

#[async_trait]
pub trait AutoMlBackend: Send + Sync {
    async fn fit(&self, job: &TrainingJob) -> Result<TrainedCandidate>;

    /// Write one headerless prediction row per feature row; returns the row count
    async fn transform(&self, model_file: &Path, features_file: &Path, output_file: &Path)
        -> Result<usize>;

    /// Predict one label per headerless CSV row of `payload`, newline separated
    async fn predict(&self, model_file: &Path, payload: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MajorityModel {
    target_attribute: String,
    label: String,
    class_counts: BTreeMap<String, usize>,
}

const MODEL_FILE: &str = "model.json";
const INSIGHTS_FILE: &str = "model_insights.json";
const EXPLAINABILITY_FILE: &str = "explainability.json";

/// Predicts the most frequent training label for every row
///
/// Ties go to the label that sorts first.
#[derive(Debug, Clone, Copy, Default)]
pub struct MajorityClassBackend;

impl MajorityClassBackend {
    pub const CANDIDATE_NAME: &'static str = "majority-class";
}

#[async_trait]
impl AutoMlBackend for MajorityClassBackend {
    async fn fit(&self, job: &TrainingJob) -> Result<TrainedCandidate> {
        let mut reader = csv::Reader::from_path(&job.training_file)?;
        let headers = reader.headers()?.clone();
        if headers.iter().last() != Some(job.target_attribute.as_str()) {
            return Err(WorkflowError::data_shape(format!(
                "Expected '{}' as the last training column",
                job.target_attribute
            )));
        }

        let mut class_counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in reader.records() {
            let record = record?;
            if let Some(label) = record.iter().last() {
                *class_counts.entry(label.trim().to_string()).or_default() += 1;
            }
        }
        // max_by_key keeps the last maximum, so walk in reverse for the first
        let label = class_counts
            .iter()
            .rev()
            .max_by_key(|(_, count)| **count)
            .map(|(label, _)| label.clone())
            .ok_or_else(|| WorkflowError::data_shape("Training file has no rows"))?;

        let model = MajorityModel {
            target_attribute: job.target_attribute.clone(),
            label,
            class_counts,
        };

        fs::create_dir_all(&job.output_dir)?;
        fs::write(
            job.output_dir.join(MODEL_FILE),
            serde_json::to_string_pretty(&model)?,
        )?;
        fs::write(
            job.output_dir.join(INSIGHTS_FILE),
            serde_json::to_string_pretty(&serde_json::json!({
                "candidate_name": Self::CANDIDATE_NAME,
                "class_counts": model.class_counts,
            }))?,
        )?;
        fs::write(
            job.output_dir.join(EXPLAINABILITY_FILE),
            serde_json::to_string_pretty(&serde_json::json!({
                "explanations": {"feature_importance": {}}
            }))?,
        )?;
        info!(
            candidate = Self::CANDIDATE_NAME,
            label = %model.label,
            mode = %job.mode,
            "Fitted majority-class candidate"
        );

        Ok(TrainedCandidate {
            candidate_name: Self::CANDIDATE_NAME.to_string(),
            model_file: MODEL_FILE.to_string(),
            model_insights_file: INSIGHTS_FILE.to_string(),
            explainability_file: EXPLAINABILITY_FILE.to_string(),
        })
    }

    async fn transform(
        &self,
        model_file: &Path,
        features_file: &Path,
        output_file: &Path,
    ) -> Result<usize> {
        let model: MajorityModel = serde_json::from_str(&fs::read_to_string(model_file)?)?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(features_file)?;
        if let Some(parent) = output_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(output_file)?;

        let mut rows = 0;
        for record in reader.records() {
            record?;
            writer.write_record([model.label.as_str()])?;
            rows += 1;
        }
        writer.flush()?;
        Ok(rows)
    }

    async fn predict(&self, model_file: &Path, payload: &str) -> Result<String> {
        let model: MajorityModel = serde_json::from_str(&fs::read_to_string(model_file)?)?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(payload.as_bytes());
        let mut rows = 0;
        for record in reader.records() {
            record?;
            rows += 1;
        }
        if rows == 0 {
            return Err(WorkflowError::data_shape("Inference payload has no rows"));
        }
        Ok(vec![model.label.as_str(); rows].join("\n"))
    }
}
