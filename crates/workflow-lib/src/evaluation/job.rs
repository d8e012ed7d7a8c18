//! Processing-job entry point for the quality evaluator

use super::{read_labels, weighted_f1, QualityReport};
use crate::error::Result;
use std::path::PathBuf;
use tracing::{debug, info};

/// Batch-transform output mounted into the evaluation container
pub const DEFAULT_PREDICTIONS_PATH: &str = "/opt/ml/processing/input/predictions/x_test.csv.out";

/// Held-out labels mounted into the evaluation container
pub const DEFAULT_LABELS_PATH: &str = "/opt/ml/processing/input/true_labels/y_test.csv";

/// Directory the report is written to
pub const DEFAULT_EVALUATION_DIR: &str = "/opt/ml/processing/evaluation";

/// Evaluation job: predictions and labels in, quality report out
#[derive(Debug, Clone)]
pub struct EvaluationJob {
    pub predictions_path: PathBuf,
    pub labels_path: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for EvaluationJob {
    fn default() -> Self {
        Self {
            predictions_path: PathBuf::from(DEFAULT_PREDICTIONS_PATH),
            labels_path: PathBuf::from(DEFAULT_LABELS_PATH),
            output_dir: PathBuf::from(DEFAULT_EVALUATION_DIR),
        }
    }
}

impl EvaluationJob {
    pub fn new(
        predictions_path: impl Into<PathBuf>,
        labels_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            predictions_path: predictions_path.into(),
            labels_path: labels_path.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Score the predictions and persist the report
    pub fn run(&self) -> Result<QualityReport> {
        debug!("Starting evaluation");
        info!(path = %self.predictions_path.display(), "Reading test predictions");
        let y_pred = read_labels(&self.predictions_path)?;
        info!(path = %self.labels_path.display(), "Reading test labels");
        let y_true = read_labels(&self.labels_path)?;

        let score = weighted_f1(&y_true, &y_pred)?;
        info!(f1_score = score, "Computed weighted F1 score");

        let report = QualityReport::weighted_f1(score);
        let path = report.write_to_dir(&self.output_dir)?;
        info!(path = %path.display(), "Saved evaluation report");
        Ok(report)
    }
}
