//! Evaluation stage: model quality from batch predictions
//!
//! This module provides:
//! - Weighted multi-class F1 over row-aligned predictions and labels
//! - The quality report file read back by the workflow's quality gate
//! - The processing-job entry point with its fixed input and output paths

mod f1;
mod job;
mod report;

pub use f1::{normalize_label, read_labels, weighted_f1, ClassScore};
pub use job::{
    EvaluationJob, DEFAULT_EVALUATION_DIR, DEFAULT_LABELS_PATH, DEFAULT_PREDICTIONS_PATH,
};
pub use report::{json_get, QualityReport, EVALUATION_REPORT_FILE, WEIGHTED_F1_PATH};
