//! Quality report written by the evaluation stage

use crate::error::{Result, WorkflowError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the report inside the evaluation output directory
pub const EVALUATION_REPORT_FILE: &str = "evaluation_metrics.json";

/// Property path the quality gate reads
pub const WEIGHTED_F1_PATH: &str = "classification_metrics.weighted_f1.value";

/// Placeholder for the deviation, which is not computed
const NOT_COMPUTED: &str = "NaN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: f64,
    pub standard_deviation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub weighted_f1: MetricValue,
}

/// Evaluation result consumed once by the quality gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub classification_metrics: ClassificationMetrics,
}

impl QualityReport {
    pub fn weighted_f1(score: f64) -> Self {
        Self {
            classification_metrics: ClassificationMetrics {
                weighted_f1: MetricValue {
                    value: score,
                    standard_deviation: NOT_COMPUTED.to_string(),
                },
            },
        }
    }

    pub fn score(&self) -> f64 {
        self.classification_metrics.weighted_f1.value
    }

    /// Write `evaluation_metrics.json` into `dir`, creating it if needed
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(EVALUATION_REPORT_FILE);
        fs::write(&path, serde_json::to_string(self)?)?;
        Ok(path)
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Numeric value at a dotted property path of the serialized report
    pub fn property(&self, path: &str) -> Result<f64> {
        let value = serde_json::to_value(self)?;
        json_get(&value, path)?.as_f64().ok_or_else(|| {
            WorkflowError::configuration(format!("Property '{}' is not numeric", path))
        })
    }
}

/// Resolve a dotted path such as `a.b.c` against a JSON document
pub fn json_get<'a>(value: &'a Value, path: &str) -> Result<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.get(segment))
        .ok_or_else(|| {
            WorkflowError::configuration(format!("Property '{}' not found in report", path))
        })
}
