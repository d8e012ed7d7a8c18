//! Per-run pipeline parameters

use crate::config::WorkloadConfig;
use crate::error::{Result, WorkflowError};
use crate::models::{PipelineParameter, StorageUri};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const EXECUTION_VERSION: &str = "ExecutionVersion";
pub const INSTANCE_COUNT: &str = "InstanceCount";
pub const INSTANCE_TYPE: &str = "InstanceType";
pub const MAX_AUTOML_RUNTIME: &str = "MaxAutoMLRuntime";
pub const MODEL_APPROVAL_STATUS: &str = "ModelApprovalStatus";
pub const METRIC_THRESHOLD: &str = "ModelRegistrationMetricThreshold";
pub const DATA_URI: &str = "DataUri";
pub const DATA_FILE: &str = "DataFile";

/// Parameter names in declaration order
pub const PARAMETER_NAMES: [&str; 8] = [
    EXECUTION_VERSION,
    INSTANCE_COUNT,
    INSTANCE_TYPE,
    MAX_AUTOML_RUNTIME,
    MODEL_APPROVAL_STATUS,
    METRIC_THRESHOLD,
    DATA_URI,
    DATA_FILE,
];

/// Parameters of one run, fixed at start and passed by value to every stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineParameters {
    /// Namespaces every output of the run
    pub execution_version: String,
    pub instance_count: u32,
    pub instance_type: String,
    /// Wall-clock budget of the AutoML job in seconds
    pub max_automl_runtime: u64,
    pub model_approval_status: String,
    /// Minimum weighted F1 for promotion
    pub metric_threshold: f64,
    pub data_uri: StorageUri,
    pub data_file: String,
}

impl PipelineParameters {
    /// Defaults a run gets when its start call sets nothing
    pub fn defaults(config: &WorkloadConfig) -> Self {
        Self {
            execution_version: "Test".to_string(),
            instance_count: 1,
            instance_type: "ml.m5.xlarge".to_string(),
            max_automl_runtime: 7200,
            model_approval_status: "Approved".to_string(),
            metric_threshold: config.performance_threshold,
            data_uri: config.default_data_uri(),
            data_file: config.data_file.clone(),
        }
    }

    /// Apply the `[Name, Value]` list of a start call
    pub fn with_overrides(mut self, overrides: &[PipelineParameter]) -> Result<Self> {
        for param in overrides {
            self.set(&param.name, &param.value)?;
        }
        self.validate()?;
        Ok(self)
    }

    fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            EXECUTION_VERSION => self.execution_version = value.to_string(),
            INSTANCE_COUNT => self.instance_count = parse_number(name, value)?,
            INSTANCE_TYPE => self.instance_type = value.to_string(),
            MAX_AUTOML_RUNTIME => self.max_automl_runtime = parse_number(name, value)?,
            MODEL_APPROVAL_STATUS => self.model_approval_status = value.to_string(),
            METRIC_THRESHOLD => self.metric_threshold = parse_number(name, value)?,
            DATA_URI => self.data_uri = value.parse()?,
            DATA_FILE => self.data_file = value.to_string(),
            _ => {
                return Err(WorkflowError::configuration(format!(
                    "Unknown pipeline parameter '{}'",
                    name
                )))
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.execution_version.is_empty() || self.execution_version.contains('/') {
            return Err(WorkflowError::configuration(format!(
                "{} must be a single path segment, got '{}'",
                EXECUTION_VERSION, self.execution_version
            )));
        }
        if self.instance_count == 0 {
            return Err(WorkflowError::configuration(format!(
                "{} must be at least 1",
                INSTANCE_COUNT
            )));
        }
        if !(0.0..=1.0).contains(&self.metric_threshold) {
            return Err(WorkflowError::configuration(format!(
                "{} must be within [0, 1], got {}",
                METRIC_THRESHOLD, self.metric_threshold
            )));
        }
        if self.data_file.is_empty() {
            return Err(WorkflowError::configuration(format!(
                "{} must not be empty",
                DATA_FILE
            )));
        }
        Ok(())
    }

    /// Render back into the start-call form, in declaration order
    pub fn to_parameters(&self) -> Vec<PipelineParameter> {
        PARAMETER_NAMES
            .iter()
            .map(|&name| PipelineParameter::new(name, self.value_of(name)))
            .collect()
    }

    fn value_of(&self, name: &str) -> String {
        match name {
            EXECUTION_VERSION => self.execution_version.clone(),
            INSTANCE_COUNT => self.instance_count.to_string(),
            INSTANCE_TYPE => self.instance_type.clone(),
            MAX_AUTOML_RUNTIME => self.max_automl_runtime.to_string(),
            MODEL_APPROVAL_STATUS => self.model_approval_status.clone(),
            METRIC_THRESHOLD => self.metric_threshold.to_string(),
            DATA_URI => self.data_uri.to_string(),
            DATA_FILE => self.data_file.clone(),
            _ => String::new(),
        }
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        WorkflowError::configuration(format!(
            "Pipeline parameter '{}' has invalid value '{}'",
            name, value
        ))
    })
}
