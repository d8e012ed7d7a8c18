//! Workload configuration
//!
//! Deployment-wide constants shared by the handlers, the workflow
//! definition and the CLI. Values come from an optional config file named by
//! `AUTOML_CONFIG` and from `AUTOML_*` environment variables.

use crate::error::{Result, WorkflowError};
use crate::models::{EndpointType, StorageUri};
use serde::Deserialize;

/// Environment variable naming an optional config file
pub const CONFIG_FILE_ENV: &str = "AUTOML_CONFIG";

/// Workload configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadConfig {
    /// Prefix of every resource name
    #[serde(default = "default_workload_name")]
    pub workload_name: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_account_id")]
    pub account_id: String,

    /// Data bucket; derived from workload, region and account when unset
    #[serde(default)]
    pub bucket: Option<String>,

    /// Label column of the uploaded dataset
    #[serde(default = "default_target_attribute")]
    pub target_attribute: String,

    /// Dataset file name; the handlers runtime only starts runs for keys
    /// ending with it
    #[serde(default = "default_data_file")]
    pub data_file: String,

    #[serde(default = "default_endpoint_type")]
    pub endpoint_type: EndpointType,

    /// Minimum weighted F1 for promotion
    #[serde(default = "default_performance_threshold")]
    pub performance_threshold: f64,

    /// Fixed seed for the train/test split; fresh randomness when unset
    #[serde(default)]
    pub split_seed: Option<u64>,
}

fn default_workload_name() -> String {
    "AutoML".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_account_id() -> String {
    "000000000000".to_string()
}

fn default_target_attribute() -> String {
    "target".to_string()
}

fn default_data_file() -> String {
    "features.csv".to_string()
}

fn default_endpoint_type() -> EndpointType {
    EndpointType::Serverless
}

fn default_performance_threshold() -> f64 {
    0.75
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            workload_name: default_workload_name(),
            region: default_region(),
            account_id: default_account_id(),
            bucket: None,
            target_attribute: default_target_attribute(),
            data_file: default_data_file(),
            endpoint_type: default_endpoint_type(),
            performance_threshold: default_performance_threshold(),
            split_seed: None,
        }
    }
}

impl WorkloadConfig {
    /// Load configuration from the optional file and the environment
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path).required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("AUTOML").try_parsing(true))
            .build()
            .map_err(|e| WorkflowError::configuration(e.to_string()))?;

        let config: WorkloadConfig = settings
            .try_deserialize()
            .map_err(|e| WorkflowError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.workload_name.trim().is_empty() {
            return Err(WorkflowError::configuration("workload_name must not be empty"));
        }
        if self.target_attribute.trim().is_empty() {
            return Err(WorkflowError::configuration(
                "target_attribute must not be empty",
            ));
        }
        if !(0.0..=1.0).contains(&self.performance_threshold) {
            return Err(WorkflowError::configuration(format!(
                "performance_threshold must be within [0, 1], got {}",
                self.performance_threshold
            )));
        }
        Ok(())
    }

    pub fn bucket_name(&self) -> String {
        self.bucket.clone().unwrap_or_else(|| {
            format!(
                "{}-data-{}-{}",
                self.workload_name.to_lowercase(),
                self.region,
                self.account_id
            )
        })
    }

    pub fn pipeline_name(&self) -> String {
        format!("{}-AutoMLPipeline", self.workload_name)
    }

    pub fn model_package_group(&self) -> String {
        format!("{}PackageGroup", self.workload_name)
    }

    pub fn endpoint_name(&self) -> String {
        endpoint_name(&self.workload_name)
    }

    /// Default location of the uploaded dataset
    pub fn default_data_uri(&self) -> StorageUri {
        StorageUri::new(self.bucket_name(), self.data_file.clone())
    }
}

/// Stable endpoint name of a workload
pub fn endpoint_name(workload_name: &str) -> String {
    format!("{}-Endpoint", workload_name)
}
