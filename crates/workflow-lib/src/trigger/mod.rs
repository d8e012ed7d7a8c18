//! Pipeline trigger handler
//!
//! Turns an object-created notification for the dataset into exactly one
//! pipeline start. The notification configuration upstream only forwards
//! keys ending in the dataset file name; a handler built with
//! [`TriggerHandler::with_key_suffix`] enforces the same filter itself.

mod event;

pub use event::{BucketRef, NotificationRecord, ObjectRef, S3Entity, StorageNotification};

use crate::control_plane::ControlPlane;
use crate::error::{Result, WorkflowError};
use crate::models::{InvocationResponse, PipelineExecution, PipelineParameter, StorageUri};
use crate::observability::{StructuredLogger, WorkflowMetrics};
use std::sync::Arc;
use std::time::Instant;

/// Parameter names the trigger sets on the pipeline
pub const EXECUTION_VERSION_PARAM: &str = "ExecutionVersion";
pub const DATA_URI_PARAM: &str = "DataUri";
pub const DATA_FILE_PARAM: &str = "DataFile";

const HANDLER_NAME: &str = "pipeline-trigger";

/// Ordered start parameters derived from one uploaded object
pub fn execution_parameters(notification: &StorageNotification) -> Result<Vec<PipelineParameter>> {
    let record = notification
        .records
        .first()
        .ok_or_else(|| WorkflowError::configuration("Notification carries no records"))?;
    let object = &record.s3.object;

    let version_id = object
        .version_id
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            WorkflowError::configuration(format!(
                "Object '{}' has no versionId; versioning must be enabled on the bucket",
                object.key
            ))
        })?;
    if object.key.is_empty() {
        return Err(WorkflowError::configuration("Object key is empty"));
    }

    let data_uri = StorageUri::new(&record.s3.bucket.name, &object.key);
    Ok(vec![
        PipelineParameter::new(EXECUTION_VERSION_PARAM, version_id),
        PipelineParameter::new(DATA_URI_PARAM, data_uri.to_string()),
        PipelineParameter::new(DATA_FILE_PARAM, data_uri.file_name()),
    ])
}

/// Starts the workload's pipeline for each dataset upload
#[derive(Clone)]
pub struct TriggerHandler {
    control_plane: Arc<dyn ControlPlane>,
    pipeline_name: String,
    key_suffix: Option<String>,
    logger: StructuredLogger,
    metrics: WorkflowMetrics,
}

impl TriggerHandler {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        workload_name: &str,
        pipeline_name: impl Into<String>,
    ) -> Self {
        Self {
            control_plane,
            pipeline_name: pipeline_name.into(),
            key_suffix: None,
            logger: StructuredLogger::new(workload_name),
            metrics: WorkflowMetrics::new(),
        }
    }

    /// Reject uploads whose key does not end with `suffix`
    pub fn with_key_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.key_suffix = Some(suffix.into());
        self
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    fn check_key_suffix(&self, notification: &StorageNotification) -> Result<()> {
        let (Some(suffix), Some(record)) = (&self.key_suffix, notification.records.first()) else {
            return Ok(());
        };
        let key = &record.s3.object.key;
        if key.ends_with(suffix.as_str()) {
            Ok(())
        } else {
            Err(WorkflowError::configuration(format!(
                "Object key '{}' does not end with '{}'",
                key, suffix
            )))
        }
    }

    /// Handle one notification; the body is the execution ARN
    pub async fn handle(&self, notification: &StorageNotification) -> Result<InvocationResponse> {
        let execution = self.start(notification).await?;
        Ok(InvocationResponse::ok(execution.arn))
    }

    pub async fn start(&self, notification: &StorageNotification) -> Result<PipelineExecution> {
        let start = Instant::now();
        let result = self.start_execution(notification).await;
        self.metrics
            .observe_handler_duration(HANDLER_NAME, start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            self.metrics.inc_handler_errors(HANDLER_NAME, e.kind());
        }
        result
    }

    async fn start_execution(&self, notification: &StorageNotification) -> Result<PipelineExecution> {
        self.check_key_suffix(notification)?;
        let parameters = execution_parameters(notification)?;
        let data_uri = parameters
            .iter()
            .find(|p| p.name == DATA_URI_PARAM)
            .map(|p| p.value.clone())
            .unwrap_or_default();

        let execution = self
            .control_plane
            .start_pipeline_execution(&self.pipeline_name, parameters)
            .await?;
        self.metrics.inc_executions_started();
        self.logger
            .log_execution_started(&self.pipeline_name, &execution.arn, &data_uri);
        Ok(execution)
    }
}
