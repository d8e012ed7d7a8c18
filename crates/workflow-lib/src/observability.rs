//! Observability for the workflow stages and event handlers
//!
//! Provides:
//! - Prometheus metrics (stage and handler latency, execution and promotion counts)
//! - Structured logging of workflow events with tracing

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<WorkflowMetricsInner> = OnceLock::new();

struct WorkflowMetricsInner {
    stage_duration_seconds: HistogramVec,
    handler_duration_seconds: HistogramVec,
    stage_failures: IntCounterVec,
    handler_errors: IntCounterVec,
    executions_started: IntCounter,
    quality_gate_evaluations: IntCounterVec,
    endpoint_configs_created: IntCounter,
    endpoint_upserts: IntCounterVec,
}

impl WorkflowMetricsInner {
    fn new() -> Self {
        Self {
            stage_duration_seconds: register_histogram_vec!(
                "automl_workflow_stage_duration_seconds",
                "Time spent running a workflow stage",
                &["stage"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register stage_duration_seconds"),

            handler_duration_seconds: register_histogram_vec!(
                "automl_handler_duration_seconds",
                "Time spent handling an event",
                &["handler"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register handler_duration_seconds"),

            stage_failures: register_int_counter_vec!(
                "automl_workflow_stage_failures_total",
                "Workflow stages that ended in an error",
                &["stage"]
            )
            .expect("Failed to register stage_failures"),

            handler_errors: register_int_counter_vec!(
                "automl_handler_errors_total",
                "Handler invocations that returned an error",
                &["handler", "kind"]
            )
            .expect("Failed to register handler_errors"),

            executions_started: register_int_counter!(
                "automl_pipeline_executions_started_total",
                "Pipeline executions started by the trigger handler"
            )
            .expect("Failed to register executions_started"),

            quality_gate_evaluations: register_int_counter_vec!(
                "automl_quality_gate_evaluations_total",
                "Quality gate decisions by outcome",
                &["outcome"]
            )
            .expect("Failed to register quality_gate_evaluations"),

            endpoint_configs_created: register_int_counter!(
                "automl_endpoint_configs_created_total",
                "Endpoint configurations created by promotions"
            )
            .expect("Failed to register endpoint_configs_created"),

            endpoint_upserts: register_int_counter_vec!(
                "automl_endpoint_upserts_total",
                "Endpoint promotions by action taken",
                &["action"]
            )
            .expect("Failed to register endpoint_upserts"),
        }
    }
}

/// Workflow metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct WorkflowMetrics {
    _private: (),
}

impl Default for WorkflowMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(WorkflowMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &WorkflowMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_stage_duration(&self, stage: &str, duration_secs: f64) {
        self.inner()
            .stage_duration_seconds
            .with_label_values(&[stage])
            .observe(duration_secs);
    }

    pub fn observe_handler_duration(&self, handler: &str, duration_secs: f64) {
        self.inner()
            .handler_duration_seconds
            .with_label_values(&[handler])
            .observe(duration_secs);
    }

    pub fn inc_stage_failures(&self, stage: &str) {
        self.inner().stage_failures.with_label_values(&[stage]).inc();
    }

    pub fn inc_handler_errors(&self, handler: &str, kind: &str) {
        self.inner()
            .handler_errors
            .with_label_values(&[handler, kind])
            .inc();
    }

    pub fn inc_executions_started(&self) {
        self.inner().executions_started.inc();
    }

    /// Count a quality gate decision
    pub fn record_quality_gate(&self, passed: bool) {
        let outcome = if passed { "passed" } else { "failed" };
        self.inner()
            .quality_gate_evaluations
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn inc_endpoint_configs_created(&self) {
        self.inner().endpoint_configs_created.inc();
    }

    /// Count an endpoint promotion; `action` is `created` or `updated`
    pub fn inc_endpoint_upserts(&self, action: &str) {
        self.inner()
            .endpoint_upserts
            .with_label_values(&[action])
            .inc();
    }
}

/// Structured logger for workflow events
///
/// Every event carries the workload name so runs of several workloads can
/// share one log stream.
#[derive(Clone)]
pub struct StructuredLogger {
    workload_name: String,
}

impl StructuredLogger {
    pub fn new(workload_name: impl Into<String>) -> Self {
        Self {
            workload_name: workload_name.into(),
        }
    }

    pub fn workload_name(&self) -> &str {
        &self.workload_name
    }

    pub fn log_execution_started(&self, pipeline_name: &str, execution_arn: &str, data_uri: &str) {
        info!(
            event = "execution_started",
            workload = %self.workload_name,
            pipeline_name = %pipeline_name,
            execution_arn = %execution_arn,
            data_uri = %data_uri,
            "Started pipeline execution"
        );
    }

    pub fn log_stage_completed(&self, stage: &str, duration_secs: f64) {
        info!(
            event = "stage_completed",
            workload = %self.workload_name,
            stage = %stage,
            duration_secs = duration_secs,
            "Workflow stage completed"
        );
    }

    pub fn log_stage_failed(&self, stage: &str, error_kind: &str, message: &str) {
        error!(
            event = "stage_failed",
            workload = %self.workload_name,
            stage = %stage,
            error_kind = %error_kind,
            message = %message,
            "Workflow stage failed"
        );
    }

    pub fn log_quality_gate(&self, score: f64, threshold: f64) {
        if score >= threshold {
            info!(
                event = "quality_gate_evaluated",
                workload = %self.workload_name,
                f1_score = score,
                threshold = threshold,
                passed = true,
                "Model meets the quality threshold"
            );
        } else {
            warn!(
                event = "quality_gate_evaluated",
                workload = %self.workload_name,
                f1_score = score,
                threshold = threshold,
                passed = false,
                "Model is below the quality threshold"
            );
        }
    }

    pub fn log_endpoint_config_created(&self, config_name: &str, model_name: &str, endpoint_type: &str) {
        info!(
            event = "endpoint_config_created",
            workload = %self.workload_name,
            config_name = %config_name,
            model_name = %model_name,
            endpoint_type = %endpoint_type,
            "Created endpoint configuration"
        );
    }

    pub fn log_endpoint_updated(&self, endpoint_name: &str, config_name: &str) {
        info!(
            event = "endpoint_updated",
            workload = %self.workload_name,
            endpoint_name = %endpoint_name,
            config_name = %config_name,
            "Updated existing endpoint"
        );
    }

    pub fn log_endpoint_created(&self, endpoint_name: &str, config_name: &str) {
        info!(
            event = "endpoint_created",
            workload = %self.workload_name,
            endpoint_name = %endpoint_name,
            config_name = %config_name,
            "Endpoint not found, created a new one"
        );
    }

    pub fn log_startup(&self, version: &str, port: u16) {
        info!(
            event = "runtime_started",
            workload = %self.workload_name,
            version = %version,
            port = port,
            "Handlers runtime started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "runtime_shutdown",
            workload = %self.workload_name,
            reason = %reason,
            "Handlers runtime shutting down"
        );
    }
}
