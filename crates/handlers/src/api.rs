//! HTTP API for handler invocations, health checks and Prometheus metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use workflow_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    EndpointUpsertEvent, EndpointUpsertHandler, InvocationResponse, StorageNotification,
    TriggerHandler, WorkflowMetrics,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: WorkflowMetrics,
    pub trigger: TriggerHandler,
    pub endpoint: EndpointUpsertHandler,
    pub invocation_timeout: Duration,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        trigger: TriggerHandler,
        endpoint: EndpointUpsertHandler,
        invocation_timeout: Duration,
    ) -> Self {
        Self {
            health_registry,
            metrics: WorkflowMetrics::new(),
            trigger,
            endpoint,
            invocation_timeout,
        }
    }
}

/// Error payload of a failed invocation
#[derive(Debug, Serialize)]
pub struct InvocationError {
    #[serde(rename = "errorType")]
    pub error_type: String,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    (
        status,
        Json(InvocationError {
            error_type: error_type.to_string(),
            error_message: message,
        }),
    )
        .into_response()
}

/// Run one handler invocation under the timeout and map its result
async fn invoke<F>(state: &AppState, component: &str, handler: &str, fut: F) -> Response
where
    F: Future<Output = workflow_lib::Result<InvocationResponse>>,
{
    match tokio::time::timeout(state.invocation_timeout, fut).await {
        Ok(outcome) => {
            state
                .health_registry
                .record_invocation(component, &outcome)
                .await;
            match outcome {
                Ok(response) => (StatusCode::OK, Json(response)).into_response(),
                Err(e) => {
                    warn!(handler = handler, error = %e, "Invocation failed");
                    let status = if e.is_client_error() {
                        StatusCode::BAD_REQUEST
                    } else {
                        StatusCode::BAD_GATEWAY
                    };
                    error_response(status, e.kind(), e.to_string())
                }
            }
        }
        Err(_) => {
            let message = format!(
                "Invocation exceeded {}s budget",
                state.invocation_timeout.as_secs()
            );
            warn!(handler = handler, "{}", message);
            state.metrics.inc_handler_errors(handler, "Timeout");
            state.health_registry.set_degraded(component, &message).await;
            error_response(StatusCode::GATEWAY_TIMEOUT, "TimeoutError", message)
        }
    }
}

async fn pipeline_trigger(
    State(state): State<Arc<AppState>>,
    Json(notification): Json<StorageNotification>,
) -> Response {
    invoke(
        &state,
        components::TRIGGER_HANDLER,
        "pipeline-trigger",
        state.trigger.handle(&notification),
    )
    .await
}

async fn endpoint_upsert(
    State(state): State<Arc<AppState>>,
    Json(event): Json<EndpointUpsertEvent>,
) -> Response {
    invoke(
        &state,
        components::ENDPOINT_HANDLER,
        "endpoint-upsert",
        state.endpoint.handle(&event),
    )
    .await
}

/// Health check response - 200 while operational, 503 when unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/invoke/pipeline-trigger", post(pipeline_trigger))
        .route("/invoke/endpoint-upsert", post(endpoint_upsert))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
