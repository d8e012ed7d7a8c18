//! Handlers runtime
//!
//! Hosts the pipeline trigger and endpoint upsert handlers behind HTTP
//! invocation routes, next to the health and metrics routes.

pub mod api;
pub mod config;

use std::sync::Arc;
use std::time::Duration;
use workflow_lib::{
    health::{components, HealthRegistry},
    ControlPlane, EndpointUpsertHandler, TriggerHandler, WorkloadConfig,
};

/// Wire both handlers to one control plane
pub async fn build_state(
    workload: &WorkloadConfig,
    control_plane: Arc<dyn ControlPlane>,
    invocation_timeout: Duration,
) -> Arc<api::AppState> {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::CONTROL_PLANE).await;
    health_registry.register(components::TRIGGER_HANDLER).await;
    health_registry.register(components::ENDPOINT_HANDLER).await;

    let trigger = TriggerHandler::new(
        control_plane.clone(),
        &workload.workload_name,
        workload.pipeline_name(),
    )
    .with_key_suffix(&workload.data_file);
    let endpoint = EndpointUpsertHandler::new(control_plane);

    Arc::new(api::AppState::new(
        health_registry,
        trigger,
        endpoint,
        invocation_timeout,
    ))
}
