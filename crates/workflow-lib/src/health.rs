//! Health tracking for the handlers runtime
//!
//! Backs the liveness and readiness routes. The runtime is ready once its
//! control plane client is constructed and no tracked component is failing.

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Last invocation succeeded
    Healthy,
    /// Recent invocations failed but the component still accepts work
    Degraded,
    /// Cannot serve invocations at all
    Unhealthy,
}

/// Latest health record of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Body of the liveness route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across components; empty means healthy
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|h| h.status)
            .fold(ComponentStatus::Healthy, |worst, status| match (worst, status) {
                (ComponentStatus::Unhealthy, _) | (_, ComponentStatus::Unhealthy) => {
                    ComponentStatus::Unhealthy
                }
                (ComponentStatus::Degraded, _) | (_, ComponentStatus::Degraded) => {
                    ComponentStatus::Degraded
                }
                _ => ComponentStatus::Healthy,
            })
    }
}

/// Body of the readiness route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const CONTROL_PLANE: &str = "control_plane";
    pub const TRIGGER_HANDLER: &str = "trigger_handler";
    pub const ENDPOINT_HANDLER: &str = "endpoint_handler";
}

/// Shared registry of component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a component as healthy
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    /// Replace a component's health record
    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    /// Mark component as healthy
    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    /// Mark component as degraded
    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    /// Mark component as unhealthy
    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Fold one handler invocation outcome into component health.
    ///
    /// Caller mistakes leave health untouched. Control plane rejections
    /// degrade the control plane alongside the handler.
    pub async fn record_invocation<T>(&self, handler: &str, outcome: &Result<T, WorkflowError>) {
        match outcome {
            Ok(_) => {
                self.set_healthy(handler).await;
                self.set_healthy(components::CONTROL_PLANE).await;
            }
            Err(e) if e.is_client_error() => {}
            Err(e) => {
                if matches!(e, WorkflowError::UpstreamService { .. }) {
                    self.set_degraded(components::CONTROL_PLANE, e.to_string())
                        .await;
                }
                self.set_degraded(handler, e.to_string()).await;
            }
        }
    }

    /// Flip the readiness flag once startup finished
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Snapshot of every component with the worst status on top
    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Ready once started and no component is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let status = self.health().await.status;

        let reason = if !ready {
            Some("Handlers not yet initialized")
        } else if status == ComponentStatus::Unhealthy {
            Some("Component unhealthy")
        } else {
            None
        };
        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_degraded_handler_degrades_overall() {
        let registry = HealthRegistry::new();
        registry.register(components::CONTROL_PLANE).await;
        registry.register(components::ENDPOINT_HANDLER).await;
        registry
            .set_degraded(components::ENDPOINT_HANDLER, "UpdateEndpoint failed")
            .await;

        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry.set_healthy(components::ENDPOINT_HANDLER).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_unhealthy_wins_over_degraded() {
        let registry = HealthRegistry::new();
        registry.set_degraded(components::TRIGGER_HANDLER, "slow").await;
        registry
            .set_unhealthy(components::CONTROL_PLANE, "unreachable")
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_upstream_failure_degrades_control_plane() {
        let registry = HealthRegistry::new();
        registry.register(components::CONTROL_PLANE).await;
        registry.register(components::TRIGGER_HANDLER).await;

        let failed: Result<(), _> = Err(WorkflowError::upstream(
            "StartPipelineExecution",
            "throttled",
        ));
        registry
            .record_invocation(components::TRIGGER_HANDLER, &failed)
            .await;
        let health = registry.health().await;
        assert_eq!(
            health.components[components::CONTROL_PLANE].status,
            ComponentStatus::Degraded
        );
        assert_eq!(
            health.components[components::TRIGGER_HANDLER].status,
            ComponentStatus::Degraded
        );

        registry
            .record_invocation(components::TRIGGER_HANDLER, &Ok::<_, WorkflowError>(()))
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_client_error_leaves_health_alone() {
        let registry = HealthRegistry::new();
        registry.register(components::ENDPOINT_HANDLER).await;

        let rejected: Result<(), _> = Err(WorkflowError::Configuration(
            "Invalid Endpoint Type".to_string(),
        ));
        registry
            .record_invocation(components::ENDPOINT_HANDLER, &rejected)
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_readiness_transitions() {
        let registry = HealthRegistry::new();
        registry.register(components::CONTROL_PLANE).await;
        assert!(!registry.readiness().await.ready);

        registry.set_ready(true).await;
        assert!(registry.readiness().await.ready);

        registry
            .set_unhealthy(components::CONTROL_PLANE, "unreachable")
            .await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Component unhealthy"));
    }
}
