//! AutoML workflow library
//!
//! This crate provides the core functionality for:
//! - Splitting an uploaded dataset into training and held-out test sets
//! - Scoring batch predictions with a weighted F1 score
//! - Promoting a model by swapping endpoint configurations
//! - Starting pipeline executions from upload notifications
//! - The pipeline definition, its state machine and a local runner
//! - Health checks and observability

pub mod config;
pub mod control_plane;
pub mod endpoint;
pub mod error;
pub mod evaluation;
pub mod health;
pub mod models;
pub mod observability;
pub mod preprocess;
pub mod trigger;
pub mod workflow;

pub use config::WorkloadConfig;
pub use control_plane::{ControlPlane, HttpControlPlane, InMemoryControlPlane, ModelServer};
pub use endpoint::{EndpointUpsertEvent, EndpointUpsertHandler};
pub use error::{Result, WorkflowError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{StructuredLogger, WorkflowMetrics};
pub use trigger::{StorageNotification, TriggerHandler};
