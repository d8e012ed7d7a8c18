//! Managed machine-learning platform control plane
//!
//! The handlers and the local stage executor only talk to the platform
//! through the [`ControlPlane`] trait. Two implementations are provided:
//! an in-memory one for tests, local runs and the standalone handlers
//! runtime, and a JSON-over-HTTP client for a remote control plane.

mod http;
mod memory;

pub use http::HttpControlPlane;
pub use memory::{InMemoryControlPlane, ModelServer};

use crate::error::Result;
use crate::models::{
    CreateEndpointConfigRequest, CreateModelPackageRequest, CreateModelRequest, Endpoint,
    EndpointConfig, ModelArtifact, ModelPackage, PipelineExecution, PipelineParameter, Tag,
};
use std::fmt;

pub use async_trait::async_trait;

/// Control-plane operations, named as the platform names them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateEndpointConfig,
    UpdateEndpoint,
    CreateEndpoint,
    DescribeEndpoint,
    StartPipelineExecution,
    CreateModel,
    CreateModelPackage,
    InvokeEndpoint,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateEndpointConfig => "CreateEndpointConfig",
            Operation::UpdateEndpoint => "UpdateEndpoint",
            Operation::CreateEndpoint => "CreateEndpoint",
            Operation::DescribeEndpoint => "DescribeEndpoint",
            Operation::StartPipelineExecution => "StartPipelineExecution",
            Operation::CreateModel => "CreateModel",
            Operation::CreateModelPackage => "CreateModelPackage",
            Operation::InvokeEndpoint => "InvokeEndpoint",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for managed-platform control planes
///
/// `update_endpoint`, `describe_endpoint` and `invoke_endpoint` fail with
/// [`WorkflowError::NotFound`](crate::error::WorkflowError::NotFound) when
/// the endpoint does not exist; every other failure is
/// [`WorkflowError::UpstreamService`](crate::error::WorkflowError::UpstreamService).
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn create_endpoint_config(
        &self,
        request: CreateEndpointConfigRequest,
    ) -> Result<EndpointConfig>;

    /// Point an existing endpoint at another configuration
    async fn update_endpoint(&self, endpoint_name: &str, config_name: &str) -> Result<Endpoint>;

    async fn create_endpoint(
        &self,
        endpoint_name: &str,
        config_name: &str,
        tags: Vec<Tag>,
    ) -> Result<Endpoint>;

    async fn describe_endpoint(&self, endpoint_name: &str) -> Result<Endpoint>;

    async fn start_pipeline_execution(
        &self,
        pipeline_name: &str,
        parameters: Vec<PipelineParameter>,
    ) -> Result<PipelineExecution>;

    async fn create_model(&self, request: CreateModelRequest) -> Result<ModelArtifact>;

    async fn create_model_package(
        &self,
        request: CreateModelPackageRequest,
    ) -> Result<ModelPackage>;

    /// Send one inference payload to a live endpoint; returns the response body
    async fn invoke_endpoint(
        &self,
        endpoint_name: &str,
        content_type: &str,
        payload: &str,
    ) -> Result<String>;
}

/// ARN of a resource in the managed platform
pub fn resource_arn(region: &str, account_id: &str, kind: &str, name: &str) -> String {
    format!(
        "arn:aws:sagemaker:{}:{}:{}/{}",
        region,
        account_id,
        kind,
        name.to_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_arn_lowercases_name() {
        assert_eq!(
            resource_arn("us-east-1", "123", "endpoint", "AutoML-Endpoint"),
            "arn:aws:sagemaker:us-east-1:123:endpoint/automl-endpoint"
        );
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::UpdateEndpoint.to_string(), "UpdateEndpoint");
        assert_eq!(
            Operation::StartPipelineExecution.as_str(),
            "StartPipelineExecution"
        );
    }
}
