//! In-memory control plane
//!
//! Keeps endpoint configurations, endpoints, models, registry entries and
//! pipeline executions in maps behind a single lock. Names are unique per
//! resource kind, as on the real platform. Endpoint invocations are answered
//! by an attached [`ModelServer`].

use super::{async_trait, resource_arn, ControlPlane, Operation};
use crate::error::{Result, WorkflowError};
use crate::models::{
    CreateEndpointConfigRequest, CreateModelPackageRequest, CreateModelRequest, Endpoint,
    EndpointConfig, EndpointType, ModelArtifact, ModelPackage, PipelineExecution,
    PipelineParameter, Tag,
};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct State {
    endpoint_configs: HashMap<String, EndpointConfig>,
    endpoints: HashMap<String, Endpoint>,
    models: HashMap<String, ModelArtifact>,
    model_packages: Vec<ModelPackage>,
    pipelines: HashSet<String>,
    executions: Vec<PipelineExecution>,
    failures: HashMap<Operation, String>,
}

/// Serving runtime behind the endpoints of an in-memory control plane
#[async_trait]
pub trait ModelServer: Send + Sync {
    /// Predict for `payload` with the model the endpoint currently serves
    async fn predict(&self, model: &ModelArtifact, content_type: &str, payload: &str)
        -> Result<String>;
}

/// Control plane held entirely in process memory
pub struct InMemoryControlPlane {
    region: String,
    account_id: String,
    state: RwLock<State>,
    model_server: Option<Arc<dyn ModelServer>>,
}

impl fmt::Debug for InMemoryControlPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryControlPlane")
            .field("region", &self.region)
            .field("account_id", &self.account_id)
            .field("serving", &self.model_server.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryControlPlane {
    fn default() -> Self {
        Self::new("us-east-1", "000000000000")
    }
}

impl InMemoryControlPlane {
    pub fn new(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account_id: account_id.into(),
            state: RwLock::new(State::default()),
            model_server: None,
        }
    }

    /// Answer endpoint invocations with `server`
    pub fn with_model_server(mut self, server: Arc<dyn ModelServer>) -> Self {
        self.model_server = Some(server);
        self
    }

    /// Declare a pipeline that executions may be started for
    pub async fn register_pipeline(&self, pipeline_name: &str) {
        self.state
            .write()
            .await
            .pipelines
            .insert(pipeline_name.to_string());
    }

    /// Make every later call of `operation` fail with `message`
    pub async fn inject_failure(&self, operation: Operation, message: impl Into<String>) {
        self.state
            .write()
            .await
            .failures
            .insert(operation, message.into());
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.failures.clear();
    }

    pub async fn endpoint_configs(&self) -> Vec<EndpointConfig> {
        let state = self.state.read().await;
        let mut configs: Vec<_> = state.endpoint_configs.values().cloned().collect();
        configs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        configs
    }

    pub async fn endpoints(&self) -> Vec<Endpoint> {
        self.state.read().await.endpoints.values().cloned().collect()
    }

    pub async fn model_packages(&self) -> Vec<ModelPackage> {
        self.state.read().await.model_packages.clone()
    }

    pub async fn models(&self) -> Vec<ModelArtifact> {
        self.state.read().await.models.values().cloned().collect()
    }

    pub async fn executions(&self) -> Vec<PipelineExecution> {
        self.state.read().await.executions.clone()
    }

    fn arn(&self, kind: &str, name: &str) -> String {
        resource_arn(&self.region, &self.account_id, kind, name)
    }

    fn check_injected(state: &State, operation: Operation) -> Result<()> {
        match state.failures.get(&operation) {
            Some(message) => Err(WorkflowError::upstream(operation.as_str(), message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn create_endpoint_config(
        &self,
        request: CreateEndpointConfigRequest,
    ) -> Result<EndpointConfig> {
        let operation = Operation::CreateEndpointConfig;
        let mut state = self.state.write().await;
        Self::check_injected(&state, operation)?;

        if state.endpoint_configs.contains_key(&request.name) {
            return Err(WorkflowError::upstream(
                operation.as_str(),
                format!(
                    "Cannot create already existing endpoint configuration \"{}\"",
                    request.name
                ),
            ));
        }
        if request.variants.is_empty() {
            return Err(WorkflowError::upstream(
                operation.as_str(),
                "At least one production variant is required",
            ));
        }

        let config = EndpointConfig {
            arn: self.arn("endpoint-config", &request.name),
            name: request.name,
            variants: request.variants,
            tags: request.tags,
            created_at: Utc::now(),
        };
        debug!(name = %config.name, "Stored endpoint configuration");
        state
            .endpoint_configs
            .insert(config.name.clone(), config.clone());
        Ok(config)
    }

    async fn update_endpoint(&self, endpoint_name: &str, config_name: &str) -> Result<Endpoint> {
        let operation = Operation::UpdateEndpoint;
        let mut state = self.state.write().await;
        Self::check_injected(&state, operation)?;

        let (endpoint_type, instance_type) = serving_shape(&state, operation, config_name)?;
        let endpoint = state
            .endpoints
            .get_mut(endpoint_name)
            .ok_or_else(|| WorkflowError::not_found("endpoint", endpoint_name))?;

        endpoint.config_name = config_name.to_string();
        endpoint.endpoint_type = endpoint_type;
        endpoint.instance_type = instance_type;
        endpoint.last_modified_at = Utc::now();
        Ok(endpoint.clone())
    }

    async fn create_endpoint(
        &self,
        endpoint_name: &str,
        config_name: &str,
        tags: Vec<Tag>,
    ) -> Result<Endpoint> {
        let operation = Operation::CreateEndpoint;
        let mut state = self.state.write().await;
        Self::check_injected(&state, operation)?;

        if state.endpoints.contains_key(endpoint_name) {
            return Err(WorkflowError::upstream(
                operation.as_str(),
                format!("Cannot create already existing endpoint \"{}\"", endpoint_name),
            ));
        }
        let (endpoint_type, instance_type) = serving_shape(&state, operation, config_name)?;

        let now = Utc::now();
        let endpoint = Endpoint {
            name: endpoint_name.to_string(),
            arn: self.arn("endpoint", endpoint_name),
            config_name: config_name.to_string(),
            endpoint_type,
            instance_type,
            tags,
            created_at: now,
            last_modified_at: now,
        };
        state
            .endpoints
            .insert(endpoint.name.clone(), endpoint.clone());
        Ok(endpoint)
    }

    async fn describe_endpoint(&self, endpoint_name: &str) -> Result<Endpoint> {
        let state = self.state.read().await;
        Self::check_injected(&state, Operation::DescribeEndpoint)?;
        state
            .endpoints
            .get(endpoint_name)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found("endpoint", endpoint_name))
    }

    async fn start_pipeline_execution(
        &self,
        pipeline_name: &str,
        parameters: Vec<PipelineParameter>,
    ) -> Result<PipelineExecution> {
        let operation = Operation::StartPipelineExecution;
        let mut state = self.state.write().await;
        Self::check_injected(&state, operation)?;

        if !state.pipelines.contains(pipeline_name) {
            return Err(WorkflowError::upstream(
                operation.as_str(),
                format!("Pipeline \"{}\" does not exist", pipeline_name),
            ));
        }

        let execution_id = format!("{:012x}", state.executions.len() + 1);
        let execution = PipelineExecution {
            arn: format!(
                "{}/execution/{}",
                self.arn("pipeline", pipeline_name),
                execution_id
            ),
            pipeline_name: pipeline_name.to_string(),
            parameters,
            started_at: Utc::now(),
        };
        state.executions.push(execution.clone());
        Ok(execution)
    }

    async fn create_model(&self, request: CreateModelRequest) -> Result<ModelArtifact> {
        let operation = Operation::CreateModel;
        let mut state = self.state.write().await;
        Self::check_injected(&state, operation)?;

        if state.models.contains_key(&request.model_name) {
            return Err(WorkflowError::upstream(
                operation.as_str(),
                format!(
                    "Cannot create already existing model \"{}\"",
                    request.model_name
                ),
            ));
        }
        let model = ModelArtifact {
            model_arn: self.arn("model", &request.model_name),
            model_name: request.model_name,
            artifact_uri: request.artifact_uri,
        };
        state.models.insert(model.model_name.clone(), model.clone());
        Ok(model)
    }

    async fn create_model_package(
        &self,
        request: CreateModelPackageRequest,
    ) -> Result<ModelPackage> {
        let operation = Operation::CreateModelPackage;
        let mut state = self.state.write().await;
        Self::check_injected(&state, operation)?;

        if !state.models.contains_key(&request.model_name) {
            return Err(WorkflowError::upstream(
                operation.as_str(),
                format!("Could not find model \"{}\"", request.model_name),
            ));
        }

        let version = state
            .model_packages
            .iter()
            .filter(|p| p.group_name == request.group_name)
            .count() as u32
            + 1;
        let package = ModelPackage {
            arn: format!(
                "{}/{}",
                self.arn("model-package", &request.group_name),
                version
            ),
            group_name: request.group_name,
            version,
            model_name: request.model_name,
            approval_status: request.approval_status,
            content_types: request.content_types,
            response_types: request.response_types,
            inference_instances: request.inference_instances,
            transform_instances: request.transform_instances,
            metrics: request.metrics,
            created_at: Utc::now(),
        };
        state.model_packages.push(package.clone());
        Ok(package)
    }

    async fn invoke_endpoint(
        &self,
        endpoint_name: &str,
        content_type: &str,
        payload: &str,
    ) -> Result<String> {
        let operation = Operation::InvokeEndpoint;
        let model = {
            let state = self.state.read().await;
            Self::check_injected(&state, operation)?;

            let endpoint = state
                .endpoints
                .get(endpoint_name)
                .ok_or_else(|| WorkflowError::not_found("endpoint", endpoint_name))?;
            let model_name = state
                .endpoint_configs
                .get(&endpoint.config_name)
                .and_then(|c| c.variants.first())
                .map(|v| v.model_name().to_string())
                .ok_or_else(|| {
                    WorkflowError::upstream(
                        operation.as_str(),
                        format!("Endpoint \"{}\" has no serving variant", endpoint_name),
                    )
                })?;
            state.models.get(&model_name).cloned().ok_or_else(|| {
                WorkflowError::upstream(
                    operation.as_str(),
                    format!("Could not find model \"{}\"", model_name),
                )
            })?
        };

        let server = self.model_server.as_ref().ok_or_else(|| {
            WorkflowError::upstream(operation.as_str(), "No model server attached")
        })?;
        debug!(endpoint = endpoint_name, model = %model.model_name, "Invoking endpoint");
        server.predict(&model, content_type, payload).await
    }
}

/// Serving type and instance type of a stored configuration
fn serving_shape(
    state: &State,
    operation: Operation,
    config_name: &str,
) -> Result<(EndpointType, Option<String>)> {
    let config = state.endpoint_configs.get(config_name).ok_or_else(|| {
        WorkflowError::upstream(
            operation.as_str(),
            format!("Could not find endpoint configuration \"{}\"", config_name),
        )
    })?;
    let variant = config.variants.first().ok_or_else(|| {
        WorkflowError::upstream(operation.as_str(), "Endpoint configuration has no variants")
    })?;
    Ok((
        variant.endpoint_type(),
        variant.instance_type().map(str::to_string),
    ))
}
