//! JSON-over-HTTP client for a remote control plane

use super::{async_trait, ControlPlane, Operation};
use crate::error::{Result, WorkflowError};
use crate::models::{
    CreateEndpointConfigRequest, CreateModelPackageRequest, CreateModelRequest, Endpoint,
    EndpointConfig, ModelArtifact, ModelPackage, PipelineExecution, PipelineParameter, Tag,
};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Serialize)]
struct UpdateEndpointBody<'a> {
    config_name: &'a str,
}

#[derive(Serialize)]
struct CreateEndpointBody<'a> {
    endpoint_name: &'a str,
    config_name: &'a str,
    tags: Vec<Tag>,
}

#[derive(Serialize)]
struct StartExecutionBody {
    parameters: Vec<PipelineParameter>,
}

/// Error payload returned by the control plane
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Control plane reached over HTTP
pub struct HttpControlPlane {
    client: Client,
    base_url: Url,
}

impl HttpControlPlane {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            WorkflowError::configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        let mut base_url = Url::parse(base_url).map_err(|e| {
            WorkflowError::configuration(format!("Invalid control plane URL {}: {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(WorkflowError::configuration(format!(
                "Control plane URL {} cannot be a base",
                base_url
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| WorkflowError::configuration("Control plane URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call<B, T>(
        &self,
        operation: Operation,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(segments)?;
        debug!(operation = %operation, url = %url, "Calling control plane");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        self.send(operation, request, segments)
            .await?
            .json()
            .await
            .map_err(|e| WorkflowError::upstream(operation.as_str(), e.to_string()))
    }

    /// Send a prepared request and map any non-success status
    async fn send(
        &self,
        operation: Operation,
        request: RequestBuilder,
        segments: &[&str],
    ) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| WorkflowError::upstream(operation.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response.text().await);
            return Err(status_error(operation, status, segments, message));
        }
        Ok(response)
    }
}

/// Message of a failed call: the payload's `message`, else the raw body
fn error_message<E: std::fmt::Display>(body: std::result::Result<String, E>) -> String {
    match body {
        Ok(text) => serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.message)
            .unwrap_or(text),
        Err(e) => format!("unreadable response body: {}", e),
    }
}

/// Map a non-success status to the error taxonomy
///
/// Only calls addressing one endpoint recognise 404 as a missing resource.
fn status_error(
    operation: Operation,
    status: StatusCode,
    segments: &[&str],
    message: String,
) -> WorkflowError {
    let endpoint_call = matches!(
        operation,
        Operation::UpdateEndpoint | Operation::DescribeEndpoint | Operation::InvokeEndpoint
    );
    if status == StatusCode::NOT_FOUND && endpoint_call {
        let name = segments.get(1).copied().unwrap_or_default();
        return WorkflowError::not_found("endpoint", name);
    }
    WorkflowError::upstream(operation.as_str(), format!("({}) {}", status, message))
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn create_endpoint_config(
        &self,
        request: CreateEndpointConfigRequest,
    ) -> Result<EndpointConfig> {
        self.call(
            Operation::CreateEndpointConfig,
            Method::POST,
            &["endpoint-configs"],
            Some(&request),
        )
        .await
    }

    async fn update_endpoint(&self, endpoint_name: &str, config_name: &str) -> Result<Endpoint> {
        self.call(
            Operation::UpdateEndpoint,
            Method::PUT,
            &["endpoints", endpoint_name],
            Some(&UpdateEndpointBody { config_name }),
        )
        .await
    }

    async fn create_endpoint(
        &self,
        endpoint_name: &str,
        config_name: &str,
        tags: Vec<Tag>,
    ) -> Result<Endpoint> {
        let body = CreateEndpointBody {
            endpoint_name,
            config_name,
            tags,
        };
        self.call(
            Operation::CreateEndpoint,
            Method::POST,
            &["endpoints"],
            Some(&body),
        )
        .await
    }

    async fn describe_endpoint(&self, endpoint_name: &str) -> Result<Endpoint> {
        self.call::<(), _>(
            Operation::DescribeEndpoint,
            Method::GET,
            &["endpoints", endpoint_name],
            None,
        )
        .await
    }

    async fn start_pipeline_execution(
        &self,
        pipeline_name: &str,
        parameters: Vec<PipelineParameter>,
    ) -> Result<PipelineExecution> {
        self.call(
            Operation::StartPipelineExecution,
            Method::POST,
            &["pipelines", pipeline_name, "executions"],
            Some(&StartExecutionBody { parameters }),
        )
        .await
    }

    async fn create_model(&self, request: CreateModelRequest) -> Result<ModelArtifact> {
        self.call(
            Operation::CreateModel,
            Method::POST,
            &["models"],
            Some(&request),
        )
        .await
    }

    async fn create_model_package(
        &self,
        request: CreateModelPackageRequest,
    ) -> Result<ModelPackage> {
        self.call(
            Operation::CreateModelPackage,
            Method::POST,
            &["model-packages"],
            Some(&request),
        )
        .await
    }

    async fn invoke_endpoint(
        &self,
        endpoint_name: &str,
        content_type: &str,
        payload: &str,
    ) -> Result<String> {
        let operation = Operation::InvokeEndpoint;
        let segments = ["endpoints", endpoint_name, "invocations"];
        let url = self.url(&segments)?;
        debug!(operation = %operation, url = %url, "Calling control plane");

        let request = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, content_type)
            .body(payload.to_string());
        self.send(operation, request, &segments)
            .await?
            .text()
            .await
            .map_err(|e| WorkflowError::upstream(operation.as_str(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn endpoint_json(config_name: &str) -> String {
        serde_json::json!({
            "name": "AutoML-Endpoint",
            "arn": "arn:aws:sagemaker:us-east-1:000000000000:endpoint/automl-endpoint",
            "config_name": config_name,
            "endpoint_type": "SERVERLESS",
            "instance_type": null,
            "tags": [{"Key": "WorkloadName", "Value": "AutoML"}],
            "created_at": "2024-01-01T00:00:00Z",
            "last_modified_at": "2024-01-01T00:00:00Z"
        })
        .to_string()
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let cp = HttpControlPlane::new("http://localhost:9000/api").unwrap();
        assert_eq!(cp.base_url().as_str(), "http://localhost:9000/api/");
        let url = cp.url(&["endpoints", "AutoML-Endpoint"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/api/endpoints/AutoML-Endpoint");
    }

    #[test]
    fn test_error_message_sources() {
        assert_eq!(
            error_message::<&str>(Ok(r#"{"message":"throttled"}"#.to_string())),
            "throttled"
        );
        assert_eq!(error_message::<&str>(Ok("gateway down".to_string())), "gateway down");
        assert_eq!(
            error_message(Err::<String, _>("connection reset")),
            "unreadable response body: connection reset"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpControlPlane::new("not a url"),
            Err(WorkflowError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_update_endpoint_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/endpoints/AutoML-Endpoint")
            .match_body(Matcher::Json(serde_json::json!({"config_name": "cfg-2"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(endpoint_json("cfg-2"))
            .create_async()
            .await;

        let cp = HttpControlPlane::new(&server.url()).unwrap();
        let endpoint = cp.update_endpoint("AutoML-Endpoint", "cfg-2").await.unwrap();
        assert_eq!(endpoint.config_name, "cfg-2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_missing_endpoint_maps_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/endpoints/AutoML-Endpoint")
            .with_status(404)
            .with_body(r#"{"message":"Could not find endpoint"}"#)
            .create_async()
            .await;

        let cp = HttpControlPlane::new(&server.url()).unwrap();
        let err = cp.update_endpoint("AutoML-Endpoint", "cfg-2").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_server_error_is_upstream() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/endpoint-configs")
            .with_status(500)
            .with_body(r#"{"message":"internal failure"}"#)
            .create_async()
            .await;

        let cp = HttpControlPlane::new(&server.url()).unwrap();
        let request = CreateEndpointConfigRequest {
            name: "AutoML-01-01-00-00-00".to_string(),
            variants: vec![crate::models::ProductionVariant::serverless("m")],
            tags: vec![],
        };
        let err = cp.create_endpoint_config(request).await.unwrap_err();
        match err {
            WorkflowError::UpstreamService { operation, message } => {
                assert_eq!(operation, "CreateEndpointConfig");
                assert!(message.contains("internal failure"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invoke_endpoint_posts_raw_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/endpoints/AutoML-Endpoint/invocations")
            .match_header("content-type", "text/csv")
            .match_body("a1,2023_01_03,1,,0.5")
            .with_status(200)
            .with_header("content-type", "text/csv")
            .with_body("churn\n")
            .create_async()
            .await;

        let cp = HttpControlPlane::new(&server.url()).unwrap();
        let body = cp
            .invoke_endpoint("AutoML-Endpoint", "text/csv", "a1,2023_01_03,1,,0.5")
            .await
            .unwrap();
        assert_eq!(body, "churn\n");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_invoke_missing_endpoint_maps_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/endpoints/Gone/invocations")
            .with_status(404)
            .with_body(r#"{"message":"Endpoint Gone not found"}"#)
            .create_async()
            .await;

        let cp = HttpControlPlane::new(&server.url()).unwrap();
        let err = cp.invoke_endpoint("Gone", "text/csv", "1").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Could not find endpoint \"Gone\"");
    }

    #[tokio::test]
    async fn test_start_pipeline_execution_posts_parameters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/pipelines/AutoML-AutoMLPipeline/executions")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "parameters": [{"Name": "DataFile", "Value": "features.csv"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "arn": "arn:aws:sagemaker:us-east-1:0:pipeline/automl-automlpipeline/execution/abc",
                    "pipeline_name": "AutoML-AutoMLPipeline",
                    "parameters": [{"Name": "DataFile", "Value": "features.csv"}],
                    "started_at": "2024-01-01T00:00:00Z"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let cp = HttpControlPlane::new(&server.url()).unwrap();
        let execution = cp
            .start_pipeline_execution(
                "AutoML-AutoMLPipeline",
                vec![PipelineParameter::new("DataFile", "features.csv")],
            )
            .await
            .unwrap();
        assert!(execution.arn.ends_with("/execution/abc"));
        mock.assert_async().await;
    }
}
