use crate::config::endpoint_name;
use crate::control_plane::ControlPlane;
use crate::error::{Result, WorkflowError};
use crate::models::{
    CreateEndpointConfigRequest, Endpoint, EndpointConfig, EndpointType, InvocationResponse,
    ProductionVariant, Tag,
};
use crate::observability::{StructuredLogger, WorkflowMetrics};
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Second-resolution timestamp suffix of endpoint configuration names
pub const CONFIG_TIMESTAMP_FORMAT: &str = "%m-%d-%H-%M-%S";

const HANDLER_NAME: &str = "endpoint-upsert";

/// Invocation payload from the deployment step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointUpsertEvent {
    #[serde(rename = "MODEL_NAME")]
    pub model_name: String,
    #[serde(rename = "WORKLOAD_NAME")]
    pub workload_name: String,
    /// Only consulted for hosted endpoints
    #[serde(rename = "INSTANCE_TYPE", default)]
    pub instance_type: String,
    /// Kept as text so an unknown type reaches the handler and is rejected
    /// with a configuration error instead of a decode error
    #[serde(rename = "ENDPOINT_TYPE")]
    pub endpoint_type: String,
}

/// Whether the endpoint already existed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertAction {
    Updated,
    Created,
}

impl fmt::Display for UpsertAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpsertAction::Updated => write!(f, "updated"),
            UpsertAction::Created => write!(f, "created"),
        }
    }
}

/// Resources left behind by a promotion
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    pub endpoint_config: EndpointConfig,
    pub endpoint: Endpoint,
    pub action: UpsertAction,
}

#[derive(Serialize)]
struct UpsertBody<'a> {
    #[serde(rename = "EndpointConfigArn")]
    endpoint_config_arn: &'a str,
    #[serde(rename = "EndpointArn")]
    endpoint_arn: &'a str,
}

impl UpsertOutcome {
    /// `200` with `{"EndpointConfigArn", "EndpointArn"}` encoded into the body
    pub fn into_response(&self) -> Result<InvocationResponse> {
        let body = serde_json::to_string(&UpsertBody {
            endpoint_config_arn: &self.endpoint_config.arn,
            endpoint_arn: &self.endpoint.arn,
        })?;
        Ok(InvocationResponse::ok(body))
    }
}

/// Endpoint configuration name for a promotion at `now`
pub fn config_name<Tz: TimeZone>(workload_name: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    format!("{}-{}", workload_name, now.format(CONFIG_TIMESTAMP_FORMAT))
}

/// Creates or updates the serving endpoint of a workload
#[derive(Clone)]
pub struct EndpointUpsertHandler {
    control_plane: Arc<dyn ControlPlane>,
    metrics: WorkflowMetrics,
}

impl EndpointUpsertHandler {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            control_plane,
            metrics: WorkflowMetrics::new(),
        }
    }

    /// Handle one invocation, naming the configuration after the local clock
    pub async fn handle(&self, event: &EndpointUpsertEvent) -> Result<InvocationResponse> {
        self.upsert(event).await?.into_response()
    }

    pub async fn upsert(&self, event: &EndpointUpsertEvent) -> Result<UpsertOutcome> {
        self.upsert_at(event, Local::now()).await
    }

    /// Promote `event.model_name` with an explicit clock
    pub async fn upsert_at<Tz: TimeZone>(
        &self,
        event: &EndpointUpsertEvent,
        now: DateTime<Tz>,
    ) -> Result<UpsertOutcome>
    where
        Tz::Offset: fmt::Display,
    {
        let start = Instant::now();
        let result = self.promote(event, &now).await;
        self.metrics
            .observe_handler_duration(HANDLER_NAME, start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            self.metrics.inc_handler_errors(HANDLER_NAME, e.kind());
        }
        result
    }

    async fn promote<Tz: TimeZone>(
        &self,
        event: &EndpointUpsertEvent,
        now: &DateTime<Tz>,
    ) -> Result<UpsertOutcome>
    where
        Tz::Offset: fmt::Display,
    {
        let logger = StructuredLogger::new(&event.workload_name);
        let variant = production_variant(event)?;
        let tags = vec![Tag::workload(&event.workload_name)];

        let request = CreateEndpointConfigRequest {
            name: config_name(&event.workload_name, now),
            variants: vec![variant],
            tags: tags.clone(),
        };
        debug!(config_name = %request.name, "Creating endpoint configuration");
        let endpoint_config = self.control_plane.create_endpoint_config(request).await?;
        self.metrics.inc_endpoint_configs_created();
        logger.log_endpoint_config_created(
            &endpoint_config.name,
            &event.model_name,
            &event.endpoint_type,
        );

        let endpoint_name = endpoint_name(&event.workload_name);
        let (endpoint, action) = match self
            .control_plane
            .update_endpoint(&endpoint_name, &endpoint_config.name)
            .await
        {
            Ok(endpoint) => {
                logger.log_endpoint_updated(&endpoint.name, &endpoint_config.name);
                (endpoint, UpsertAction::Updated)
            }
            Err(e) if e.is_not_found() => {
                let endpoint = self
                    .control_plane
                    .create_endpoint(&endpoint_name, &endpoint_config.name, tags)
                    .await?;
                logger.log_endpoint_created(&endpoint.name, &endpoint_config.name);
                (endpoint, UpsertAction::Created)
            }
            Err(e) => {
                warn!(
                    endpoint_name = %endpoint_name,
                    error = %e,
                    "Endpoint update failed"
                );
                return Err(e);
            }
        };
        self.metrics.inc_endpoint_upserts(&action.to_string());

        Ok(UpsertOutcome {
            endpoint_config,
            endpoint,
            action,
        })
    }
}

fn production_variant(event: &EndpointUpsertEvent) -> Result<ProductionVariant> {
    match event.endpoint_type.parse::<EndpointType>()? {
        EndpointType::Serverless => Ok(ProductionVariant::serverless(&event.model_name)),
        EndpointType::Hosted => {
            if event.instance_type.trim().is_empty() {
                return Err(WorkflowError::configuration(
                    "INSTANCE_TYPE is required for HOSTED endpoints",
                ));
            }
            Ok(ProductionVariant::hosted(
                &event.model_name,
                &event.instance_type,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::{InMemoryControlPlane, Operation};
    use chrono::Utc;

    fn event(model_name: &str, endpoint_type: &str) -> EndpointUpsertEvent {
        EndpointUpsertEvent {
            model_name: model_name.to_string(),
            workload_name: "AutoML".to_string(),
            instance_type: "ml.m5.xlarge".to_string(),
            endpoint_type: endpoint_type.to_string(),
        }
    }

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 15, 9, secs).unwrap()
    }

    fn setup() -> (Arc<InMemoryControlPlane>, EndpointUpsertHandler) {
        let cp = Arc::new(InMemoryControlPlane::default());
        let handler = EndpointUpsertHandler::new(cp.clone());
        (cp, handler)
    }

    #[test]
    fn test_config_name_format() {
        assert_eq!(config_name("AutoML", &at(26)), "AutoML-03-14-15-09-26");
    }

    #[test]
    fn test_event_wire_names() {
        let json = r#"{"MODEL_NAME":"m","WORKLOAD_NAME":"w","INSTANCE_TYPE":"ml.m5.large","ENDPOINT_TYPE":"HOSTED"}"#;
        let event: EndpointUpsertEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.model_name, "m");
        assert_eq!(event.endpoint_type, "HOSTED");

        let no_instance = r#"{"MODEL_NAME":"m","WORKLOAD_NAME":"w","ENDPOINT_TYPE":"SERVERLESS"}"#;
        let event: EndpointUpsertEvent = serde_json::from_str(no_instance).unwrap();
        assert!(event.instance_type.is_empty());
    }

    #[tokio::test]
    async fn test_creates_endpoint_when_absent() {
        let (cp, handler) = setup();
        let outcome = handler
            .upsert_at(&event("model-a", "SERVERLESS"), at(0))
            .await
            .unwrap();

        assert_eq!(outcome.action, UpsertAction::Created);
        assert_eq!(outcome.endpoint.name, "AutoML-Endpoint");
        assert_eq!(outcome.endpoint.config_name, "AutoML-03-14-15-09-00");
        assert!(outcome.endpoint.arn.starts_with("arn:aws:sagemaker:"));
        assert!(outcome.endpoint_config.arn.contains(":endpoint-config/"));
        assert_eq!(outcome.endpoint.tags, vec![Tag::workload("AutoML")]);
        assert_eq!(cp.endpoints().await.len(), 1);
    }

    #[tokio::test]
    async fn test_updates_existing_endpoint() {
        let (cp, handler) = setup();
        let first = handler
            .upsert_at(&event("model-a", "SERVERLESS"), at(0))
            .await
            .unwrap();
        let second = handler
            .upsert_at(&event("model-b", "HOSTED"), at(1))
            .await
            .unwrap();

        assert_eq!(second.action, UpsertAction::Updated);
        assert_eq!(second.endpoint.name, first.endpoint.name);
        assert_eq!(second.endpoint.arn, first.endpoint.arn);
        assert_ne!(second.endpoint.config_name, first.endpoint.config_name);
        assert_eq!(second.endpoint.endpoint_type, EndpointType::Hosted);
        assert_eq!(second.endpoint.instance_type.as_deref(), Some("ml.m5.xlarge"));

        // Old configuration retained
        assert_eq!(cp.endpoint_configs().await.len(), 2);
    }

    #[tokio::test]
    async fn test_sequential_promotions_get_distinct_config_names() {
        let (cp, handler) = setup();
        handler
            .upsert_at(&event("model-a", "SERVERLESS"), at(10))
            .await
            .unwrap();
        handler
            .upsert_at(&event("model-a", "SERVERLESS"), at(11))
            .await
            .unwrap();

        let names: Vec<String> = cp
            .endpoint_configs()
            .await
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names.len(), 2);
        assert_ne!(names[0], names[1]);
        assert_eq!(cp.endpoints().await.len(), 1);
    }

    #[tokio::test]
    async fn test_same_second_promotion_fails_upstream() {
        let (_cp, handler) = setup();
        handler
            .upsert_at(&event("model-a", "SERVERLESS"), at(5))
            .await
            .unwrap();
        let err = handler
            .upsert_at(&event("model-b", "SERVERLESS"), at(5))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UpstreamService { .. }));
    }

    #[tokio::test]
    async fn test_invalid_endpoint_type_rejected() {
        let (cp, handler) = setup();
        let err = handler
            .upsert_at(&event("model-a", "EDGE"), at(0))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Configuration(_)));
        assert!(err.to_string().contains("'HOSTED' or 'SERVERLESS'"));
        assert!(cp.endpoint_configs().await.is_empty());
    }

    #[tokio::test]
    async fn test_hosted_requires_instance_type() {
        let (_cp, handler) = setup();
        let mut hosted = event("model-a", "HOSTED");
        hosted.instance_type.clear();
        let err = handler.upsert_at(&hosted, at(0)).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_update_failure_other_than_not_found_is_fatal() {
        let (cp, handler) = setup();
        handler
            .upsert_at(&event("model-a", "SERVERLESS"), at(0))
            .await
            .unwrap();
        cp.inject_failure(Operation::UpdateEndpoint, "throttled").await;

        let err = handler
            .upsert_at(&event("model-b", "SERVERLESS"), at(1))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "UpdateEndpoint failed: throttled");
        // No fallback create was attempted
        assert_eq!(cp.endpoints().await.len(), 1);
    }

    #[tokio::test]
    async fn test_config_creation_failure_is_fatal() {
        let (cp, handler) = setup();
        cp.inject_failure(Operation::CreateEndpointConfig, "limit exceeded")
            .await;
        let err = handler
            .upsert_at(&event("model-a", "SERVERLESS"), at(0))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UpstreamService { .. }));
        assert!(cp.endpoints().await.is_empty());
    }

    #[tokio::test]
    async fn test_response_body_carries_both_arns() {
        let (_cp, handler) = setup();
        let outcome = handler
            .upsert_at(&event("model-a", "SERVERLESS"), at(0))
            .await
            .unwrap();
        let response = outcome.into_response().unwrap();
        assert_eq!(response.status_code, 200);

        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["EndpointConfigArn"], outcome.endpoint_config.arn.as_str());
        assert_eq!(body["EndpointArn"], outcome.endpoint.arn.as_str());
    }
}
