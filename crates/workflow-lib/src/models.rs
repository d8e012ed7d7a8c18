//! Core data models for the workflow and its control-plane resources

use crate::error::{Result, WorkflowError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// URI scheme of the object store the workflow reads and writes
pub const STORAGE_SCHEME: &str = "s3";

/// Variant name every endpoint configuration uses
pub const DEFAULT_VARIANT_NAME: &str = "AllTraffic";

/// Memory given to a serverless variant
pub const SERVERLESS_MEMORY_SIZE_MB: u32 = 4096;

/// Concurrency cap of a serverless variant
pub const SERVERLESS_MAX_CONCURRENCY: u32 = 20;

/// Tag key stamped on every resource this system creates
pub const WORKLOAD_TAG_KEY: &str = "WorkloadName";

/// Location of an object in the store, `s3://bucket/key`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageUri {
    pub bucket: String,
    pub key: String,
}

impl StorageUri {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into().trim_matches('/').to_string(),
        }
    }

    /// Append one path segment to the key
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.trim_matches('/');
        let key = if self.key.is_empty() {
            segment.to_string()
        } else {
            format!("{}/{}", self.key, segment)
        };
        Self {
            bucket: self.bucket.clone(),
            key,
        }
    }

    /// Last path segment of the key
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for StorageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", STORAGE_SCHEME, self.bucket, self.key)
    }
}

impl FromStr for StorageUri {
    type Err = WorkflowError;

    /// Split at the first `/` after the scheme; the key is kept byte for byte
    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix(STORAGE_SCHEME)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or_else(|| {
                WorkflowError::configuration(format!("Unsupported storage URI scheme in {}", s))
            })?;
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(WorkflowError::configuration(format!(
                "No bucket in storage URI {}",
                s
            )));
        }
        Ok(StorageUri::new(bucket, key))
    }
}

impl TryFrom<String> for StorageUri {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<StorageUri> for String {
    fn from(uri: StorageUri) -> Self {
        uri.to_string()
    }
}

/// Uploaded tabular file that starts a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub location: StorageUri,
    pub file_name: String,
    pub target_attribute: String,
}

impl Dataset {
    pub fn new(
        location: StorageUri,
        file_name: impl Into<String>,
        target_attribute: impl Into<String>,
    ) -> Self {
        Self {
            location,
            file_name: file_name.into(),
            target_attribute: target_attribute.into(),
        }
    }
}

/// Locations written by the preprocessing stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitOutputs {
    pub training_uri: StorageUri,
    pub testing_uri: StorageUri,
}

impl SplitOutputs {
    pub fn training_file(&self) -> StorageUri {
        self.training_uri.join(crate::preprocess::TRAINING_FILE)
    }

    pub fn test_features(&self) -> StorageUri {
        self.testing_uri.join(crate::preprocess::TEST_FEATURES_FILE)
    }

    pub fn test_labels(&self) -> StorageUri {
        self.testing_uri.join(crate::preprocess::TEST_LABELS_FILE)
    }
}

/// Model picked by the AutoML job as top performer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestCandidate {
    pub candidate_name: String,
    pub model_artifact_uri: StorageUri,
    pub model_insights_report_uri: StorageUri,
    pub explainability_report_uri: StorageUri,
}

/// Deployable model resource created from the best candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_name: String,
    pub model_arn: String,
    pub artifact_uri: StorageUri,
}

/// Serving mode of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EndpointType {
    /// Dedicated instances
    Hosted,
    /// Pay-per-request capacity
    Serverless,
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointType::Hosted => write!(f, "HOSTED"),
            EndpointType::Serverless => write!(f, "SERVERLESS"),
        }
    }
}

impl FromStr for EndpointType {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HOSTED" => Ok(EndpointType::Hosted),
            "SERVERLESS" => Ok(EndpointType::Serverless),
            _ => Err(WorkflowError::configuration(
                "Invalid Endpoint Type. Please specify 'HOSTED' or 'SERVERLESS'",
            )),
        }
    }
}

/// Resource tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl Tag {
    pub fn workload(workload_name: &str) -> Self {
        Self {
            key: WORKLOAD_TAG_KEY.to_string(),
            value: workload_name.to_string(),
        }
    }
}

/// One model bound to serving capacity inside an endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProductionVariant {
    Hosted {
        variant_name: String,
        model_name: String,
        instance_type: String,
        initial_instance_count: u32,
        initial_variant_weight: f32,
    },
    Serverless {
        variant_name: String,
        model_name: String,
        memory_size_mb: u32,
        max_concurrency: u32,
    },
}

impl ProductionVariant {
    /// Single hosted variant taking all traffic
    pub fn hosted(model_name: &str, instance_type: &str) -> Self {
        ProductionVariant::Hosted {
            variant_name: DEFAULT_VARIANT_NAME.to_string(),
            model_name: model_name.to_string(),
            instance_type: instance_type.to_string(),
            initial_instance_count: 1,
            initial_variant_weight: 1.0,
        }
    }

    /// Single serverless variant with the fixed memory and concurrency
    pub fn serverless(model_name: &str) -> Self {
        ProductionVariant::Serverless {
            variant_name: DEFAULT_VARIANT_NAME.to_string(),
            model_name: model_name.to_string(),
            memory_size_mb: SERVERLESS_MEMORY_SIZE_MB,
            max_concurrency: SERVERLESS_MAX_CONCURRENCY,
        }
    }

    pub fn endpoint_type(&self) -> EndpointType {
        match self {
            ProductionVariant::Hosted { .. } => EndpointType::Hosted,
            ProductionVariant::Serverless { .. } => EndpointType::Serverless,
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            ProductionVariant::Hosted { model_name, .. }
            | ProductionVariant::Serverless { model_name, .. } => model_name,
        }
    }

    pub fn instance_type(&self) -> Option<&str> {
        match self {
            ProductionVariant::Hosted { instance_type, .. } => Some(instance_type),
            ProductionVariant::Serverless { .. } => None,
        }
    }
}

/// Request to create a versioned serving configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateEndpointConfigRequest {
    pub name: String,
    pub variants: Vec<ProductionVariant>,
    pub tags: Vec<Tag>,
}

/// Immutable binding of a model to serving resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub arn: String,
    pub variants: Vec<ProductionVariant>,
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
}

/// Live serving resource with a stable name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub arn: String,
    pub config_name: String,
    pub endpoint_type: EndpointType,
    pub instance_type: Option<String>,
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
}

/// Named parameter of a pipeline start call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineParameter {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl PipelineParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Started pipeline execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineExecution {
    pub arn: String,
    pub pipeline_name: String,
    pub parameters: Vec<PipelineParameter>,
    pub started_at: DateTime<Utc>,
}

/// Request to materialize a deployable model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateModelRequest {
    pub model_name: String,
    pub artifact_uri: StorageUri,
    pub tags: Vec<Tag>,
}

/// Reports attached to a registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub model_statistics_uri: StorageUri,
    pub explainability_uri: StorageUri,
    pub content_type: String,
}

/// Request to add a model version to a package group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateModelPackageRequest {
    pub group_name: String,
    pub model_name: String,
    pub approval_status: String,
    pub content_types: Vec<String>,
    pub response_types: Vec<String>,
    pub inference_instances: Vec<String>,
    pub transform_instances: Vec<String>,
    pub metrics: ModelMetrics,
}

/// Versioned entry in the model registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPackage {
    pub arn: String,
    pub group_name: String,
    pub version: u32,
    pub model_name: String,
    pub approval_status: String,
    #[serde(default)]
    pub content_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    #[serde(default)]
    pub inference_instances: Vec<String>,
    #[serde(default)]
    pub transform_instances: Vec<String>,
    pub metrics: ModelMetrics,
    pub created_at: DateTime<Utc>,
}

/// Status-and-body reply of an event handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_uri_parse_and_display() {
        let uri: StorageUri = "s3://bucket/data/features.csv".parse().unwrap();
        assert_eq!(uri.bucket, "bucket");
        assert_eq!(uri.key, "data/features.csv");
        assert_eq!(uri.file_name(), "features.csv");
        assert_eq!(uri.to_string(), "s3://bucket/data/features.csv");
    }

    #[test]
    fn test_storage_uri_join() {
        let root = StorageUri::new("bucket", "AutoML/v1");
        assert_eq!(
            root.join("training").to_string(),
            "s3://bucket/AutoML/v1/training"
        );
        let empty = StorageUri::new("bucket", "");
        assert_eq!(empty.join("x.csv").to_string(), "s3://bucket/x.csv");
    }

    #[test]
    fn test_storage_uri_rejects_other_schemes() {
        assert!("https://bucket/key".parse::<StorageUri>().is_err());
        assert!("not a uri".parse::<StorageUri>().is_err());
        assert!("s3:///key".parse::<StorageUri>().is_err());
    }

    #[test]
    fn test_storage_uri_keeps_key_verbatim() {
        for key in [
            "uploads 2024/features.csv",
            "run#1/features.csv",
            "a?b/features.csv",
            "café/50%/features.csv",
        ] {
            let uri = StorageUri::new("bucket", key);
            let parsed: StorageUri = uri.to_string().parse().unwrap();
            assert_eq!(parsed, uri, "key {} changed", key);
        }
    }

    #[test]
    fn test_storage_uri_bucket_only() {
        let uri: StorageUri = "s3://bucket".parse().unwrap();
        assert_eq!(uri.bucket, "bucket");
        assert_eq!(uri.key, "");
    }

    #[test]
    fn test_storage_uri_serde_as_string() {
        let uri = StorageUri::new("b", "k/file.csv");
        let json = serde_json::to_string(&uri).unwrap();
        assert_eq!(json, "\"s3://b/k/file.csv\"");
        let back: StorageUri = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uri);
    }

    #[test]
    fn test_endpoint_type_parse() {
        assert_eq!("HOSTED".parse::<EndpointType>().unwrap(), EndpointType::Hosted);
        assert_eq!(
            "SERVERLESS".parse::<EndpointType>().unwrap(),
            EndpointType::Serverless
        );
        let err = "serverless".parse::<EndpointType>().unwrap_err();
        assert!(matches!(err, WorkflowError::Configuration(_)));
    }

    #[test]
    fn test_serverless_variant_has_fixed_capacity() {
        let variant = ProductionVariant::serverless("model-a");
        match variant {
            ProductionVariant::Serverless {
                memory_size_mb,
                max_concurrency,
                ref variant_name,
                ..
            } => {
                assert_eq!(memory_size_mb, 4096);
                assert_eq!(max_concurrency, 20);
                assert_eq!(variant_name, "AllTraffic");
            }
            _ => panic!("expected serverless variant"),
        }
        assert!(variant.instance_type().is_none());
    }

    #[test]
    fn test_hosted_variant_uses_single_instance() {
        let variant = ProductionVariant::hosted("model-a", "ml.m5.xlarge");
        assert_eq!(variant.instance_type(), Some("ml.m5.xlarge"));
        assert_eq!(variant.endpoint_type(), EndpointType::Hosted);
        if let ProductionVariant::Hosted {
            initial_instance_count,
            ..
        } = variant
        {
            assert_eq!(initial_instance_count, 1);
        }
    }

    #[test]
    fn test_invocation_response_wire_names() {
        let json = serde_json::to_value(InvocationResponse::ok("arn")).unwrap();
        assert_eq!(json, serde_json::json!({"statusCode": 200, "body": "arn"}));
    }

    #[test]
    fn test_pipeline_parameter_wire_names() {
        let param = PipelineParameter::new("DataFile", "features.csv");
        let json = serde_json::to_value(&param).unwrap();
        assert_eq!(json["Name"], "DataFile");
        assert_eq!(json["Value"], "features.csv");
    }
}
