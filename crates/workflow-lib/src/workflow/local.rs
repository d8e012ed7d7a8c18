//! Stage executor backed by a local directory
//!
//! `{storage_root}/{bucket}/{key}` stands in for `s3://{bucket}/{key}`, so
//! every stage reads and writes exactly the layout the managed pipeline
//! would. Control-plane calls go through a [`ControlPlane`].
//! [`LocalModelServer`] answers endpoint invocations from the same store.

use super::backend::{AutoMlBackend, TrainingJob};
use super::definition::{OutputKind, AUTOML_MODE};
use super::runner::{StageContext, StageExecutor};
use super::state::{Evaluation, Promotion};
use crate::control_plane::{async_trait, ControlPlane, ModelServer, Operation};
use crate::endpoint::{EndpointUpsertEvent, EndpointUpsertHandler};
use crate::error::{Result, WorkflowError};
use crate::evaluation::{EvaluationJob, QualityReport, EVALUATION_REPORT_FILE, WEIGHTED_F1_PATH};
use crate::models::{
    BestCandidate, CreateModelPackageRequest, CreateModelRequest, ModelArtifact, ModelMetrics,
    SplitOutputs, StorageUri, Tag,
};
use crate::preprocess::{ProcessingJob, TEST_FEATURES_FILE};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Content type of training, inference and prediction payloads
const CSV_CONTENT_TYPE: &str = "text/csv";

/// Content type of the attached model reports
const REPORT_CONTENT_TYPE: &str = "application/json";

pub struct LocalStageExecutor<B> {
    storage_root: PathBuf,
    backend: B,
    control_plane: Arc<dyn ControlPlane>,
    endpoint_handler: EndpointUpsertHandler,
    split_seed: Option<u64>,
}

impl<B: AutoMlBackend> LocalStageExecutor<B> {
    pub fn new(
        storage_root: impl Into<PathBuf>,
        backend: B,
        control_plane: Arc<dyn ControlPlane>,
    ) -> Self {
        Self {
            storage_root: storage_root.into(),
            backend,
            endpoint_handler: EndpointUpsertHandler::new(control_plane.clone()),
            control_plane,
            split_seed: None,
        }
    }

    /// Make the preprocessing split reproducible
    pub fn with_split_seed(mut self, seed: Option<u64>) -> Self {
        self.split_seed = seed;
        self
    }

    /// Local file backing `uri`
    pub fn local_path(&self, uri: &StorageUri) -> PathBuf {
        store_path(&self.storage_root, uri)
    }

    /// Copy a local file into the store, as an upload would
    pub fn upload(&self, source: &Path, uri: &StorageUri) -> Result<PathBuf> {
        let dest = self.local_path(uri);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, &dest)?;
        Ok(dest)
    }
}

fn store_path(storage_root: &Path, uri: &StorageUri) -> PathBuf {
    storage_root.join(&uri.bucket).join(&uri.key)
}

/// Serves endpoint predictions from model files in a local store
pub struct LocalModelServer<B> {
    storage_root: PathBuf,
    backend: B,
}

impl<B: AutoMlBackend> LocalModelServer<B> {
    pub fn new(storage_root: impl Into<PathBuf>, backend: B) -> Self {
        Self {
            storage_root: storage_root.into(),
            backend,
        }
    }
}

#[async_trait]
impl<B: AutoMlBackend> ModelServer for LocalModelServer<B> {
    async fn predict(
        &self,
        model: &ModelArtifact,
        content_type: &str,
        payload: &str,
    ) -> Result<String> {
        if content_type != CSV_CONTENT_TYPE {
            return Err(WorkflowError::upstream(
                Operation::InvokeEndpoint.as_str(),
                format!(
                    "Model {} accepts {}, not {}",
                    model.model_name, CSV_CONTENT_TYPE, content_type
                ),
            ));
        }
        self.backend
            .predict(&store_path(&self.storage_root, &model.artifact_uri), payload)
            .await
    }
}

#[async_trait]
impl<B: AutoMlBackend> StageExecutor for LocalStageExecutor<B> {
    async fn preprocess(&self, ctx: StageContext<'_>) -> Result<SplitOutputs> {
        let dataset = ctx.dataset();
        let data_path = self.local_path(&dataset.location);
        let input_root = data_path.parent().ok_or_else(|| {
            WorkflowError::configuration(format!(
                "Data location {} has no parent",
                dataset.location
            ))
        })?;

        let split = SplitOutputs {
            training_uri: ctx.output_uri(OutputKind::Training),
            testing_uri: ctx.output_uri(OutputKind::Testing),
        };
        // Both outputs share the run prefix; the job appends training/ and testing/
        let training_dir = self.local_path(&split.training_uri);
        let output_root = training_dir.parent().unwrap_or(self.storage_root.as_path());

        ProcessingJob::with_roots(dataset.target_attribute, input_root, output_root)
            .with_seed(self.split_seed)
            .run(&dataset.file_name)?;
        Ok(split)
    }

    async fn train(&self, ctx: StageContext<'_>, split: &SplitOutputs) -> Result<BestCandidate> {
        let output_uri = ctx.output_uri(OutputKind::AutoMl);
        let job = TrainingJob {
            training_file: self.local_path(&split.training_file()),
            target_attribute: ctx.definition.target_attribute.clone(),
            output_dir: self.local_path(&output_uri),
            mode: AUTOML_MODE.to_string(),
            max_runtime_secs: ctx.parameters.max_automl_runtime,
        };
        let trained = self.backend.fit(&job).await?;
        info!(candidate = %trained.candidate_name, "AutoML job selected best candidate");

        Ok(BestCandidate {
            candidate_name: trained.candidate_name,
            model_artifact_uri: output_uri.join(&trained.model_file),
            model_insights_report_uri: output_uri.join(&trained.model_insights_file),
            explainability_report_uri: output_uri.join(&trained.explainability_file),
        })
    }

    async fn create_model(
        &self,
        ctx: StageContext<'_>,
        candidate: &BestCandidate,
    ) -> Result<ModelArtifact> {
        let request = CreateModelRequest {
            model_name: format!(
                "{}-{}-{}",
                ctx.definition.workload_name,
                candidate.candidate_name,
                ctx.parameters.execution_version
            ),
            artifact_uri: candidate.model_artifact_uri.clone(),
            tags: vec![Tag::workload(&ctx.definition.workload_name)],
        };
        self.control_plane.create_model(request).await
    }

    async fn batch_infer(
        &self,
        ctx: StageContext<'_>,
        model: &ModelArtifact,
        split: &SplitOutputs,
    ) -> Result<StorageUri> {
        // The transform job names its output after the input file
        let predictions_uri = ctx
            .output_uri(OutputKind::Transform)
            .join(&format!("{}.out", TEST_FEATURES_FILE));
        let rows = self
            .backend
            .transform(
                &self.local_path(&model.artifact_uri),
                &self.local_path(&split.test_features()),
                &self.local_path(&predictions_uri),
            )
            .await?;
        info!(rows = rows, content_type = CSV_CONTENT_TYPE, "Batch inference finished");
        Ok(predictions_uri)
    }

    async fn evaluate(
        &self,
        ctx: StageContext<'_>,
        predictions_uri: &StorageUri,
        split: &SplitOutputs,
    ) -> Result<Evaluation> {
        let evaluation_uri = ctx.output_uri(OutputKind::Evaluation);
        let job = EvaluationJob::new(
            self.local_path(predictions_uri),
            self.local_path(&split.test_labels()),
            self.local_path(&evaluation_uri),
        );
        job.run()?;

        // The gate reads the persisted report, not the in-memory result
        let report_uri = evaluation_uri.join(EVALUATION_REPORT_FILE);
        let score = QualityReport::read_from(&self.local_path(&report_uri))?
            .property(WEIGHTED_F1_PATH)?;
        Ok(Evaluation { report_uri, score })
    }

    async fn register_and_deploy(
        &self,
        ctx: StageContext<'_>,
        candidate: &BestCandidate,
        model: &ModelArtifact,
    ) -> Result<Promotion> {
        let instance_type = ctx.parameters.instance_type.clone();
        let package = self
            .control_plane
            .create_model_package(CreateModelPackageRequest {
                group_name: ctx.definition.model_package_group.clone(),
                model_name: model.model_name.clone(),
                approval_status: ctx.parameters.model_approval_status.clone(),
                content_types: vec![CSV_CONTENT_TYPE.to_string()],
                response_types: vec![CSV_CONTENT_TYPE.to_string()],
                inference_instances: vec![instance_type.clone()],
                transform_instances: vec![instance_type.clone()],
                metrics: ModelMetrics {
                    model_statistics_uri: candidate.model_insights_report_uri.clone(),
                    explainability_uri: candidate.explainability_report_uri.clone(),
                    content_type: REPORT_CONTENT_TYPE.to_string(),
                },
            })
            .await?;
        info!(
            model_package_arn = %package.arn,
            version = package.version,
            "Registered model package"
        );

        let outcome = self
            .endpoint_handler
            .upsert(&EndpointUpsertEvent {
                model_name: model.model_name.clone(),
                workload_name: ctx.definition.workload_name.clone(),
                instance_type,
                endpoint_type: ctx.definition.endpoint_type.to_string(),
            })
            .await?;

        Ok(Promotion {
            model_package_arn: package.arn,
            model_package_version: package.version,
            endpoint_config_arn: outcome.endpoint_config.arn,
            endpoint_arn: outcome.endpoint.arn,
        })
    }
}
