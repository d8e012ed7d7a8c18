//! Sequential pipeline runner
//!
//! Drives a [`WorkflowState`] through a [`StageExecutor`] one stage at a
//! time. A stage error ends the run; nothing is retried.

use super::definition::{OutputKind, WorkflowDefinition};
use super::parameters::PipelineParameters;
use super::state::{Evaluation, GateDecision, Promotion, StageOutcome, WorkflowState};
use crate::control_plane::async_trait;
use crate::error::{Result, WorkflowError};
use crate::models::{
    BestCandidate, Dataset, ModelArtifact, PipelineParameter, SplitOutputs, StorageUri,
};
use crate::observability::{StructuredLogger, WorkflowMetrics};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// Everything a stage may read about the run
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub definition: &'a WorkflowDefinition,
    pub parameters: &'a PipelineParameters,
}

impl StageContext<'_> {
    /// Output location of this run for `kind`
    pub fn output_uri(&self, kind: OutputKind) -> StorageUri {
        self.definition
            .output_uri(&self.parameters.execution_version, kind)
    }

    /// Dataset this run consumes
    pub fn dataset(&self) -> Dataset {
        Dataset::new(
            self.parameters.data_uri.clone(),
            &self.parameters.data_file,
            &self.definition.target_attribute,
        )
    }
}

/// Work behind each stage of the pipeline
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn preprocess(&self, ctx: StageContext<'_>) -> Result<SplitOutputs>;

    async fn train(&self, ctx: StageContext<'_>, split: &SplitOutputs) -> Result<BestCandidate>;

    async fn create_model(
        &self,
        ctx: StageContext<'_>,
        candidate: &BestCandidate,
    ) -> Result<ModelArtifact>;

    /// Returns the location of the predictions file
    async fn batch_infer(
        &self,
        ctx: StageContext<'_>,
        model: &ModelArtifact,
        split: &SplitOutputs,
    ) -> Result<StorageUri>;

    async fn evaluate(
        &self,
        ctx: StageContext<'_>,
        predictions_uri: &StorageUri,
        split: &SplitOutputs,
    ) -> Result<Evaluation>;

    /// Register the model and swap it under the endpoint
    async fn register_and_deploy(
        &self,
        ctx: StageContext<'_>,
        candidate: &BestCandidate,
        model: &ModelArtifact,
    ) -> Result<Promotion>;
}

/// Timing of one completed stage
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: &'static str,
    pub duration_secs: f64,
}

/// Final state of a run and the stages it went through
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub execution_version: String,
    pub final_state: WorkflowState,
    pub stages: Vec<StageRecord>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.final_state, WorkflowState::Succeeded { .. })
    }
}

/// Runs one pipeline definition against a stage executor
pub struct PipelineRunner<E> {
    definition: WorkflowDefinition,
    executor: E,
    logger: StructuredLogger,
    metrics: WorkflowMetrics,
}

impl<E: StageExecutor> PipelineRunner<E> {
    pub fn new(definition: WorkflowDefinition, executor: E) -> Self {
        let logger = StructuredLogger::new(&definition.workload_name);
        Self {
            definition,
            executor,
            logger,
            metrics: WorkflowMetrics::new(),
        }
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run to a terminal state with the given start-call parameters
    pub async fn run(&self, overrides: &[PipelineParameter]) -> Result<RunReport> {
        let parameters = self.definition.parameters(overrides)?;
        let ctx = StageContext {
            definition: &self.definition,
            parameters: &parameters,
        };
        info!(
            pipeline = %self.definition.pipeline_name,
            execution_version = %parameters.execution_version,
            data_uri = %parameters.data_uri,
            "Starting pipeline run"
        );

        let mut state = WorkflowState::Preprocess;
        let mut stages = Vec::new();
        while !state.is_terminal() {
            let stage = state.name();
            let start = Instant::now();
            let outcome = match self.step(ctx, &state).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.metrics.inc_stage_failures(stage);
                    self.logger
                        .log_stage_failed(stage, e.kind(), &e.to_string());
                    return Err(e);
                }
            };
            let duration_secs = start.elapsed().as_secs_f64();
            self.metrics.observe_stage_duration(stage, duration_secs);
            self.logger.log_stage_completed(stage, duration_secs);
            stages.push(StageRecord {
                stage,
                duration_secs,
            });

            state = state.advance(outcome)?;
        }

        info!(
            pipeline = %self.definition.pipeline_name,
            final_state = state.name(),
            "Pipeline run finished"
        );
        Ok(RunReport {
            execution_version: parameters.execution_version.clone(),
            final_state: state,
            stages,
        })
    }

    async fn step(&self, ctx: StageContext<'_>, state: &WorkflowState) -> Result<StageOutcome> {
        let outcome = match state {
            WorkflowState::Preprocess => {
                StageOutcome::Preprocessed(self.executor.preprocess(ctx).await?)
            }
            WorkflowState::Train { split } => {
                StageOutcome::Trained(self.executor.train(ctx, split).await?)
            }
            WorkflowState::CreateModel { candidate, .. } => {
                StageOutcome::ModelCreated(self.executor.create_model(ctx, candidate).await?)
            }
            WorkflowState::BatchInfer { split, model, .. } => StageOutcome::Inferred {
                predictions_uri: self.executor.batch_infer(ctx, model, split).await?,
            },
            WorkflowState::Evaluate {
                split,
                predictions_uri,
                ..
            } => StageOutcome::Evaluated(self.executor.evaluate(ctx, predictions_uri, split).await?),
            WorkflowState::QualityGate { evaluation, .. } => {
                let threshold = ctx.parameters.metric_threshold;
                let decision = GateDecision::decide(evaluation.score, threshold);
                self.metrics
                    .record_quality_gate(decision == GateDecision::Pass);
                self.logger.log_quality_gate(evaluation.score, threshold);
                StageOutcome::Gate(decision)
            }
            WorkflowState::RegisterAndDeploy {
                candidate, model, ..
            } => StageOutcome::Promoted(
                self.executor
                    .register_and_deploy(ctx, candidate, model)
                    .await?,
            ),
            WorkflowState::Succeeded { .. } | WorkflowState::Failed { .. } => {
                return Err(WorkflowError::configuration(format!(
                    "Run already finished in state {}",
                    state.name()
                )))
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkloadConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Executor returning canned artifacts and a fixed score
    struct ScriptedExecutor {
        score: f64,
        fail_training: bool,
        promotions: AtomicUsize,
    }

    impl ScriptedExecutor {
        fn scoring(score: f64) -> Self {
            Self {
                score,
                fail_training: false,
                promotions: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StageExecutor for ScriptedExecutor {
        async fn preprocess(&self, ctx: StageContext<'_>) -> Result<SplitOutputs> {
            Ok(SplitOutputs {
                training_uri: ctx.output_uri(OutputKind::Training),
                testing_uri: ctx.output_uri(OutputKind::Testing),
            })
        }

        async fn train(&self, ctx: StageContext<'_>, _split: &SplitOutputs) -> Result<BestCandidate> {
            if self.fail_training {
                return Err(WorkflowError::upstream("CreateAutoMLJob", "capacity"));
            }
            let out = ctx.output_uri(OutputKind::AutoMl);
            Ok(BestCandidate {
                candidate_name: "best".to_string(),
                model_artifact_uri: out.join("model.json"),
                model_insights_report_uri: out.join("insights.json"),
                explainability_report_uri: out.join("explainability.json"),
            })
        }

        async fn create_model(
            &self,
            _ctx: StageContext<'_>,
            candidate: &BestCandidate,
        ) -> Result<ModelArtifact> {
            Ok(ModelArtifact {
                model_name: candidate.candidate_name.clone(),
                model_arn: "arn:model/best".to_string(),
                artifact_uri: candidate.model_artifact_uri.clone(),
            })
        }

        async fn batch_infer(
            &self,
            ctx: StageContext<'_>,
            _model: &ModelArtifact,
            _split: &SplitOutputs,
        ) -> Result<StorageUri> {
            Ok(ctx.output_uri(OutputKind::Transform).join("x_test.csv.out"))
        }

        async fn evaluate(
            &self,
            ctx: StageContext<'_>,
            _predictions_uri: &StorageUri,
            _split: &SplitOutputs,
        ) -> Result<Evaluation> {
            Ok(Evaluation {
                report_uri: ctx.output_uri(OutputKind::Evaluation),
                score: self.score,
            })
        }

        async fn register_and_deploy(
            &self,
            _ctx: StageContext<'_>,
            _candidate: &BestCandidate,
            _model: &ModelArtifact,
        ) -> Result<Promotion> {
            self.promotions.fetch_add(1, Ordering::SeqCst);
            Ok(Promotion {
                model_package_arn: "arn:pkg/1".to_string(),
                model_package_version: 1,
                endpoint_config_arn: "arn:cfg".to_string(),
                endpoint_arn: "arn:ep".to_string(),
            })
        }
    }

    fn runner(executor: ScriptedExecutor) -> PipelineRunner<ScriptedExecutor> {
        let definition = WorkflowDefinition::from_config(&WorkloadConfig::default());
        PipelineRunner::new(definition, executor)
    }

    #[test]
    fn test_context_dataset_follows_trigger_parameters() {
        let definition = WorkflowDefinition::from_config(&WorkloadConfig::default());
        let parameters = definition
            .parameters(&[
                PipelineParameter::new("DataUri", "s3://bucket/uploads 2024/run#1/features.csv"),
                PipelineParameter::new("DataFile", "features.csv"),
            ])
            .unwrap();
        let ctx = StageContext {
            definition: &definition,
            parameters: &parameters,
        };

        let dataset = ctx.dataset();
        assert_eq!(dataset.location.key, "uploads 2024/run#1/features.csv");
        assert_eq!(dataset.file_name, "features.csv");
        assert_eq!(dataset.target_attribute, "target");
    }

    #[tokio::test]
    async fn test_passing_run_promotes_once() {
        let runner = runner(ScriptedExecutor::scoring(0.9));
        let report = runner.run(&[]).await.unwrap();

        assert!(report.succeeded());
        assert_eq!(report.stages.len(), 7);
        assert_eq!(report.stages[0].stage, "Preprocess");
        assert_eq!(runner.executor().promotions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_gate_never_promotes() {
        let runner = runner(ScriptedExecutor::scoring(0.5));
        let report = runner.run(&[]).await.unwrap();

        assert!(!report.succeeded());
        assert_eq!(report.final_state.name(), "Failed");
        assert_eq!(runner.executor().promotions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_threshold_parameter_controls_gate() {
        let runner = runner(ScriptedExecutor::scoring(0.5));
        let report = runner
            .run(&[PipelineParameter::new(
                "ModelRegistrationMetricThreshold",
                "0.5",
            )])
            .await
            .unwrap();
        assert!(report.succeeded());
    }

    #[tokio::test]
    async fn test_stage_error_stops_run() {
        let runner = runner(ScriptedExecutor {
            fail_training: true,
            ..ScriptedExecutor::scoring(0.9)
        });
        let err = runner.run(&[]).await.unwrap_err();
        assert_eq!(err.to_string(), "CreateAutoMLJob failed: capacity");
        assert_eq!(runner.executor().promotions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_outputs_namespaced_by_execution_version() {
        let runner = runner(ScriptedExecutor::scoring(0.9));
        let report = runner
            .run(&[PipelineParameter::new("ExecutionVersion", "abc123")])
            .await
            .unwrap();
        assert_eq!(report.execution_version, "abc123");
        match report.final_state {
            WorkflowState::Succeeded { evaluation, .. } => {
                assert_eq!(evaluation.report_uri.key, "AutoML/abc123/evaluation");
            }
            other => panic!("unexpected state {}", other.name()),
        }
    }
}
