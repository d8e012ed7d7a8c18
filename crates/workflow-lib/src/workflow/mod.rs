//! Training workflow
//!
//! The pipeline is a fixed chain with one data-dependent branch. Its shape
//! lives in [`WorkflowDefinition`], its execution semantics in the
//! [`WorkflowState`] transition function, and [`PipelineRunner`] drives the
//! two through any [`StageExecutor`].

mod backend;
mod definition;
mod local;
pub mod parameters;
mod runner;
mod state;

pub use backend::{AutoMlBackend, MajorityClassBackend, TrainedCandidate, TrainingJob};
pub use definition::{
    OutputKind, WorkflowDefinition, AUTOML_MODE, DEPLOYMENT_STEP, EVALUATION_PROPERTY_FILE,
    EVALUATION_STEP, FAILURE_STEP, INFERENCE_STEP, MODEL_CREATION_STEP, PREPROCESSING_STEP,
    QUALITY_CONDITION_STEP, QUALITY_FAILURE_MESSAGE, REGISTRATION_STEP, TRAINING_STEP,
};
pub use local::{LocalModelServer, LocalStageExecutor};
pub use parameters::PipelineParameters;
pub use runner::{PipelineRunner, RunReport, StageContext, StageExecutor, StageRecord};
pub use state::{Evaluation, GateDecision, Promotion, StageOutcome, WorkflowState};
