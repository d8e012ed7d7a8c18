//! Run state machine
//!
//! `Preprocess -> Train -> CreateModel -> BatchInfer -> Evaluate ->
//! QualityGate -> {RegisterAndDeploy -> Succeeded | Failed}`. Each state
//! carries the artifacts later stages need, so a state can only be reached
//! with everything it consumes already produced.

use super::definition::QUALITY_FAILURE_MESSAGE;
use crate::error::{Result, WorkflowError};
use crate::models::{BestCandidate, ModelArtifact, SplitOutputs, StorageUri};
use serde::{Deserialize, Serialize};

/// Evaluation stage result as read back through the property file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub report_uri: StorageUri,
    pub score: f64,
}

/// Registry entry and endpoint left by a passing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub model_package_arn: String,
    pub model_package_version: u32,
    pub endpoint_config_arn: String,
    pub endpoint_arn: String,
}

/// Quality gate decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateDecision {
    Pass,
    Fail,
}

impl GateDecision {
    /// Pass iff `score >= threshold`
    pub fn decide(score: f64, threshold: f64) -> Self {
        if score >= threshold {
            GateDecision::Pass
        } else {
            GateDecision::Fail
        }
    }
}

/// What a stage produced
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Preprocessed(SplitOutputs),
    Trained(BestCandidate),
    ModelCreated(ModelArtifact),
    Inferred { predictions_uri: StorageUri },
    Evaluated(Evaluation),
    Gate(GateDecision),
    Promoted(Promotion),
}

impl StageOutcome {
    fn name(&self) -> &'static str {
        match self {
            StageOutcome::Preprocessed(_) => "Preprocessed",
            StageOutcome::Trained(_) => "Trained",
            StageOutcome::ModelCreated(_) => "ModelCreated",
            StageOutcome::Inferred { .. } => "Inferred",
            StageOutcome::Evaluated(_) => "Evaluated",
            StageOutcome::Gate(_) => "Gate",
            StageOutcome::Promoted(_) => "Promoted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum WorkflowState {
    Preprocess,
    Train {
        split: SplitOutputs,
    },
    CreateModel {
        split: SplitOutputs,
        candidate: BestCandidate,
    },
    BatchInfer {
        split: SplitOutputs,
        candidate: BestCandidate,
        model: ModelArtifact,
    },
    Evaluate {
        split: SplitOutputs,
        candidate: BestCandidate,
        model: ModelArtifact,
        predictions_uri: StorageUri,
    },
    QualityGate {
        candidate: BestCandidate,
        model: ModelArtifact,
        evaluation: Evaluation,
    },
    RegisterAndDeploy {
        candidate: BestCandidate,
        model: ModelArtifact,
        evaluation: Evaluation,
    },
    Succeeded {
        model: ModelArtifact,
        evaluation: Evaluation,
        promotion: Promotion,
    },
    Failed {
        message: String,
        evaluation: Evaluation,
    },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Preprocess => "Preprocess",
            WorkflowState::Train { .. } => "Train",
            WorkflowState::CreateModel { .. } => "CreateModel",
            WorkflowState::BatchInfer { .. } => "BatchInfer",
            WorkflowState::Evaluate { .. } => "Evaluate",
            WorkflowState::QualityGate { .. } => "QualityGate",
            WorkflowState::RegisterAndDeploy { .. } => "RegisterAndDeploy",
            WorkflowState::Succeeded { .. } => "Succeeded",
            WorkflowState::Failed { .. } => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Succeeded { .. } | WorkflowState::Failed { .. }
        )
    }

    /// Weighted F1 once the evaluation stage has run
    pub fn score(&self) -> Option<f64> {
        match self {
            WorkflowState::QualityGate { evaluation, .. }
            | WorkflowState::RegisterAndDeploy { evaluation, .. }
            | WorkflowState::Succeeded { evaluation, .. }
            | WorkflowState::Failed { evaluation, .. } => Some(evaluation.score),
            _ => None,
        }
    }

    /// Transition on a stage outcome
    ///
    /// An outcome produced by a stage other than the current one, or any
    /// outcome in a terminal state, is rejected.
    pub fn advance(self, outcome: StageOutcome) -> Result<WorkflowState> {
        use StageOutcome as O;
        use WorkflowState as S;

        let next = match (self, outcome) {
            (S::Preprocess, O::Preprocessed(split)) => S::Train { split },
            (S::Train { split }, O::Trained(candidate)) => S::CreateModel { split, candidate },
            (S::CreateModel { split, candidate }, O::ModelCreated(model)) => S::BatchInfer {
                split,
                candidate,
                model,
            },
            (
                S::BatchInfer {
                    split,
                    candidate,
                    model,
                },
                O::Inferred { predictions_uri },
            ) => S::Evaluate {
                split,
                candidate,
                model,
                predictions_uri,
            },
            (
                S::Evaluate {
                    candidate, model, ..
                },
                O::Evaluated(evaluation),
            ) => S::QualityGate {
                candidate,
                model,
                evaluation,
            },
            (
                S::QualityGate {
                    candidate,
                    model,
                    evaluation,
                },
                O::Gate(decision),
            ) => match decision {
                GateDecision::Pass => S::RegisterAndDeploy {
                    candidate,
                    model,
                    evaluation,
                },
                GateDecision::Fail => S::Failed {
                    message: QUALITY_FAILURE_MESSAGE.to_string(),
                    evaluation,
                },
            },
            (
                S::RegisterAndDeploy {
                    model, evaluation, ..
                },
                O::Promoted(promotion),
            ) => S::Succeeded {
                model,
                evaluation,
                promotion,
            },
            (state, outcome) => {
                return Err(WorkflowError::configuration(format!(
                    "Outcome {} does not apply to state {}",
                    outcome.name(),
                    state.name()
                )))
            }
        };
        Ok(next)
    }
}
