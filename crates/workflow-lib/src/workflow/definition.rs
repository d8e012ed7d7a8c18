//! Static shape of the training pipeline
//!
//! Names, output layout and the JSON rendering handed to an orchestration
//! engine. Execution semantics live in [`super::WorkflowState`].

use super::parameters::{self, PipelineParameters};
use crate::config::WorkloadConfig;
use crate::error::Result;
use crate::evaluation::{EVALUATION_REPORT_FILE, WEIGHTED_F1_PATH};
use crate::models::{EndpointType, PipelineParameter, StorageUri};
use serde_json::{json, Value};
use std::fmt;

pub const PREPROCESSING_STEP: &str = "DataPreprocessingStep";
pub const TRAINING_STEP: &str = "AutoMLTrainingStep";
pub const MODEL_CREATION_STEP: &str = "ModelCreationStep";
pub const INFERENCE_STEP: &str = "InferenceTestingStep";
pub const EVALUATION_STEP: &str = "ModelEvaluationStep";
pub const QUALITY_CONDITION_STEP: &str = "ModelQualityCondition";
pub const REGISTRATION_STEP: &str = "ModelRegistrationStep";
pub const DEPLOYMENT_STEP: &str = "ModelDeploymentStep";
pub const FAILURE_STEP: &str = "ModelEvaluationFailure";

/// Terminal message of a run whose model misses the threshold
pub const QUALITY_FAILURE_MESSAGE: &str =
    "Pipeline execution failure: Model Quality (F1 Score) is less than the specified Evaluation Threshold";

/// Property file the quality condition reads
pub const EVALUATION_PROPERTY_FILE: &str = "EvaluationReport";

/// The only AutoML mode the native training step supports
pub const AUTOML_MODE: &str = "ENSEMBLING";

/// Output folders under `{workload}/{ExecutionVersion}/`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Training,
    Testing,
    AutoMl,
    Transform,
    Evaluation,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Training => "training",
            OutputKind::Testing => "testing",
            OutputKind::AutoMl => "automl",
            OutputKind::Transform => "transform",
            OutputKind::Evaluation => "evaluation",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-shape pipeline of one workload
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    pub workload_name: String,
    pub pipeline_name: String,
    pub bucket: String,
    pub model_package_group: String,
    pub target_attribute: String,
    pub endpoint_type: EndpointType,
    defaults: PipelineParameters,
}

impl WorkflowDefinition {
    pub fn from_config(config: &WorkloadConfig) -> Self {
        Self {
            workload_name: config.workload_name.clone(),
            pipeline_name: config.pipeline_name(),
            bucket: config.bucket_name(),
            model_package_group: config.model_package_group(),
            target_attribute: config.target_attribute.clone(),
            endpoint_type: config.endpoint_type,
            defaults: PipelineParameters::defaults(config),
        }
    }

    pub fn default_parameters(&self) -> &PipelineParameters {
        &self.defaults
    }

    /// Parameters of a run started with `overrides`
    pub fn parameters(&self, overrides: &[PipelineParameter]) -> Result<PipelineParameters> {
        self.defaults.clone().with_overrides(overrides)
    }

    /// `s3://{bucket}/{workload}/{execution_version}/{kind}`
    pub fn output_uri(&self, execution_version: &str, kind: OutputKind) -> StorageUri {
        StorageUri::new(&self.bucket, &self.workload_name)
            .join(execution_version)
            .join(kind.as_str())
    }

    /// JSON rendering of parameters and steps
    pub fn definition(&self) -> Value {
        let version = json!({"Get": format!("Parameters.{}", parameters::EXECUTION_VERSION)});
        let output = |kind: OutputKind| {
            json!({
                "Std:Join": {
                    "On": "/",
                    "Values": ["s3:/", self.bucket, self.workload_name, version, kind.as_str()]
                }
            })
        };
        let instance_type = json!({"Get": format!("Parameters.{}", parameters::INSTANCE_TYPE)});

        json!({
            "Version": "2020-12-01",
            "Name": self.pipeline_name,
            "Parameters": self.parameter_declarations(),
            "PropertyFiles": [{
                "PropertyFileName": EVALUATION_PROPERTY_FILE,
                "OutputName": "evaluation_metrics",
                "FilePath": EVALUATION_REPORT_FILE
            }],
            "Steps": [
                {
                    "Name": PREPROCESSING_STEP,
                    "Type": "Processing",
                    "Arguments": {
                        "Environment": {"TARGET_ATTRIBUTE": self.target_attribute},
                        "ContainerArguments": [
                            "--input-file",
                            {"Get": format!("Parameters.{}", parameters::DATA_FILE)}
                        ],
                        "Outputs": {
                            "training": output(OutputKind::Training),
                            "testing": output(OutputKind::Testing)
                        }
                    }
                },
                {
                    "Name": TRAINING_STEP,
                    "Type": "AutoML",
                    "DependsOn": [PREPROCESSING_STEP],
                    "Arguments": {
                        "Mode": AUTOML_MODE,
                        "TargetAttributeName": self.target_attribute,
                        "MaxRuntimeSeconds": {"Get": format!("Parameters.{}", parameters::MAX_AUTOML_RUNTIME)}
                    }
                },
                {
                    "Name": MODEL_CREATION_STEP,
                    "Type": "Model",
                    "DependsOn": [TRAINING_STEP]
                },
                {
                    "Name": INFERENCE_STEP,
                    "Type": "Transform",
                    "DependsOn": [MODEL_CREATION_STEP],
                    "Arguments": {
                        "ContentType": "text/csv",
                        "InstanceType": instance_type,
                        "Output": output(OutputKind::Transform)
                    }
                },
                {
                    "Name": EVALUATION_STEP,
                    "Type": "Processing",
                    "DependsOn": [INFERENCE_STEP],
                    "PropertyFiles": [EVALUATION_PROPERTY_FILE],
                    "Arguments": {"Output": output(OutputKind::Evaluation)}
                },
                {
                    "Name": QUALITY_CONDITION_STEP,
                    "Type": "Condition",
                    "DependsOn": [EVALUATION_STEP],
                    "Arguments": {
                        "Conditions": [{
                            "Type": "GreaterThanOrEqualTo",
                            "LeftValue": {
                                "Std:JsonGet": {
                                    "PropertyFile": EVALUATION_PROPERTY_FILE,
                                    "Path": WEIGHTED_F1_PATH
                                }
                            },
                            "RightValue": {"Get": format!("Parameters.{}", parameters::METRIC_THRESHOLD)}
                        }],
                        "IfSteps": [
                            {
                                "Name": REGISTRATION_STEP,
                                "Type": "RegisterModel",
                                "Arguments": {
                                    "ModelPackageGroupName": self.model_package_group,
                                    "ModelApprovalStatus": {"Get": format!("Parameters.{}", parameters::MODEL_APPROVAL_STATUS)},
                                    "ContentTypes": ["text/csv"],
                                    "ResponseTypes": ["text/csv"]
                                }
                            },
                            {
                                "Name": DEPLOYMENT_STEP,
                                "Type": "Lambda",
                                "Arguments": {
                                    "WORKLOAD_NAME": self.workload_name,
                                    "INSTANCE_TYPE": instance_type,
                                    "ENDPOINT_TYPE": self.endpoint_type.to_string()
                                }
                            }
                        ],
                        "ElseSteps": [{
                            "Name": FAILURE_STEP,
                            "Type": "Fail",
                            "Arguments": {"ErrorMessage": QUALITY_FAILURE_MESSAGE}
                        }]
                    }
                }
            ]
        })
    }

    fn parameter_declarations(&self) -> Vec<Value> {
        self.defaults
            .to_parameters()
            .into_iter()
            .map(|p| {
                let kind = match p.name.as_str() {
                    parameters::INSTANCE_COUNT | parameters::MAX_AUTOML_RUNTIME => "Integer",
                    parameters::METRIC_THRESHOLD => "Float",
                    _ => "String",
                };
                json!({"Name": p.name, "Type": kind, "DefaultValue": p.value})
            })
            .collect()
    }
}
