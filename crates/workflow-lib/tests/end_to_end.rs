//! Upload-to-endpoint runs against a local store and an in-memory control plane

use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use workflow_lib::workflow::{
    LocalModelServer, LocalStageExecutor, MajorityClassBackend, PipelineRunner, WorkflowDefinition, WorkflowState,
    QUALITY_FAILURE_MESSAGE,
};
use workflow_lib::{
    ControlPlane, InMemoryControlPlane, StorageNotification, StorageUri, TriggerHandler,
    WorkloadConfig,
};

struct Harness {
    _dir: TempDir,
    config: WorkloadConfig,
    control_plane: Arc<InMemoryControlPlane>,
    runner: PipelineRunner<LocalStageExecutor<MajorityClassBackend>>,
}

async fn harness(rows: &[(&str, u32)]) -> Harness {
    let dir = TempDir::new().unwrap();
    let config = WorkloadConfig {
        split_seed: Some(11),
        ..Default::default()
    };
    let store = dir.path().join("store");
    let control_plane = Arc::new(
        InMemoryControlPlane::default()
            .with_model_server(Arc::new(LocalModelServer::new(&store, MajorityClassBackend))),
    );
    control_plane.register_pipeline(&config.pipeline_name()).await;

    let executor = LocalStageExecutor::new(
        store,
        MajorityClassBackend,
        control_plane.clone(),
    )
    .with_split_seed(config.split_seed);

    let mut csv = String::from("target,age,income\n");
    let mut i = 0;
    for (label, count) in rows {
        for _ in 0..*count {
            csv.push_str(&format!("{},{},{}\n", label, 20 + i % 40, 1000 * i));
            i += 1;
        }
    }
    let source = dir.path().join("features.csv");
    fs::write(&source, csv).unwrap();
    executor
        .upload(&source, &config.default_data_uri())
        .unwrap();

    let runner = PipelineRunner::new(WorkflowDefinition::from_config(&config), executor);
    Harness {
        _dir: dir,
        config,
        control_plane,
        runner,
    }
}

/// Trigger on the upload, then run with the execution's parameters
async fn trigger_and_run(harness: &Harness) -> workflow_lib::workflow::RunReport {
    trigger_and_run_at(harness, &harness.config.default_data_uri()).await
}

async fn trigger_and_run_at(
    harness: &Harness,
    data_uri: &StorageUri,
) -> workflow_lib::workflow::RunReport {
    let trigger = TriggerHandler::new(
        harness.control_plane.clone(),
        &harness.config.workload_name,
        harness.config.pipeline_name(),
    );
    let execution = trigger
        .start(&StorageNotification::object_created(
            &data_uri.bucket,
            &data_uri.key,
            "v42",
        ))
        .await
        .unwrap();

    harness.runner.run(&execution.parameters).await.unwrap()
}

#[tokio::test]
async fn test_passing_run_registers_and_deploys() {
    let harness = harness(&[("churn", 50)]).await;

    let report = trigger_and_run(&harness).await;
    assert!(report.succeeded());
    assert_eq!(report.execution_version, "v42");
    assert_eq!(report.stages.len(), 7);

    let WorkflowState::Succeeded {
        evaluation,
        promotion,
        ..
    } = &report.final_state
    else {
        panic!("expected success, got {}", report.final_state.name());
    };
    assert_eq!(evaluation.score, 1.0);
    assert_eq!(
        evaluation.report_uri,
        StorageUri::new(
            harness.config.bucket_name(),
            "AutoML/v42/evaluation/evaluation_metrics.json"
        )
    );
    assert_eq!(promotion.model_package_version, 1);

    let packages = harness.control_plane.model_packages().await;
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].group_name, harness.config.model_package_group());
    assert_eq!(packages[0].approval_status, "Approved");
    assert_eq!(packages[0].content_types, vec!["text/csv".to_string()]);
    assert_eq!(packages[0].inference_instances, vec!["ml.m5.xlarge".to_string()]);
    assert_eq!(packages[0].metrics.content_type, "application/json");

    let endpoint = harness
        .control_plane
        .describe_endpoint("AutoML-Endpoint")
        .await
        .unwrap();
    assert_eq!(endpoint.arn, promotion.endpoint_arn);
    assert_eq!(endpoint.config_name.len(), "AutoML-MM-DD-hh-mm-ss".len());

    let predictions = harness
        .control_plane
        .invoke_endpoint("AutoML-Endpoint", "text/csv", "31,5000\n45,,")
        .await
        .unwrap();
    assert_eq!(predictions, "churn\nchurn");
}

#[tokio::test]
async fn test_failing_run_stops_before_registration() {
    // Majority-class predictions on a balanced dataset cannot reach 0.75
    let harness = harness(&[("stay", 50), ("leave", 50)]).await;

    let report = trigger_and_run(&harness).await;
    assert!(!report.succeeded());

    let WorkflowState::Failed {
        message,
        evaluation,
    } = &report.final_state
    else {
        panic!("expected failure, got {}", report.final_state.name());
    };
    assert_eq!(message, QUALITY_FAILURE_MESSAGE);
    assert!(evaluation.score < 0.75);

    // Six stages ran; the gate stopped the run
    assert_eq!(report.stages.len(), 6);
    assert!(harness.control_plane.model_packages().await.is_empty());
    assert!(harness.control_plane.endpoints().await.is_empty());
    assert_eq!(harness.control_plane.models().await.len(), 1);
}

#[tokio::test]
async fn test_upload_key_with_reserved_characters_reaches_preprocess() {
    let harness = harness(&[("churn", 20)]).await;
    let executor = harness.runner.executor();
    let nested = StorageUri::new(
        harness.config.bucket_name(),
        "uploads 2024/run#1?v=2/features.csv",
    );
    executor
        .upload(
            &executor.local_path(&harness.config.default_data_uri()),
            &nested,
        )
        .unwrap();

    let report = trigger_and_run_at(&harness, &nested).await;
    assert!(report.succeeded(), "final state {}", report.final_state.name());
}

#[tokio::test]
async fn test_run_writes_source_layout() {
    let harness = harness(&[("churn", 20)]).await;
    trigger_and_run(&harness).await;

    let run_root = harness
        .runner
        .executor()
        .local_path(&StorageUri::new(harness.config.bucket_name(), "AutoML/v42"));
    for relative in [
        "training/train_val.csv",
        "testing/x_test.csv",
        "testing/y_test.csv",
        "transform/x_test.csv.out",
        "evaluation/evaluation_metrics.json",
    ] {
        assert!(run_root.join(relative).exists(), "missing {}", relative);
    }
}
