//! Local end-to-end run
//!
//! Drives the whole chain against a directory standing in for the object
//! store, the majority-class backend and an in-memory control plane.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::Tabled;
use tracing::debug;
use workflow_lib::workflow::{
    parameters::METRIC_THRESHOLD, LocalStageExecutor, MajorityClassBackend, PipelineRunner,
    RunReport, WorkflowDefinition, WorkflowState,
};
use workflow_lib::{
    InMemoryControlPlane, PipelineParameter, StorageNotification, StorageUri, TriggerHandler,
    WorkloadConfig,
};

use crate::output::{color_score, color_state, print_info, print_json, print_warning, OutputFormat};

pub struct RunArgs {
    pub storage_root: PathBuf,
    pub data_file: Option<PathBuf>,
    pub threshold: Option<f64>,
    pub execution_version: Option<String>,
}

/// Row for the stage timing table
#[derive(Tabled)]
struct StageRow {
    #[tabled(rename = "Stage")]
    stage: &'static str,
    #[tabled(rename = "Duration")]
    duration: String,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    execution_arn: &'a str,
    #[serde(flatten)]
    report: &'a RunReport,
}

/// Run the pipeline once, locally
pub async fn run(config: &WorkloadConfig, args: RunArgs, format: OutputFormat) -> Result<()> {
    let control_plane = Arc::new(InMemoryControlPlane::new(
        &config.region,
        &config.account_id,
    ));
    control_plane.register_pipeline(&config.pipeline_name()).await;

    let executor = LocalStageExecutor::new(
        &args.storage_root,
        MajorityClassBackend,
        control_plane.clone(),
    )
    .with_split_seed(config.split_seed);

    let data_uri = match &args.data_file {
        Some(path) => {
            let uri = StorageUri::new(config.bucket_name(), file_name(path)?);
            executor
                .upload(path, &uri)
                .with_context(|| format!("Failed to upload {}", path.display()))?;
            uri
        }
        None => config.default_data_uri(),
    };
    if !executor.local_path(&data_uri).exists() {
        anyhow::bail!(
            "No dataset at {} (looked in {})",
            data_uri,
            executor.local_path(&data_uri).display()
        );
    }

    debug!(data_uri = %data_uri, storage_root = %args.storage_root.display(), "Dataset in place");

    let version = args
        .execution_version
        .unwrap_or_else(|| chrono::Utc::now().format("%Y%m%d%H%M%S").to_string());
    let trigger = TriggerHandler::new(
        control_plane.clone(),
        &config.workload_name,
        config.pipeline_name(),
    );
    let execution = trigger
        .start(&StorageNotification::object_created(
            &data_uri.bucket,
            &data_uri.key,
            &version,
        ))
        .await?;

    let mut parameters = execution.parameters.clone();
    if let Some(threshold) = args.threshold {
        parameters.push(PipelineParameter::new(METRIC_THRESHOLD, threshold.to_string()));
    }

    let runner = PipelineRunner::new(WorkflowDefinition::from_config(config), executor);
    let report = runner.run(&parameters).await?;
    let threshold = args.threshold.unwrap_or(config.performance_threshold);

    match format {
        OutputFormat::Json => print_json(&RunOutput {
            execution_arn: &execution.arn,
            report: &report,
        })?,
        OutputFormat::Table => print_report(&execution.arn, &report, threshold),
    }

    Ok(())
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} is not a file", path.display()))
}

fn print_report(execution_arn: &str, report: &RunReport, threshold: f64) {
    println!("{}", "Pipeline Run".bold());
    println!("{}", "=".repeat(60));
    println!("Execution:     {}", execution_arn.cyan());
    println!("Version:       {}", report.execution_version);
    println!("State:         {}", color_state(report.final_state.name()));
    if let Some(score) = report.final_state.score() {
        println!("Weighted F1:   {}", color_score(score, threshold));
    }
    println!();

    let rows: Vec<StageRow> = report
        .stages
        .iter()
        .map(|s| StageRow {
            stage: s.stage,
            duration: format!("{:.3}s", s.duration_secs),
        })
        .collect();
    let table = tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string();
    println!("{}", table);
    println!();

    match &report.final_state {
        WorkflowState::Succeeded { promotion, .. } => {
            print_info(&format!(
                "Model package {} (version {})",
                promotion.model_package_arn, promotion.model_package_version
            ));
            print_info(&format!("Endpoint {}", promotion.endpoint_arn));
        }
        WorkflowState::Failed { message, .. } => print_warning(message),
        _ => {}
    }
}
