//! Handler invocation commands

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Deserialize;
use workflow_lib::{EndpointUpsertEvent, StorageNotification};

use crate::client::HandlersClient;
use crate::output::{print_json, print_success, OutputFormat};

/// Endpoint upsert reply body
#[derive(Debug, Deserialize)]
struct DeployBody {
    #[serde(rename = "EndpointConfigArn")]
    endpoint_config_arn: String,
    #[serde(rename = "EndpointArn")]
    endpoint_arn: String,
}

/// Simulate a dataset upload and start the pipeline
pub async fn trigger(
    client: &HandlersClient,
    bucket: &str,
    key: &str,
    version_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let response = client
        .trigger(&StorageNotification::object_created(bucket, key, version_id))
        .await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            print_success("Pipeline execution started");
            println!("Execution:     {}", response.body.cyan());
        }
    }

    Ok(())
}

/// Deploy a model behind the workload's endpoint
pub async fn deploy(
    client: &HandlersClient,
    event: EndpointUpsertEvent,
    format: OutputFormat,
) -> Result<()> {
    let response = client.deploy(&event).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            let body: DeployBody = serde_json::from_str(&response.body)
                .context("Unexpected endpoint upsert reply")?;
            print_success(&format!("Deployed {}", event.model_name));
            println!("Config:        {}", body.endpoint_config_arn);
            println!("Endpoint:      {}", body.endpoint_arn.cyan());
        }
    }

    Ok(())
}
