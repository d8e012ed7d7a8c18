//! Inference against the workload's endpoint

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tabled::Tabled;
use tracing::info;
use workflow_lib::{ControlPlane, HttpControlPlane};

use crate::output::{print_info, print_rows, OutputFormat};

pub struct PredictArgs {
    pub control_plane_url: String,
    pub endpoint_name: String,
    pub payload: Option<String>,
    pub payload_file: Option<PathBuf>,
    pub content_type: String,
}

/// Row for the predictions table
#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Row")]
    row: usize,
    #[tabled(rename = "Prediction")]
    prediction: String,
}

#[derive(Serialize)]
struct PredictOutput<'a> {
    endpoint_name: &'a str,
    predictions: Vec<&'a str>,
}

/// Send one payload to the endpoint and print what it returns
pub async fn predict(args: PredictArgs, format: OutputFormat) -> Result<()> {
    let payload = match (args.payload, &args.payload_file) {
        (Some(payload), _) => payload,
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => anyhow::bail!("Provide --payload or --payload-file"),
    };

    let control_plane = HttpControlPlane::new(&args.control_plane_url)?;
    if let OutputFormat::Table = format {
        print_info(&format!("Using endpoint {}", args.endpoint_name));
    }
    info!(endpoint = %args.endpoint_name, bytes = payload.len(), "Sending inference request");

    let response = control_plane
        .invoke_endpoint(&args.endpoint_name, &args.content_type, &payload)
        .await
        .with_context(|| format!("Inference on {} failed", args.endpoint_name))?;

    let predictions: Vec<&str> = response.lines().filter(|l| !l.is_empty()).collect();
    let rows = predictions
        .iter()
        .enumerate()
        .map(|(i, p)| PredictionRow {
            row: i + 1,
            prediction: p.to_string(),
        })
        .collect();
    print_rows(
        rows,
        &PredictOutput {
            endpoint_name: &args.endpoint_name,
            predictions,
        },
        format,
    )
}
