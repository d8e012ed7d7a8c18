//! AutoML workflow CLI
//!
//! Runs the preprocessing and evaluation jobs, prints the pipeline
//! definition, runs the whole workflow locally, invokes the deployed
//! handlers and sends inference requests to the promoted endpoint.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{definition, evaluate, invoke, predict, preprocess, run};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use workflow_lib::evaluation::{DEFAULT_EVALUATION_DIR, DEFAULT_LABELS_PATH, DEFAULT_PREDICTIONS_PATH};
use workflow_lib::preprocess::{DEFAULT_INPUT_ROOT, DEFAULT_OUTPUT_ROOT};
use workflow_lib::{EndpointUpsertEvent, WorkloadConfig};

/// AutoML workflow CLI
#[derive(Parser)]
#[command(name = "automl")]
#[command(author, version, about = "CLI for the AutoML training workflow", long_about = None)]
pub struct Cli {
    /// Handlers runtime URL (can also be set via AUTOML_HANDLERS_URL env var)
    #[arg(long, env = "AUTOML_HANDLERS_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split a dataset into training and testing artifacts
    Preprocess {
        /// Dataset file name, relative to the input root
        #[arg(long)]
        input_file: String,

        #[arg(long, default_value = DEFAULT_INPUT_ROOT)]
        input_root: PathBuf,

        /// Parent of the training/ and testing/ outputs
        #[arg(long, default_value = DEFAULT_OUTPUT_ROOT)]
        output_root: PathBuf,

        /// Label column (defaults to the workload's target attribute)
        #[arg(long, env = "TARGET_ATTRIBUTE")]
        target_attribute: Option<String>,

        /// Seed for a reproducible split
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Score batch predictions and write the quality report
    Evaluate {
        #[arg(long, default_value = DEFAULT_PREDICTIONS_PATH)]
        predictions: PathBuf,

        #[arg(long, default_value = DEFAULT_LABELS_PATH)]
        labels: PathBuf,

        #[arg(long, default_value = DEFAULT_EVALUATION_DIR)]
        output_dir: PathBuf,
    },

    /// Print the pipeline definition
    Definition,

    /// Run the whole workflow locally
    Run {
        /// Directory standing in for the object store
        #[arg(long)]
        storage_root: PathBuf,

        /// Local CSV to upload before the run
        #[arg(long)]
        data_file: Option<PathBuf>,

        /// Minimum weighted F1 for promotion
        #[arg(long)]
        threshold: Option<f64>,

        /// Version id of the simulated upload
        #[arg(long)]
        execution_version: Option<String>,
    },

    /// Invoke the deployed handlers
    #[command(subcommand)]
    Invoke(InvokeCommands),

    /// Send a CSV payload to the workload's endpoint
    Predict {
        /// Control plane serving the endpoint
        #[arg(long, env = "AUTOML_RUNTIME_CONTROL_PLANE_URL")]
        control_plane_url: String,

        /// Endpoint to call (defaults to the workload's endpoint)
        #[arg(long)]
        endpoint_name: Option<String>,

        /// Inline payload, one record per line
        #[arg(long, conflicts_with = "payload_file")]
        payload: Option<String>,

        /// File holding the payload
        #[arg(long)]
        payload_file: Option<PathBuf>,

        #[arg(long, default_value = "text/csv")]
        content_type: String,
    },
}

#[derive(Subcommand)]
pub enum InvokeCommands {
    /// Send an upload notification to the pipeline trigger
    Trigger {
        #[arg(long)]
        bucket: String,

        #[arg(long)]
        key: String,

        #[arg(long)]
        version_id: String,
    },

    /// Deploy a model behind the workload's endpoint
    Deploy {
        #[arg(long)]
        model_name: String,

        /// Required for HOSTED endpoints
        #[arg(long, default_value = "ml.m5.xlarge")]
        instance_type: String,

        /// HOSTED or SERVERLESS (defaults to the workload's endpoint type)
        #[arg(long)]
        endpoint_type: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();

    if let Err(e) = execute(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let config = WorkloadConfig::load()?;

    match cli.command {
        Commands::Preprocess {
            input_file,
            input_root,
            output_root,
            target_attribute,
            seed,
        } => {
            preprocess::preprocess(
                preprocess::PreprocessArgs {
                    input_file,
                    input_root,
                    output_root,
                    target_attribute: target_attribute.unwrap_or(config.target_attribute),
                    seed: seed.or(config.split_seed),
                },
                cli.format,
            )?;
        }
        Commands::Evaluate {
            predictions,
            labels,
            output_dir,
        } => {
            evaluate::evaluate(
                predictions,
                labels,
                output_dir,
                config.performance_threshold,
                cli.format,
            )?;
        }
        Commands::Definition => {
            definition::show_definition(&config, cli.format)?;
        }
        Commands::Run {
            storage_root,
            data_file,
            threshold,
            execution_version,
        } => {
            run::run(
                &config,
                run::RunArgs {
                    storage_root,
                    data_file,
                    threshold,
                    execution_version,
                },
                cli.format,
            )
            .await?;
        }
        Commands::Predict {
            control_plane_url,
            endpoint_name,
            payload,
            payload_file,
            content_type,
        } => {
            predict::predict(
                predict::PredictArgs {
                    control_plane_url,
                    endpoint_name: endpoint_name.unwrap_or_else(|| config.endpoint_name()),
                    payload,
                    payload_file,
                    content_type,
                },
                cli.format,
            )
            .await?;
        }
        Commands::Invoke(invoke_cmd) => {
            let client = client::HandlersClient::new(&cli.api_url)?;
            match invoke_cmd {
                InvokeCommands::Trigger {
                    bucket,
                    key,
                    version_id,
                } => {
                    invoke::trigger(&client, &bucket, &key, &version_id, cli.format).await?;
                }
                InvokeCommands::Deploy {
                    model_name,
                    instance_type,
                    endpoint_type,
                } => {
                    let event = EndpointUpsertEvent {
                        model_name,
                        workload_name: config.workload_name.clone(),
                        instance_type,
                        endpoint_type: endpoint_type
                            .unwrap_or_else(|| config.endpoint_type.to_string()),
                    };
                    invoke::deploy(&client, event, cli.format).await?;
                }
            }
        }
    }

    Ok(())
}
