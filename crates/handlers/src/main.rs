//! AutoML handlers runtime
//!
//! Serves the pipeline trigger and endpoint upsert handlers over HTTP for
//! the storage notification and the pipeline's deployment step.

use anyhow::Result;
use automl_handlers::{api, build_state, config::HandlersConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use workflow_lib::{ControlPlane, HttpControlPlane, InMemoryControlPlane, StructuredLogger};

const RUNTIME_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting automl-handlers");

    let config = HandlersConfig::load()?;
    info!(
        workload = %config.workload.workload_name,
        pipeline = %config.workload.pipeline_name(),
        "Handlers configured"
    );

    let control_plane: Arc<dyn ControlPlane> = match &config.runtime.control_plane_url {
        Some(url) => {
            info!(url = %url, "Using remote control plane");
            Arc::new(HttpControlPlane::new(url)?)
        }
        None => {
            info!("Using in-memory control plane");
            let in_memory =
                InMemoryControlPlane::new(&config.workload.region, &config.workload.account_id);
            in_memory
                .register_pipeline(&config.workload.pipeline_name())
                .await;
            Arc::new(in_memory)
        }
    };

    let state = build_state(
        &config.workload,
        control_plane,
        Duration::from_secs(config.runtime.invocation_timeout_secs),
    )
    .await;

    let logger = StructuredLogger::new(&config.workload.workload_name);
    logger.log_startup(RUNTIME_VERSION, config.runtime.api_port);

    state.health_registry.set_ready(true).await;

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    api::serve(config.runtime.api_port, state, shutdown).await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
