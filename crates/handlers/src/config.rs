//! Runtime configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use workflow_lib::WorkloadConfig;

/// Handlers runtime configuration, read once at startup
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Port serving invocations, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Wall-clock budget of one invocation
    #[serde(default = "default_invocation_timeout")]
    pub invocation_timeout_secs: u64,

    /// Remote control plane; in-memory when unset
    #[serde(default)]
    pub control_plane_url: Option<String>,
}

fn default_api_port() -> u16 {
    8080
}

fn default_invocation_timeout() -> u64 {
    60
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            invocation_timeout_secs: default_invocation_timeout(),
            control_plane_url: None,
        }
    }
}

impl RuntimeConfig {
    /// Load from `AUTOML_RUNTIME_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AUTOML_RUNTIME").try_parsing(true))
            .build()?;

        let runtime: RuntimeConfig = config
            .try_deserialize()
            .context("Invalid AUTOML_RUNTIME configuration")?;
        if runtime.invocation_timeout_secs == 0 {
            anyhow::bail!("invocation_timeout_secs must be greater than zero");
        }
        Ok(runtime)
    }
}

/// Workload and runtime settings together
#[derive(Debug, Clone)]
pub struct HandlersConfig {
    pub workload: WorkloadConfig,
    pub runtime: RuntimeConfig,
}

impl HandlersConfig {
    pub fn load() -> Result<Self> {
        Ok(Self {
            workload: WorkloadConfig::load().context("Invalid workload configuration")?,
            runtime: RuntimeConfig::load()?,
        })
    }
}
