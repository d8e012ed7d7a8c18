//! Client for the handlers runtime invocation routes

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use url::Url;
use workflow_lib::{EndpointUpsertEvent, InvocationResponse, StorageNotification};

/// HTTP client for the handlers runtime
pub struct HandlersClient {
    client: Client,
    base_url: Url,
}

impl HandlersClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(90))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a POST request with JSON body
    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Deliver an upload notification to the pipeline trigger
    pub async fn trigger(&self, notification: &StorageNotification) -> Result<InvocationResponse> {
        self.post("invoke/pipeline-trigger", notification).await
    }

    /// Ask the endpoint upsert handler to deploy a model
    pub async fn deploy(&self, event: &EndpointUpsertEvent) -> Result<InvocationResponse> {
        self.post("invoke/endpoint-upsert", event).await
    }
}
