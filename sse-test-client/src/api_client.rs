use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};

/// Thin wrapper over the notification server's HTTP API.
pub struct ApiClient {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String, bearer_token: Option<String>) -> Self {
        Self {
            client,
            base_url,
            bearer_token,
        }
    }

    pub async fn post_job_event(
        &self,
        kind: &str,
        title: &str,
        company: &str,
        job_id: &str,
    ) -> Result<Value> {
        let url = format!("{}/jobs/events", self.base_url);

        let mut request = self.client.post(&url).json(&json!({
            "kind": kind,
            "title": title,
            "company": company,
            "job_id": job_id,
        }));
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.context("Failed to post job event")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            anyhow::bail!("Failed to post job event: {} - Response: {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn get_status(&self) -> Result<Value> {
        let url = format!("{}/notifications/status", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to get hub status")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to get hub status: {}", response.status());
        }

        response.json().await.context("Failed to parse response")
    }
}
