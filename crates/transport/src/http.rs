// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response transport to the backend.
//!
//! Stateless JSON-over-HTTP submitter. Every call carries the bearer
//! credential, runs under the configured deadline, and treats any status
//! outside 2xx as an error carrying the status code and (truncated)
//! response body. Retries belong to the submit policy, not this layer.

use std::time::Duration;

use mm_wire::{Command, CommandResult, HeartbeatData, Inventory};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Cap on error-body bytes kept for diagnostics.
const MAX_ERROR_BODY: usize = 512;

/// Deadline for the one-off register call, independent of the configured
/// request timeout.
const REGISTER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unsuccessful response: {status} - body: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request cancelled")]
    Cancelled,
}

/// Stateless HTTP client for the backend's agent endpoints.
pub struct RequestTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    machine_id: String,
}

impl RequestTransport {
    pub fn new(
        base_url: &str,
        api_key: &str,
        machine_id: &str,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            machine_id: machine_id.to_string(),
        })
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    /// Announce this machine and its first inventory to the backend.
    pub async fn register(
        &self,
        inventory: &Inventory,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        let url = format!("{}/api/agentes/{}", self.base_url, self.machine_id);
        let body = serde_json::json!({
            "machine_id": self.machine_id,
            "inventory": inventory,
        });
        let request = self
            .client
            .post(url)
            .timeout(REGISTER_TIMEOUT)
            .bearer_auth(&self.api_key)
            .json(&body);
        self.execute(request, cancel).await.map(drop)
    }

    pub async fn send_heartbeat(
        &self,
        heartbeat: &HeartbeatData,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        let url = format!("{}/api/agentes/{}/heartbeat", self.base_url, self.machine_id);
        let request = self.client.post(url).bearer_auth(&self.api_key).json(heartbeat);
        self.execute(request, cancel).await.map(drop)
    }

    pub async fn send_inventory(
        &self,
        inventory: &Inventory,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        let url = format!("{}/api/agentes/{}/inventory", self.base_url, self.machine_id);
        let request = self.client.post(url).bearer_auth(&self.api_key).json(inventory);
        self.execute(request, cancel).await.map(drop)
    }

    /// Fallback delivery path for results when the stream is down.
    pub async fn send_command_result(
        &self,
        result: &CommandResult,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        let url = format!(
            "{}/api/agentes/{}/commands/{}/result",
            self.base_url, self.machine_id, result.id
        );
        let request = self.client.post(url).bearer_auth(&self.api_key).json(result);
        self.execute(request, cancel).await.map(drop)
    }

    /// Liveness probe against the backend, under its own deadline.
    pub async fn ping(
        &self,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        let url = format!("{}/api/ping", self.base_url);
        let request = self
            .client
            .get(url)
            .timeout(deadline)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        self.execute(request, cancel).await.map(drop)
    }

    /// Pull commands queued while the stream was down.
    pub async fn fetch_pending_commands(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Command>, TransportError> {
        let url = format!("{}/api/agentes/{}/commands", self.base_url, self.machine_id);
        let request = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        let response = self.execute(request, cancel).await?;
        let commands = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            parsed = response.json::<Vec<Command>>() => parsed?,
        };
        Ok(commands)
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, TransportError> {
        let send = async {
            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                Ok(response)
            } else {
                let body = response.text().await.unwrap_or_default();
                Err(TransportError::Status {
                    status: status.as_u16(),
                    body: truncate_body(&body),
                })
            }
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = send => result,
        }
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut cut = MAX_ERROR_BODY;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}… ({} bytes)", &body[..cut], body.len())
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
