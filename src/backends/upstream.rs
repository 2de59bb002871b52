//! NIM upstream client
//!
//! Issues the single outbound chat-completion call for each inbound request

use crate::config::Config;
use crate::error::{ProxyError, ProxyResult};
use crate::models::chat::UpstreamPayload;
use reqwest::{header, Client, Response};
use serde_json::Value;
use std::time::Duration;

/// Connection settings are fixed at startup; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    url: String,
    api_key: String,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &Config) -> ProxyResult<Self> {
        let http = Client::builder()
            .connect_timeout(config.request_timeout())
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            http,
            url: config.chat_completions_url(),
            api_key: config.api_key.clone(),
            timeout: config.request_timeout(),
        })
    }

    /// Buffered call. The timeout covers the whole exchange, body included.
    pub async fn complete(&self, payload: &UpstreamPayload) -> ProxyResult<Value> {
        tracing::debug!("Sending non-streaming request to {}", self.url);

        let response = self
            .http
            .post(&self.url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await?;

        let response = self.check_status(response).await?;

        let body: Value = response.json().await.map_err(|e| {
            tracing::error!("Upstream returned an unreadable body: {}", e);
            ProxyError::Upstream(format!("invalid JSON from upstream: {}", e))
        })?;

        Ok(body)
    }

    /// Streaming call. The timeout bounds connect, response headers and, on
    /// a rejection, reading the error body; a successful body is read by the
    /// relay afterwards.
    pub async fn open_stream(&self, payload: &UpstreamPayload) -> ProxyResult<Response> {
        tracing::debug!("Sending streaming request to {}", self.url);

        tokio::time::timeout(self.timeout, self.send_streaming(payload))
            .await
            .map_err(|_| {
                tracing::error!("Upstream {} did not respond within {}s", self.url, self.timeout.as_secs());
                ProxyError::Upstream(format!(
                    "{} did not respond within {}s",
                    self.url,
                    self.timeout.as_secs()
                ))
            })?
    }

    async fn send_streaming(&self, payload: &UpstreamPayload) -> ProxyResult<Response> {
        let response = self
            .http
            .post(&self.url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(payload)
            .send()
            .await?;

        self.check_status(response).await
    }

    async fn check_status(&self, response: Response) -> ProxyResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = read_error_text(response).await;
        tracing::error!("Upstream error ({}) from {}: {}", status, self.url, error_text);

        Err(ProxyError::Upstream(format!(
            "Upstream returned {}: {}",
            status, error_text
        )))
    }
}

/// Upper bound on how much of a rejection body is kept for the error message.
pub const MAX_ERROR_BODY_BYTES: usize = 16 * 1024;

async fn read_error_text(mut response: Response) -> String {
    let mut body = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let room = MAX_ERROR_BODY_BYTES - body.len();
                if chunk.len() >= room {
                    body.extend_from_slice(&chunk[..room]);
                    break;
                }
                body.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(e) if body.is_empty() => return format!("Unknown error ({})", e),
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
