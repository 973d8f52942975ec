// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API.
//!
//! Provides [`AnthropicClient`] which handles request construction,
//! authentication, and a single retry on transient errors.

use std::time::Duration;

use rapport_core::RapportError;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, MessageRequest, MessageResponse};

/// Base URL for the Anthropic Messages API.
const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Delay before the retry of a transient failure.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// HTTP client for Anthropic API communication.
///
/// Retries once on 429, 500, 503, and 529.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    default_model: String,
    max_retries: u32,
    retry_delay: Duration,
    base_url: String,
}

impl AnthropicClient {
    /// Creates a new client.
    ///
    /// `request_timeout` bounds a single HTTP attempt; the caller applies its
    /// own overall deadline on top.
    pub fn new(
        api_key: &str,
        api_version: &str,
        model: String,
        request_timeout: Duration,
    ) -> Result<Self, RapportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| RapportError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(api_version).map_err(|e| {
                RapportError::Config(format!("invalid API version header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(|e| RapportError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            default_model: model,
            max_retries: 1,
            retry_delay: RETRY_DELAY,
            base_url: API_BASE_URL.to_string(),
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Points the client at a different endpoint, e.g. a local mock server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sends a request and returns the full response.
    pub async fn complete_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, RapportError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying completion request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&self.base_url)
                .json(request)
                .send()
                .await
                .map_err(|e| RapportError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "completion response received");

            if status.is_success() {
                let body = response.text().await.map_err(|e| RapportError::Provider {
                    message: format!("failed to read response body: {e}"),
                    source: Some(Box::new(e)),
                })?;
                return serde_json::from_str(&body).map_err(|e| RapportError::Provider {
                    message: format!("failed to parse API response: {e}"),
                    source: Some(Box::new(e)),
                });
            }

            let body = response.text().await.unwrap_or_default();

            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(api_error(status, &body));
                continue;
            }

            return Err(api_error(status, &body));
        }

        Err(last_error.unwrap_or_else(|| RapportError::Provider {
            message: "completion request failed after retries".into(),
            source: None,
        }))
    }
}

fn api_error(status: reqwest::StatusCode, body: &str) -> RapportError {
    let message = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => format!(
            "Anthropic API error ({}): {}",
            api_err.error.type_, api_err.error.message
        ),
        Err(_) => format!("API returned {status}: {body}"),
    };
    RapportError::Provider {
        message,
        source: None,
    }
}

/// True for HTTP status codes worth one retry.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}
