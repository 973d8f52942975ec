// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude adapter for the Rapport conversation core.
//!
//! Implements [`ProviderAdapter`] over the non-streaming Messages API.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use rapport_config::RapportConfig;
use rapport_core::error::RapportError;
use rapport_core::traits::{PluginAdapter, ProviderAdapter};
use rapport_core::types::{
    AdapterType, GenerationRequest, GenerationResponse, HealthStatus, TokenUsage,
};
use tracing::{debug, info};

use crate::client::AnthropicClient;
use crate::types::{ApiMessage, MessageRequest};

/// Anthropic Claude provider implementing [`ProviderAdapter`].
///
/// API key resolution order: config, then `ANTHROPIC_API_KEY`, then error.
pub struct AnthropicProvider {
    client: AnthropicClient,
}

impl AnthropicProvider {
    pub fn new(config: &RapportConfig) -> Result<Self, RapportError> {
        let api_key = resolve_api_key(&config.anthropic.api_key)?;
        let client = AnthropicClient::new(
            &api_key,
            &config.anthropic.api_version,
            config.anthropic.default_model.clone(),
            Duration::from_secs(config.generation.timeout_secs),
        )?;

        info!(
            model = config.anthropic.default_model,
            "Anthropic provider initialized"
        );

        Ok(Self { client })
    }

    /// Wraps an existing client, e.g. one pointed at a mock server.
    pub fn with_client(client: AnthropicClient) -> Self {
        Self { client }
    }

    fn to_message_request(&self, request: &GenerationRequest) -> MessageRequest {
        MessageRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.client.default_model().to_string()),
            messages: vec![ApiMessage::user(request.prompt.clone())],
            system: request.system_prompt.clone(),
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl PluginAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, RapportError> {
        // No API call: health checks must not spend tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RapportError> {
        debug!("Anthropic provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    async fn complete(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, RapportError> {
        let api_request = self.to_message_request(&request);
        let response = self.client.complete_message(&api_request).await?;

        let content = response.text();
        if content.trim().is_empty() {
            return Err(RapportError::Provider {
                message: format!(
                    "empty {} response (stop_reason: {})",
                    request.purpose,
                    response.stop_reason.as_deref().unwrap_or("none")
                ),
                source: None,
            });
        }

        debug!(
            purpose = %request.purpose,
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "generation complete"
        );

        Ok(GenerationResponse {
            content,
            model: response.model,
            usage: TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
        })
    }
}

/// Resolves the API key from config or environment.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, RapportError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }
    std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
        RapportError::Config(
            "Anthropic API key not found. Set anthropic.api_key in config or ANTHROPIC_API_KEY environment variable.".into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapport_core::types::GenerationPurpose;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> AnthropicProvider {
        let client = AnthropicClient::new(
            "key",
            "2023-06-01",
            "claude-haiku-4-5-20251001".into(),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_base_url(server.uri());
        AnthropicProvider::with_client(client)
    }

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            purpose: GenerationPurpose::Reply,
            model: None,
            system_prompt: Some("You are Mia.".into()),
            prompt: prompt.into(),
            max_tokens: 400,
        }
    }

    fn body(content: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": content,
            "model": "claude-haiku-4-5-20251001",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 4}
        })
    }

    #[test]
    fn config_key_wins_over_env() {
        assert_eq!(resolve_api_key(&Some("sk-test".into())).unwrap(), "sk-test");
    }

    #[tokio::test]
    async fn complete_maps_request_and_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-haiku-4-5-20251001",
                "system": "You are Mia.",
                "max_tokens": 400,
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(
                serde_json::json!([{"type": "text", "text": "hey!|||how are you?"}]),
            )))
            .mount(&server)
            .await;

        let response = provider_for(&server).complete(request("hi")).await.unwrap();
        assert_eq!(response.content, "hey!|||how are you?");
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.output_tokens, 4);
    }

    #[tokio::test]
    async fn model_override_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"model": "claude-sonnet-4-5"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(
                serde_json::json!([{"type": "text", "text": "ok"}]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request("hi");
        req.model = Some("claude-sonnet-4-5".into());
        provider_for(&server).complete(req).await.unwrap();
    }

    #[tokio::test]
    async fn empty_content_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(body(serde_json::json!([]))),
            )
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .complete(request("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RapportError::Provider { .. }));
        assert!(err.is_generation_failure());
    }

    #[tokio::test]
    async fn whitespace_only_content_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(
                serde_json::json!([{"type": "text", "text": "  \n "}]),
            )))
            .mount(&server)
            .await;

        assert!(provider_for(&server).complete(request("hi")).await.is_err());
    }

    #[tokio::test]
    async fn adapter_metadata() {
        let server = MockServer::start().await;
        let provider = provider_for(&server);
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.adapter_type(), AdapterType::Provider);
        assert_eq!(provider.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
