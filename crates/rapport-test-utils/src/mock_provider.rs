// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted generation provider for deterministic tests.
//!
//! Responses are queued per [`GenerationPurpose`] and popped in FIFO order.
//! When a purpose's queue is empty a fixed default for that purpose is
//! returned, so tests only script the calls they care about.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rapport_core::traits::adapter::PluginAdapter;
use rapport_core::traits::provider::ProviderAdapter;
use rapport_core::types::{
    AdapterType, GenerationPurpose, GenerationRequest, GenerationResponse, HealthStatus,
    TokenUsage,
};
use rapport_core::RapportError;

/// One scripted reaction to a generation request.
#[derive(Debug, Clone, PartialEq)]
pub enum Scripted {
    /// Return this text.
    Text(String),
    /// Fail with a provider error carrying this message.
    Fail(String),
    /// Never return. The caller's timeout decides what happens.
    Hang,
}

/// Mock generation provider with per-purpose scripted responses.
#[derive(Default)]
pub struct MockProvider {
    scripts: Mutex<HashMap<GenerationPurpose, VecDeque<Scripted>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a text response for `purpose`.
    pub fn respond(&self, purpose: GenerationPurpose, text: impl Into<String>) -> &Self {
        self.push(purpose, Scripted::Text(text.into()))
    }

    /// Queues a provider error for `purpose`.
    pub fn fail(&self, purpose: GenerationPurpose, message: impl Into<String>) -> &Self {
        self.push(purpose, Scripted::Fail(message.into()))
    }

    /// Queues a request that never completes for `purpose`.
    pub fn hang(&self, purpose: GenerationPurpose) -> &Self {
        self.push(purpose, Scripted::Hang)
    }

    pub fn push(&self, purpose: GenerationPurpose, scripted: Scripted) -> &Self {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(purpose)
            .or_default()
            .push_back(scripted);
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests received for one purpose.
    pub fn requests_for(&self, purpose: GenerationPurpose) -> Vec<GenerationRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.purpose == purpose)
            .collect()
    }

    fn next(&self, purpose: GenerationPurpose) -> Scripted {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&purpose)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Scripted::Text(default_response(purpose).to_string()))
    }
}

fn default_response(purpose: GenerationPurpose) -> &'static str {
    match purpose {
        GenerationPurpose::Reply => "mock reply",
        GenerationPurpose::Reengage => "mock follow-up",
        GenerationPurpose::Initiate => "mock opener",
        GenerationPurpose::Summary => "Summary: mock summary",
        GenerationPurpose::Sentiment => "0.0",
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, RapportError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RapportError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, RapportError> {
        let purpose = request.purpose;
        let model = request.model.clone().unwrap_or_else(|| "mock-model".into());
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        match self.next(purpose) {
            Scripted::Text(content) => Ok(GenerationResponse {
                content,
                model,
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 20,
                },
            }),
            Scripted::Fail(message) => Err(RapportError::Provider {
                message,
                source: None,
            }),
            Scripted::Hang => {
                std::future::pending::<()>().await;
                Err(RapportError::Internal("unreachable".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(purpose: GenerationPurpose) -> GenerationRequest {
        GenerationRequest {
            purpose,
            model: None,
            system_prompt: None,
            prompt: "hi".into(),
            max_tokens: 10,
        }
    }

    #[tokio::test]
    async fn defaults_when_nothing_scripted() {
        let provider = MockProvider::new();
        let resp = provider
            .complete(request(GenerationPurpose::Sentiment))
            .await
            .unwrap();
        assert_eq!(resp.content, "0.0");
    }

    #[tokio::test]
    async fn scripts_are_per_purpose_and_fifo() {
        let provider = MockProvider::new();
        provider
            .respond(GenerationPurpose::Reply, "first")
            .respond(GenerationPurpose::Reply, "second")
            .respond(GenerationPurpose::Sentiment, "+0.1");

        let sentiment = provider
            .complete(request(GenerationPurpose::Sentiment))
            .await
            .unwrap();
        let first = provider.complete(request(GenerationPurpose::Reply)).await.unwrap();
        let second = provider.complete(request(GenerationPurpose::Reply)).await.unwrap();
        let fallback = provider.complete(request(GenerationPurpose::Reply)).await.unwrap();

        assert_eq!(sentiment.content, "+0.1");
        assert_eq!(first.content, "first");
        assert_eq!(second.content, "second");
        assert_eq!(fallback.content, "mock reply");
        assert_eq!(provider.requests_for(GenerationPurpose::Reply).len(), 3);
        assert_eq!(provider.requests().len(), 4);
    }

    #[tokio::test]
    async fn scripted_failure_is_a_provider_error() {
        let provider = MockProvider::new();
        provider.fail(GenerationPurpose::Summary, "503");
        let err = provider
            .complete(request(GenerationPurpose::Summary))
            .await
            .unwrap_err();
        assert!(err.is_generation_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn hang_never_completes() {
        let provider = MockProvider::new();
        provider.hang(GenerationPurpose::Reply);
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            provider.complete(request(GenerationPurpose::Reply)),
        )
        .await;
        assert!(result.is_err());
    }
}
