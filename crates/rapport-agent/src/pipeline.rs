// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pieces shared by every agent turn: generation with a deadline, profile
//! lookup, planning, rolling summaries, and versioned context writes.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rapport_config::model::RelationshipConfig;
use rapport_config::RapportConfig;
use rapport_context::{PromptAssembler, parse_summary};
use rapport_core::error::RapportError;
use rapport_core::types::{
    Conversation, ConversationContext, GenerationRequest, Message, Profile,
};
use rapport_core::{ProfileAdapter, ProviderAdapter, StorageAdapter};
use rapport_pacing::{DispatchPlan, Segmenter, TimingModel, timing::local_hour};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::dispatch::Dispatcher;

/// Attempts at a versioned context write before giving up.
const CONTEXT_WRITE_ATTEMPTS: usize = 3;

pub(crate) struct Pipeline {
    pub(crate) storage: Arc<dyn StorageAdapter + Send + Sync>,
    profiles: Arc<dyn ProfileAdapter + Send + Sync>,
    provider: Arc<dyn ProviderAdapter + Send + Sync>,
    pub(crate) assembler: PromptAssembler,
    pub(crate) segmenter: Segmenter,
    timing: TimingModel,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) relationship: RelationshipConfig,
    generation_timeout: Duration,
    history_window: usize,
    summary_max_chars: usize,
    locks: DashMap<String, Arc<Mutex<()>>>,
    rng: std::sync::Mutex<StdRng>,
}

impl Pipeline {
    pub(crate) fn new(
        adapters: &crate::Adapters,
        config: &RapportConfig,
        assembler: PromptAssembler,
        rng: StdRng,
    ) -> Self {
        Self {
            storage: adapters.storage.clone(),
            profiles: adapters.profiles.clone(),
            provider: adapters.provider.clone(),
            assembler,
            segmenter: Segmenter::new(config.generation.delimiter.clone()),
            timing: TimingModel::new(config.timing.clone()),
            dispatcher: Dispatcher::new(adapters.storage.clone(), config.timing.simulate_latency),
            relationship: config.relationship.clone(),
            generation_timeout: Duration::from_secs(config.generation.timeout_secs),
            history_window: config.generation.history_window,
            summary_max_chars: config.generation.summary_max_chars,
            locks: DashMap::new(),
            rng: std::sync::Mutex::new(rng),
        }
    }

    /// Serializes work on one conversation within this process.
    pub(crate) async fn lock(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(conversation_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Runs `f` with the shared RNG. Never hold the result across an await.
    pub(crate) fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    /// Generated text for `request`, bounded by the generation timeout.
    pub(crate) async fn generate(&self, request: GenerationRequest) -> Result<String, RapportError> {
        let purpose = request.purpose;
        match tokio::time::timeout(self.generation_timeout, self.provider.complete(request)).await {
            Ok(Ok(response)) => {
                debug!(
                    %purpose,
                    output_tokens = response.usage.output_tokens,
                    "generation returned"
                );
                Ok(response.content)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RapportError::Timeout {
                duration: self.generation_timeout,
            }),
        }
    }

    pub(crate) async fn profile(&self, id: &str) -> Result<Profile, RapportError> {
        self.profiles
            .get_profile(id)
            .await?
            .ok_or_else(|| RapportError::Invariant(format!("no profile for participant {id}")))
    }

    /// Agent and counterpart profiles of `conversation`.
    pub(crate) async fn participants(
        &self,
        conversation: &Conversation,
    ) -> Result<(Profile, Profile), RapportError> {
        let agent = self.profile(&conversation.agent_id).await?;
        let counterpart = self.profile(&conversation.counterpart_id).await?;
        Ok((agent, counterpart))
    }

    pub(crate) async fn history(&self, conversation_id: &str) -> Result<Vec<Message>, RapportError> {
        self.storage
            .recent_messages(conversation_id, self.history_window)
            .await
    }

    /// Current context, or a fresh unpersisted one.
    pub(crate) async fn context(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationContext, RapportError> {
        Ok(self
            .storage
            .get_context(conversation_id)
            .await?
            .unwrap_or_else(|| {
                ConversationContext::new(conversation_id, self.relationship.initial_threshold)
            }))
    }

    /// True if either participant has blocked the other.
    pub(crate) async fn is_blocked_pair(&self, a: &str, b: &str) -> Result<bool, RapportError> {
        Ok(self.storage.is_blocked(a, b).await? || self.storage.is_blocked(b, a).await?)
    }

    /// Plans `segments` using the agent's local hour for the late-night modifier.
    pub(crate) fn plan(&self, segments: &[String], agent: &Profile) -> DispatchPlan {
        let hour = agent
            .utc_offset_minutes
            .map(|offset| local_hour(Utc::now(), offset));
        self.with_rng(|rng| self.timing.plan(segments, hour, rng))
    }

    /// Updated rolling summary, or `None` if generation or parsing failed.
    pub(crate) async fn summarize(
        &self,
        context: &ConversationContext,
        new_lines: &[String],
    ) -> Option<String> {
        let request = self.assembler.summary_request(context, new_lines);
        let raw = match self.generate(request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    conversation_id = %context.conversation_id,
                    error = %e,
                    "summary generation failed, keeping previous summary"
                );
                return None;
            }
        };
        match parse_summary(&raw, self.summary_max_chars) {
            Ok(summary) => Some(summary),
            Err(_) => {
                warn!(
                    conversation_id = %context.conversation_id,
                    raw = %raw,
                    "unusable summary output, keeping previous summary"
                );
                None
            }
        }
    }

    /// Applies `apply` to the latest context and writes it conditionally on
    /// the version read, re-reading on conflict.
    ///
    /// `apply` returns false to abandon the write; the result is then `None`.
    pub(crate) async fn commit(
        &self,
        conversation_id: &str,
        mut apply: impl FnMut(&mut ConversationContext) -> bool,
    ) -> Result<Option<ConversationContext>, RapportError> {
        for attempt in 1..=CONTEXT_WRITE_ATTEMPTS {
            let mut context = self.context(conversation_id).await?;
            let expected = context.version;
            if !apply(&mut context) {
                return Ok(None);
            }
            context.updated_at = Utc::now();

            if self.storage.save_context(&context, expected).await? {
                context.version = expected + 1;
                return Ok(Some(context));
            }
            debug!(
                conversation_id,
                attempt, expected, "context version conflict, retrying"
            );
        }
        Err(RapportError::Internal(format!(
            "context write for {conversation_id} conflicted {CONTEXT_WRITE_ATTEMPTS} times"
        )))
    }
}
