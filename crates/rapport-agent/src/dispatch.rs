// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sends a planned reply now or hands it to the delayed delivery queue.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rapport_core::error::RapportError;
use rapport_core::types::{Conversation, Message, NewScheduledMessage, PostSendEffect};
use rapport_core::StorageAdapter;
use rapport_pacing::{DispatchMode, DispatchPlan};
use tracing::{debug, error};

/// One transcript line as stored in the conversation context.
pub fn transcript_line(speaker: &str, content: &str) -> String {
    format!("{speaker}: {content}")
}

/// What happened to a planned reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// Persisted in this call, in order. Shorter than the plan when a write
    /// failed part-way; the remaining parts were dropped.
    Immediate { messages: Vec<Message> },
    /// Queued for the sweep, in send order.
    Deferred { scheduled_ids: Vec<i64> },
}

impl Dispatched {
    /// Number of parts that were persisted or queued.
    pub fn len(&self) -> usize {
        match self {
            Dispatched::Immediate { messages } => messages.len(),
            Dispatched::Deferred { scheduled_ids } => scheduled_ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Executes a [`DispatchPlan`] against storage.
pub struct Dispatcher {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    simulate_latency: bool,
}

impl Dispatcher {
    pub fn new(storage: Arc<dyn StorageAdapter + Send + Sync>, simulate_latency: bool) -> Self {
        Self {
            storage,
            simulate_latency,
        }
    }

    /// Sends `plan` from the conversation's agent.
    ///
    /// Immediate plans sleep through each offset and insert the messages
    /// directly. Deferred plans enqueue every part at the moment its typing
    /// would start, each carrying a transcript line written by `speaker`.
    pub async fn dispatch(
        &self,
        conversation: &Conversation,
        plan: &DispatchPlan,
        speaker: &str,
    ) -> Result<Dispatched, RapportError> {
        match plan.mode {
            DispatchMode::Immediate => Ok(Dispatched::Immediate {
                messages: self.send_now(conversation, plan).await,
            }),
            DispatchMode::Deferred => {
                let scheduled_ids = self
                    .enqueue(conversation, plan, speaker, Utc::now())
                    .await?;
                Ok(Dispatched::Deferred { scheduled_ids })
            }
        }
    }

    async fn send_now(&self, conversation: &Conversation, plan: &DispatchPlan) -> Vec<Message> {
        let mut sent = Vec::with_capacity(plan.segments.len());
        let mut elapsed = Duration::ZERO;

        for segment in &plan.segments {
            self.pause(segment.send_offset.saturating_sub(elapsed)).await;
            elapsed = segment.send_offset;

            let message =
                Message::from_agent(&conversation.id, &conversation.agent_id, &segment.content);
            if let Err(e) = self.storage.insert_message(&message).await {
                error!(
                    conversation_id = %conversation.id,
                    error = %e,
                    sent = sent.len(),
                    remaining = plan.segments.len() - sent.len(),
                    "immediate send failed, dropping remaining parts"
                );
                break;
            }
            debug!(conversation_id = %conversation.id, message_id = %message.id, "message sent");
            sent.push(message);
        }
        sent
    }

    async fn enqueue(
        &self,
        conversation: &Conversation,
        plan: &DispatchPlan,
        speaker: &str,
        start: DateTime<Utc>,
    ) -> Result<Vec<i64>, RapportError> {
        let mut ids = Vec::with_capacity(plan.segments.len());

        for segment in &plan.segments {
            let offset = chrono::Duration::from_std(segment.typing_starts_at())
                .map_err(|e| RapportError::Internal(format!("dispatch offset out of range: {e}")))?;
            let entry = NewScheduledMessage {
                conversation_id: conversation.id.clone(),
                sender_id: conversation.agent_id.clone(),
                content: segment.content.clone(),
                scheduled_at: start + offset,
                effects: vec![PostSendEffect::AppendTranscript {
                    line: transcript_line(speaker, &segment.content),
                }],
            };
            match self.storage.enqueue_scheduled(&entry).await {
                Ok(id) => {
                    debug!(
                        conversation_id = %conversation.id,
                        scheduled_id = id,
                        scheduled_at = %entry.scheduled_at,
                        "message queued"
                    );
                    ids.push(id);
                }
                Err(e) => {
                    error!(
                        conversation_id = %conversation.id,
                        error = %e,
                        queued = ids.len(),
                        "enqueue failed, dropping remaining parts"
                    );
                    break;
                }
            }
        }
        Ok(ids)
    }

    async fn pause(&self, duration: Duration) {
        if self.simulate_latency && !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
