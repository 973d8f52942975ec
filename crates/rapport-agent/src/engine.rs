// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reaction to one inbound message.
//!
//! Order of a turn: claim, block check, reply generation, sentiment scoring,
//! termination decision, dispatch, summary, context write. Sentiment is
//! scored before anything is sent so a terminating turn never delivers the
//! normal reply.

use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;
use rapport_context::parse_sentiment;
use rapport_core::error::RapportError;
use rapport_core::types::{
    Conversation, ConversationContext, Message, NewScheduledMessage, PostSendEffect, Profile,
    TerminationRecord,
};
use rapport_pacing::DispatchPlan;
use tracing::{debug, info, warn};

use crate::dispatch::{Dispatched, transcript_line};
use crate::pipeline::Pipeline;

/// Attempts at the termination transaction before giving up.
const TERMINATION_ATTEMPTS: usize = 3;

/// How a reaction ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ReactionOutcome {
    /// The reply was sent or queued.
    Replied {
        plan: DispatchPlan,
        segments: Vec<String>,
    },
    /// Generation produced nothing sendable.
    NothingToSend,
    /// Strain reached its bound: a farewell was queued and the counterpart blocked.
    Terminated { scheduled_id: i64 },
    /// The pair is blocked; nothing was generated.
    Blocked,
    /// Another reaction already claimed this message.
    AlreadyProcessed,
    /// Generation failed or timed out. The message stays processed.
    GenerationFailed,
}

/// Sentiment-driven state changes computed for one exchange.
#[derive(Debug, Clone, Copy)]
struct StrainUpdate {
    adjustment: Option<f64>,
    negative_threshold: f64,
}

impl StrainUpdate {
    fn is_negative(&self) -> bool {
        self.adjustment
            .is_some_and(|adjustment| adjustment < self.negative_threshold)
    }

    /// Positive sentiment lowers strain, negative raises it.
    fn apply(&self, context: &mut ConversationContext) {
        if let Some(adjustment) = self.adjustment {
            context.threshold = (context.threshold - adjustment).clamp(0.0, 1.0);
            if self.is_negative() {
                context.negative_streak += 1;
            } else {
                context.negative_streak = 0;
            }
        }
        context.reengagement_attempts = 0;
    }
}

/// Reacts to inbound messages.
pub struct RelationshipEngine {
    pipeline: Arc<Pipeline>,
}

impl RelationshipEngine {
    pub(crate) fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    /// Runs one turn for the inbound message `message_id`.
    ///
    /// Generation failures end the turn with
    /// [`ReactionOutcome::GenerationFailed`]; storage and invariant errors
    /// are returned.
    pub async fn react(&self, message_id: &str) -> Result<ReactionOutcome, RapportError> {
        let p = &self.pipeline;
        let inbound = p
            .storage
            .get_message(message_id)
            .await?
            .ok_or_else(|| RapportError::Invariant(format!("unknown message {message_id}")))?;
        let conversation = p
            .storage
            .get_conversation(&inbound.conversation_id)
            .await?
            .ok_or_else(|| {
                RapportError::Invariant(format!(
                    "message {message_id} belongs to unknown conversation {}",
                    inbound.conversation_id
                ))
            })?;

        // Claimed before the lock: a reaction waiting its turn is already
        // out of the inbound poll.
        if !p.storage.claim_message(message_id).await? {
            debug!(message_id, "message already processed");
            return Ok(ReactionOutcome::AlreadyProcessed);
        }
        let _guard = p.lock(&conversation.id).await;

        if p
            .is_blocked_pair(&conversation.agent_id, &conversation.counterpart_id)
            .await?
        {
            info!(conversation_id = %conversation.id, message_id, "pair is blocked, not replying");
            return Ok(ReactionOutcome::Blocked);
        }

        let (agent, counterpart) = p.participants(&conversation).await?;
        let context = p.context(&conversation.id).await?;
        let history = p.history(&conversation.id).await?;

        let request = p
            .assembler
            .reply_request(&agent, &counterpart, &context, &history, &inbound)?;
        let blob = match p.generate(request).await {
            Ok(blob) => blob,
            Err(e) if e.is_generation_failure() => {
                warn!(
                    conversation_id = %conversation.id,
                    message_id,
                    error = %e,
                    "reply generation failed, turn abandoned"
                );
                return Ok(ReactionOutcome::GenerationFailed);
            }
            Err(e) => return Err(e),
        };

        let segments = p.segmenter.segment(&blob);
        if segments.is_empty() {
            warn!(
                conversation_id = %conversation.id,
                message_id,
                raw = %blob,
                "generated reply had no sendable parts"
            );
            return Ok(ReactionOutcome::NothingToSend);
        }

        let strain = StrainUpdate {
            adjustment: self.score(&conversation, &counterpart, &inbound, &segments).await,
            negative_threshold: p.relationship.negative_sentiment_threshold,
        };
        let heard = transcript_line(&counterpart.display_name, &inbound.content);

        let mut projected = context.clone();
        strain.apply(&mut projected);
        if self.should_terminate(&projected) {
            return self
                .terminate(&conversation, &agent, context, strain, heard)
                .await;
        }

        let plan = p.plan(&segments, &agent);
        let dispatched = p
            .dispatcher
            .dispatch(&conversation, &plan, &agent.display_name)
            .await?;

        let said: Vec<String> = segments
            .iter()
            .map(|s| transcript_line(&agent.display_name, s))
            .collect();
        let mut append = vec![heard.clone()];
        if let Dispatched::Immediate { messages } = &dispatched {
            append.extend(
                messages
                    .iter()
                    .map(|m| transcript_line(&agent.display_name, &m.content)),
            );
        }

        let mut new_lines = vec![heard];
        new_lines.extend(said);
        let summary = p.summarize(&context, &new_lines).await;

        let saved = p
            .commit(&conversation.id, |ctx| {
                strain.apply(ctx);
                if let Some(summary) = &summary {
                    ctx.summary = summary.clone();
                }
                ctx.append_transcript(&append);
                true
            })
            .await?;

        info!(
            conversation_id = %conversation.id,
            message_id,
            parts = dispatched.len(),
            immediate = plan.is_immediate(),
            total_ms = plan.total.as_millis() as u64,
            threshold = saved.as_ref().map(|c| c.threshold),
            "reply dispatched"
        );

        Ok(ReactionOutcome::Replied { plan, segments })
    }

    /// Sentiment adjustment for the exchange, or `None` if it could not be
    /// obtained. Failures leave the threshold untouched.
    async fn score(
        &self,
        conversation: &Conversation,
        counterpart: &Profile,
        inbound: &Message,
        reply: &[String],
    ) -> Option<f64> {
        let p = &self.pipeline;
        let request = p
            .assembler
            .sentiment_request(counterpart, &inbound.content, reply);
        let raw = match p.generate(request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    conversation_id = %conversation.id,
                    error = %e,
                    "sentiment generation failed, threshold unchanged"
                );
                return None;
            }
        };
        match parse_sentiment(&raw, p.relationship.max_adjustment) {
            Ok(adjustment) => {
                debug!(conversation_id = %conversation.id, adjustment, "sentiment scored");
                Some(adjustment)
            }
            Err(_) => {
                warn!(
                    conversation_id = %conversation.id,
                    raw = %raw,
                    "unusable sentiment output, threshold unchanged"
                );
                None
            }
        }
    }

    fn should_terminate(&self, context: &ConversationContext) -> bool {
        let limit = self.pipeline.relationship.max_consecutive_negative;
        context.threshold >= 1.0 || (limit > 0 && context.negative_streak >= limit)
    }

    /// Queues a farewell, records the block, and writes the context in one
    /// transaction. Retries on a context version conflict.
    async fn terminate(
        &self,
        conversation: &Conversation,
        agent: &Profile,
        mut context: ConversationContext,
        strain: StrainUpdate,
        heard: String,
    ) -> Result<ReactionOutcome, RapportError> {
        let p = &self.pipeline;
        let relationship = &p.relationship;
        let farewell = p
            .with_rng(|rng| relationship.termination_messages.choose(rng).cloned())
            .ok_or_else(|| RapportError::Invariant("no termination messages configured".into()))?;
        let delay = chrono::Duration::from_std(std::time::Duration::from_secs(
            relationship.termination_delay_secs,
        ))
        .map_err(|e| RapportError::Config(format!("termination_delay_secs out of range: {e}")))?;

        for attempt in 1..=TERMINATION_ATTEMPTS {
            if attempt > 1 {
                if p
                    .is_blocked_pair(&conversation.agent_id, &conversation.counterpart_id)
                    .await?
                {
                    return Ok(ReactionOutcome::Blocked);
                }
                context = p.context(&conversation.id).await?;
            }

            let expected_version = context.version;
            let mut updated = context.clone();
            strain.apply(&mut updated);
            updated.append_transcript(std::slice::from_ref(&heard));
            updated.updated_at = Utc::now();

            let record = TerminationRecord {
                farewell: NewScheduledMessage {
                    conversation_id: conversation.id.clone(),
                    sender_id: conversation.agent_id.clone(),
                    content: farewell.clone(),
                    scheduled_at: Utc::now() + delay,
                    effects: vec![PostSendEffect::AppendTranscript {
                        line: transcript_line(&agent.display_name, &farewell),
                    }],
                },
                blocker_id: conversation.agent_id.clone(),
                blocked_id: conversation.counterpart_id.clone(),
                context: updated,
                expected_version,
            };

            if let Some(scheduled_id) = p.storage.terminate(&record).await? {
                info!(
                    conversation_id = %conversation.id,
                    scheduled_id,
                    threshold = record.context.threshold,
                    negative_streak = record.context.negative_streak,
                    "relationship terminated, counterpart blocked"
                );
                return Ok(ReactionOutcome::Terminated { scheduled_id });
            }
            debug!(conversation_id = %conversation.id, attempt, "termination conflicted, retrying");
        }

        Err(RapportError::Internal(format!(
            "termination of {} conflicted {TERMINATION_ATTEMPTS} times",
            conversation.id
        )))
    }
}
