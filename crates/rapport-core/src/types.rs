// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across adapter traits and the Rapport crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
    Profile,
    Match,
}

// --- Conversations and messages ---

/// A conversation between an automated agent and a counterpart.
///
/// There is exactly one conversation per unordered pair of participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    /// The automated participant whose replies this core produces.
    pub agent_id: String,
    /// The other participant (human or agent).
    pub counterpart_id: String,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Returns true if `participant_id` is one of the two participants.
    pub fn includes(&self, participant_id: &str) -> bool {
        self.agent_id == participant_id || self.counterpart_id == participant_id
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    /// Set once the engine has reacted to this message.
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Builds a message authored by the agent. Agent messages never need a
    /// reaction, so they are created already processed.
    pub fn from_agent(conversation_id: &str, agent_id: &str, content: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender_id: agent_id.to_string(),
            content: content.to_string(),
            processed: true,
            created_at: Utc::now(),
        }
    }
}

// --- Delayed delivery ---

/// Lifecycle of a scheduled message. `Sent` and `Failed` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Pending,
    Sent,
    Failed,
}

impl ScheduleStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScheduleStatus::Pending)
    }
}

/// A side effect applied in the same transaction that marks a scheduled
/// message as sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostSendEffect {
    /// Append a line to the conversation's detailed transcript.
    AppendTranscript { line: String },
}

/// A scheduled message before it has been persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScheduledMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub scheduled_at: DateTime<Utc>,
    pub effects: Vec<PostSendEffect>,
}

/// An entry in the delayed delivery queue.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledMessage {
    pub id: i64,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: ScheduleStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub effects: Vec<PostSendEffect>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of trying to deliver a scheduled message.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// The entry moved `pending -> sent` and the message was persisted.
    Sent,
    /// The entry was no longer pending; nothing was written.
    AlreadyHandled,
}

// --- Relationship state ---

/// Per-conversation relationship state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,
    /// Short, bounded, human-readable rolling summary.
    pub summary: String,
    /// Append-only detailed transcript, only used as summarization input.
    pub transcript: String,
    /// Accumulated relationship strain in `[0, 1]`. Reaching 1.0 blocks.
    pub threshold: f64,
    /// Consecutive exchanges scored below the negative-sentiment threshold.
    pub negative_streak: u32,
    /// Consecutive agent-initiated turns since the last inbound message.
    pub reengagement_attempts: u32,
    /// Optimistic concurrency version. `0` means not yet persisted.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl ConversationContext {
    /// A fresh, unpersisted context.
    pub fn new(conversation_id: &str, initial_threshold: f64) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            summary: String::new(),
            transcript: String::new(),
            threshold: initial_threshold,
            negative_streak: 0,
            reengagement_attempts: 0,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Appends lines to the transcript, one per line.
    pub fn append_transcript(&mut self, lines: &[String]) {
        for line in lines {
            if !self.transcript.is_empty() {
                self.transcript.push('\n');
            }
            self.transcript.push_str(line);
        }
    }
}

/// Everything written by a terminating turn, applied in one transaction.
#[derive(Debug, Clone)]
pub struct TerminationRecord {
    pub farewell: NewScheduledMessage,
    pub blocker_id: String,
    pub blocked_id: String,
    pub context: ConversationContext,
    /// Version the context was read at; the write fails on mismatch.
    pub expected_version: i64,
}

/// A conversation where the agent spoke last.
#[derive(Debug, Clone, PartialEq)]
pub struct DormantConversation {
    pub conversation: Conversation,
    pub last_agent_message_at: DateTime<Utc>,
}

// --- Profiles and matching ---

/// Read-only profile data used for prompt framing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    pub birth_date: Option<String>,
    pub birth_place: Option<String>,
    /// Free-form attributes passed through to the prompt, not interpreted.
    pub attributes: Option<serde_json::Value>,
    /// Replaces the default persona prompt when set.
    pub personality_prompt: Option<String>,
    /// Local time offset, used only for the late-night timing modifier.
    pub utc_offset_minutes: Option<i32>,
    pub is_agent: bool,
}

/// A compatibility link supplied by the matching collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub agent_id: String,
    pub counterpart_id: String,
    /// Opaque compatibility score.
    pub score: f64,
}

// --- Generation ---

/// What a generation request is for. Used for logging and by test doubles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum GenerationPurpose {
    Reply,
    Reengage,
    Initiate,
    Summary,
    Sentiment,
}

/// A request to the text-generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub purpose: GenerationPurpose,
    /// Model override; `None` uses the adapter's default.
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Token accounting reported by the generation service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Raw text returned by the generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn schedule_status_round_trips_as_lowercase() {
        for status in [
            ScheduleStatus::Pending,
            ScheduleStatus::Sent,
            ScheduleStatus::Failed,
        ] {
            let s = status.to_string();
            assert_eq!(s, s.to_lowercase());
            assert_eq!(ScheduleStatus::from_str(&s).unwrap(), status);
        }
        assert!(!ScheduleStatus::Pending.is_terminal());
        assert!(ScheduleStatus::Sent.is_terminal());
        assert!(ScheduleStatus::Failed.is_terminal());
    }

    #[test]
    fn post_send_effect_serializes_tagged() {
        let effects = vec![PostSendEffect::AppendTranscript {
            line: "agent: hi".into(),
        }];
        let json = serde_json::to_string(&effects).unwrap();
        assert_eq!(json, r#"[{"type":"append_transcript","line":"agent: hi"}]"#);
        let back: Vec<PostSendEffect> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, effects);
    }

    #[test]
    fn transcript_appends_with_newlines() {
        let mut ctx = ConversationContext::new("c1", 0.5);
        ctx.append_transcript(&["user: hey".into()]);
        ctx.append_transcript(&["agent: hi".into(), "agent: how are you?".into()]);
        assert_eq!(ctx.transcript, "user: hey\nagent: hi\nagent: how are you?");
        assert_eq!(ctx.version, 0);
    }

    #[test]
    fn agent_messages_are_created_processed() {
        let a = Message::from_agent("c1", "agent-1", "hello");
        let b = Message::from_agent("c1", "agent-1", "hello");
        assert!(a.processed);
        assert_ne!(a.id, b.id, "ids must be unique");
    }

    #[test]
    fn conversation_includes_both_participants() {
        let conv = Conversation {
            id: "c1".into(),
            agent_id: "a".into(),
            counterpart_id: "b".into(),
            created_at: Utc::now(),
        };
        assert!(conv.includes("a"));
        assert!(conv.includes("b"));
        assert!(!conv.includes("c"));
    }
}
