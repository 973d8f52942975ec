// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait: the relational store and block store contracts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RapportError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Conversation, ConversationContext, DeliveryOutcome, DormantConversation, Message,
    NewScheduledMessage, ScheduledMessage, TerminationRecord,
};

/// Adapter for the persistent store behind conversations, messages, the
/// delayed delivery queue, relationship contexts, and blocks.
///
/// Every state transition that the core relies on for at-most-once behavior
/// is exposed as a conditional operation returning whether it took effect.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), RapportError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), RapportError>;

    // --- Conversations ---

    /// Returns the conversation for the unordered pair, creating it with
    /// `agent_id` as the agent side if none exists.
    async fn get_or_create_conversation(
        &self,
        agent_id: &str,
        counterpart_id: &str,
    ) -> Result<Conversation, RapportError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, RapportError>;

    /// Finds the conversation between two participants in either order.
    async fn find_conversation(
        &self,
        participant_a: &str,
        participant_b: &str,
    ) -> Result<Option<Conversation>, RapportError>;

    /// Conversations whose last message was sent by the agent at or before
    /// `cutoff`, excluding pairs where either side has blocked the other.
    async fn dormant_conversations(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DormantConversation>, RapportError>;

    // --- Messages ---

    async fn insert_message(&self, message: &Message) -> Result<(), RapportError>;

    async fn get_message(&self, id: &str) -> Result<Option<Message>, RapportError>;

    /// The last `limit` messages of a conversation, in chronological order.
    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, RapportError>;

    /// Sets `processed` on an unprocessed message. Returns false if the
    /// message was already processed (or does not exist).
    async fn claim_message(&self, id: &str) -> Result<bool, RapportError>;

    /// Unprocessed messages sent by counterparts, oldest first.
    async fn unprocessed_inbound(&self, limit: usize) -> Result<Vec<Message>, RapportError>;

    // --- Delayed delivery queue ---

    /// Persists a `pending` scheduled message. Returns its id.
    async fn enqueue_scheduled(&self, entry: &NewScheduledMessage) -> Result<i64, RapportError>;

    async fn get_scheduled(&self, id: i64) -> Result<Option<ScheduledMessage>, RapportError>;

    async fn list_scheduled(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ScheduledMessage>, RapportError>;

    /// Pending entries with `scheduled_at <= now`, oldest first.
    async fn due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduledMessage>, RapportError>;

    /// Atomically moves the entry `pending -> sent`, inserts `message`, and
    /// applies the entry's post-send effects.
    async fn deliver_scheduled(
        &self,
        id: i64,
        message: &Message,
    ) -> Result<DeliveryOutcome, RapportError>;

    /// Moves the entry `pending -> failed`. Returns false if it was no longer pending.
    async fn fail_scheduled(&self, id: i64, error: &str) -> Result<bool, RapportError>;

    // --- Relationship contexts ---

    async fn get_context(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationContext>, RapportError>;

    /// Writes `context` if the stored version still equals `expected_version`
    /// (`0` inserts a new row). The stored version becomes `expected_version + 1`.
    /// Returns false on a version conflict.
    async fn save_context(
        &self,
        context: &ConversationContext,
        expected_version: i64,
    ) -> Result<bool, RapportError>;

    // --- Blocks ---

    /// Records "blocker blocks blocked". Returns false if already recorded.
    async fn record_block(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RapportError>;

    async fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RapportError>;

    /// Applies a terminating turn in one transaction: enqueue the farewell,
    /// record the block, and write the context. Returns the farewell's
    /// scheduled id, or `None` if the context version or the block already
    /// changed underneath the caller (nothing is written in that case).
    async fn terminate(&self, record: &TerminationRecord) -> Result<Option<i64>, RapportError>;
}
