// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage wrapper that fails selected writes on demand.
//!
//! Every call is delegated to the wrapped adapter unless its failure switch
//! is on. Used to exercise persistence-failure paths against a real database.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rapport_core::types::{
    AdapterType, Conversation, ConversationContext, DeliveryOutcome, DormantConversation,
    HealthStatus, Message, NewScheduledMessage, ScheduledMessage, TerminationRecord,
};
use rapport_core::{PluginAdapter, RapportError, StorageAdapter};

/// Storage adapter with switchable write failures.
pub struct FailingStorage {
    inner: Arc<dyn StorageAdapter + Send + Sync>,
    fail_inserts: AtomicBool,
    fail_enqueues: AtomicBool,
    fail_deliveries: AtomicBool,
}

impl FailingStorage {
    pub fn new(inner: Arc<dyn StorageAdapter + Send + Sync>) -> Self {
        Self {
            inner,
            fail_inserts: AtomicBool::new(false),
            fail_enqueues: AtomicBool::new(false),
            fail_deliveries: AtomicBool::new(false),
        }
    }

    /// Makes `insert_message` fail.
    pub fn fail_inserts(&self, on: bool) {
        self.fail_inserts.store(on, Ordering::SeqCst);
    }

    /// Makes `enqueue_scheduled` fail.
    pub fn fail_enqueues(&self, on: bool) {
        self.fail_enqueues.store(on, Ordering::SeqCst);
    }

    /// Makes `deliver_scheduled` fail. `fail_scheduled` still succeeds.
    pub fn fail_deliveries(&self, on: bool) {
        self.fail_deliveries.store(on, Ordering::SeqCst);
    }

    fn check(&self, switch: &AtomicBool, operation: &str) -> Result<(), RapportError> {
        if switch.load(Ordering::SeqCst) {
            return Err(RapportError::storage(format!("injected failure: {operation}")));
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for FailingStorage {
    fn name(&self) -> &str {
        "failing-storage"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, RapportError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), RapportError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl StorageAdapter for FailingStorage {
    async fn initialize(&self) -> Result<(), RapportError> {
        self.inner.initialize().await
    }

    async fn close(&self) -> Result<(), RapportError> {
        self.inner.close().await
    }

    async fn get_or_create_conversation(
        &self,
        agent_id: &str,
        counterpart_id: &str,
    ) -> Result<Conversation, RapportError> {
        self.inner
            .get_or_create_conversation(agent_id, counterpart_id)
            .await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, RapportError> {
        self.inner.get_conversation(id).await
    }

    async fn find_conversation(
        &self,
        participant_a: &str,
        participant_b: &str,
    ) -> Result<Option<Conversation>, RapportError> {
        self.inner
            .find_conversation(participant_a, participant_b)
            .await
    }

    async fn dormant_conversations(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DormantConversation>, RapportError> {
        self.inner.dormant_conversations(cutoff, limit).await
    }

    async fn insert_message(&self, message: &Message) -> Result<(), RapportError> {
        self.check(&self.fail_inserts, "insert_message")?;
        self.inner.insert_message(message).await
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>, RapportError> {
        self.inner.get_message(id).await
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, RapportError> {
        self.inner.recent_messages(conversation_id, limit).await
    }

    async fn claim_message(&self, id: &str) -> Result<bool, RapportError> {
        self.inner.claim_message(id).await
    }

    async fn unprocessed_inbound(&self, limit: usize) -> Result<Vec<Message>, RapportError> {
        self.inner.unprocessed_inbound(limit).await
    }

    async fn enqueue_scheduled(&self, entry: &NewScheduledMessage) -> Result<i64, RapportError> {
        self.check(&self.fail_enqueues, "enqueue_scheduled")?;
        self.inner.enqueue_scheduled(entry).await
    }

    async fn get_scheduled(&self, id: i64) -> Result<Option<ScheduledMessage>, RapportError> {
        self.inner.get_scheduled(id).await
    }

    async fn list_scheduled(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ScheduledMessage>, RapportError> {
        self.inner.list_scheduled(conversation_id).await
    }

    async fn due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduledMessage>, RapportError> {
        self.inner.due_scheduled(now, limit).await
    }

    async fn deliver_scheduled(
        &self,
        id: i64,
        message: &Message,
    ) -> Result<DeliveryOutcome, RapportError> {
        self.check(&self.fail_deliveries, "deliver_scheduled")?;
        self.inner.deliver_scheduled(id, message).await
    }

    async fn fail_scheduled(&self, id: i64, error: &str) -> Result<bool, RapportError> {
        self.inner.fail_scheduled(id, error).await
    }

    async fn get_context(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationContext>, RapportError> {
        self.inner.get_context(conversation_id).await
    }

    async fn save_context(
        &self,
        context: &ConversationContext,
        expected_version: i64,
    ) -> Result<bool, RapportError> {
        self.inner.save_context(context, expected_version).await
    }

    async fn record_block(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RapportError> {
        self.inner.record_block(blocker_id, blocked_id).await
    }

    async fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RapportError> {
        self.inner.is_blocked(blocker_id, blocked_id).await
    }

    async fn terminate(&self, record: &TerminationRecord) -> Result<Option<i64>, RapportError> {
        self.inner.terminate(record).await
    }
}
