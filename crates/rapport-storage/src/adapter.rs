// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage, profile, and match adapters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use rapport_config::model::StorageConfig;
use rapport_core::types::{
    Conversation, ConversationContext, DeliveryOutcome, DormantConversation, MatchCandidate,
    Message, NewScheduledMessage, Profile, ScheduledMessage, TerminationRecord,
};
use rapport_core::{
    AdapterType, HealthStatus, MatchAdapter, PluginAdapter, ProfileAdapter, RapportError,
    StorageAdapter,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed adapter.
///
/// The database is opened by [`StorageAdapter::initialize`]; every other
/// call fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, RapportError> {
        self.db
            .get()
            .ok_or_else(|| RapportError::storage("storage not initialized, call initialize() first"))
    }

    /// Inserts or replaces a profile.
    pub async fn upsert_profile(&self, profile: &Profile) -> Result<(), RapportError> {
        queries::profiles::upsert(self.db()?, profile).await
    }

    /// Inserts or re-scores a compatibility match.
    pub async fn upsert_match(&self, candidate: &MatchCandidate) -> Result<(), RapportError> {
        queries::profiles::upsert_match(self.db()?, candidate).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, RapportError> {
        self.db()?
            .connection()
            .call(|conn| conn.execute_batch("SELECT 1;"))
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RapportError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), RapportError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| RapportError::storage("storage already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), RapportError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Conversations ---

    async fn get_or_create_conversation(
        &self,
        agent_id: &str,
        counterpart_id: &str,
    ) -> Result<Conversation, RapportError> {
        queries::conversations::get_or_create(self.db()?, agent_id, counterpart_id).await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, RapportError> {
        queries::conversations::get(self.db()?, id).await
    }

    async fn find_conversation(
        &self,
        participant_a: &str,
        participant_b: &str,
    ) -> Result<Option<Conversation>, RapportError> {
        queries::conversations::find(self.db()?, participant_a, participant_b).await
    }

    async fn dormant_conversations(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DormantConversation>, RapportError> {
        queries::conversations::dormant(self.db()?, cutoff, limit).await
    }

    // --- Messages ---

    async fn insert_message(&self, message: &Message) -> Result<(), RapportError> {
        queries::messages::insert(self.db()?, message).await
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>, RapportError> {
        queries::messages::get(self.db()?, id).await
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, RapportError> {
        queries::messages::recent(self.db()?, conversation_id, limit).await
    }

    async fn claim_message(&self, id: &str) -> Result<bool, RapportError> {
        queries::messages::claim(self.db()?, id).await
    }

    async fn unprocessed_inbound(&self, limit: usize) -> Result<Vec<Message>, RapportError> {
        queries::messages::unprocessed_inbound(self.db()?, limit).await
    }

    // --- Delayed delivery queue ---

    async fn enqueue_scheduled(&self, entry: &NewScheduledMessage) -> Result<i64, RapportError> {
        queries::scheduled::enqueue(self.db()?, entry).await
    }

    async fn get_scheduled(&self, id: i64) -> Result<Option<ScheduledMessage>, RapportError> {
        queries::scheduled::get(self.db()?, id).await
    }

    async fn list_scheduled(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ScheduledMessage>, RapportError> {
        queries::scheduled::list_for_conversation(self.db()?, conversation_id).await
    }

    async fn due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduledMessage>, RapportError> {
        queries::scheduled::due(self.db()?, now, limit).await
    }

    async fn deliver_scheduled(
        &self,
        id: i64,
        message: &Message,
    ) -> Result<DeliveryOutcome, RapportError> {
        queries::scheduled::deliver(self.db()?, id, message).await
    }

    async fn fail_scheduled(&self, id: i64, error: &str) -> Result<bool, RapportError> {
        queries::scheduled::fail(self.db()?, id, error).await
    }

    // --- Relationship contexts ---

    async fn get_context(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationContext>, RapportError> {
        queries::contexts::get(self.db()?, conversation_id).await
    }

    async fn save_context(
        &self,
        context: &ConversationContext,
        expected_version: i64,
    ) -> Result<bool, RapportError> {
        queries::contexts::save(self.db()?, context, expected_version).await
    }

    // --- Blocks ---

    async fn record_block(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RapportError> {
        queries::blocks::record(self.db()?, blocker_id, blocked_id).await
    }

    async fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, RapportError> {
        queries::blocks::is_blocked(self.db()?, blocker_id, blocked_id).await
    }

    async fn terminate(&self, record: &TerminationRecord) -> Result<Option<i64>, RapportError> {
        queries::contexts::terminate(self.db()?, record).await
    }
}

#[async_trait]
impl ProfileAdapter for SqliteStorage {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, RapportError> {
        queries::profiles::get(self.db()?, id).await
    }
}

#[async_trait]
impl MatchAdapter for SqliteStorage {
    async fn candidate_pairs(&self, limit: usize) -> Result<Vec<MatchCandidate>, RapportError> {
        queries::profiles::open_matches(self.db()?, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn reports_adapter_identity() {
        let storage = SqliteStorage::new(make_config("unused.db"));
        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn calls_fail_before_initialize() {
        let storage = SqliteStorage::new(make_config("unused.db"));
        assert!(storage.health_check().await.is_err());
        assert!(storage.get_message("m1").await.is_err());
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn conversation_and_message_flow_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("flow.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let conv = storage
            .get_or_create_conversation("agent", "user")
            .await
            .unwrap();
        let reply = Message::from_agent(&conv.id, "agent", "hi there");
        storage.insert_message(&reply).await.unwrap();

        let recent = storage.recent_messages(&conv.id, 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "hi there");
        assert!(storage.unprocessed_inbound(10).await.unwrap().is_empty());

        storage.shutdown().await.unwrap();
        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn profiles_and_matches_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("profiles.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        storage
            .upsert_profile(&Profile {
                id: "agent".into(),
                display_name: "Mia".into(),
                is_agent: true,
                ..Default::default()
            })
            .await
            .unwrap();
        storage
            .upsert_match(&MatchCandidate {
                agent_id: "agent".into(),
                counterpart_id: "user".into(),
                score: 0.8,
            })
            .await
            .unwrap();

        let profile = storage.get_profile("agent").await.unwrap().unwrap();
        assert!(profile.is_agent);
        assert_eq!(storage.candidate_pairs(5).await.unwrap().len(), 1);
    }
}
