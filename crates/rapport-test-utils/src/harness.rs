// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete [`Agent`] over a temp SQLite database
//! and a [`MockProvider`], with latency simulation off and a fixed RNG seed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rapport_agent::{Adapters, Agent};
use rapport_config::RapportConfig;
use rapport_config::model::StorageConfig;
use rapport_context::Persona;
use rapport_core::types::{Conversation, ConversationContext, MatchCandidate, Message, Profile};
use rapport_core::{RapportError, StorageAdapter};
use rapport_storage::SqliteStorage;

use crate::failing_storage::FailingStorage;
use crate::mock_provider::MockProvider;

/// Identity of the agent participant created by [`TestHarness::pair`].
pub const AGENT_ID: &str = "agent-1";
/// Identity of the counterpart participant created by [`TestHarness::pair`].
pub const COUNTERPART_ID: &str = "user-1";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: RapportConfig,
    seed: u64,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = RapportConfig::default();
        config.timing.simulate_latency = false;
        config.timing.late_night.enabled = false;
        config.generation.timeout_secs = 2;
        Self { config, seed: 42 }
    }

    /// Adjusts the configuration before the agent is built.
    pub fn configure(mut self, f: impl FnOnce(&mut RapportConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build the harness, creating the temp database and the agent.
    pub async fn build(self) -> Result<TestHarness, RapportError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| RapportError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = self.config;
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };

        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;
        let failing = Arc::new(FailingStorage::new(storage.clone()));
        let provider = Arc::new(MockProvider::new());

        let adapters = Adapters {
            storage: failing.clone(),
            profiles: storage.clone(),
            matches: storage.clone(),
            provider: provider.clone(),
        };
        let persona = Persona::from_text("You are a test persona.");
        let agent = Agent::with_seed(adapters, &config, persona, self.seed);

        Ok(TestHarness {
            agent,
            storage,
            failing,
            provider,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock provider and temp storage.
pub struct TestHarness {
    pub agent: Agent,
    /// The real SQLite adapter, for seeding and assertions.
    pub storage: Arc<SqliteStorage>,
    /// The wrapper the agent writes through; flip its switches to inject failures.
    pub failing: Arc<FailingStorage>,
    pub provider: Arc<MockProvider>,
    pub config: RapportConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default settings.
    pub async fn new() -> Result<Self, RapportError> {
        Self::builder().build().await
    }

    /// Stores a profile.
    pub async fn profile(&self, id: &str, display_name: &str, is_agent: bool) -> Result<(), RapportError> {
        self.storage
            .upsert_profile(&Profile {
                id: id.to_string(),
                display_name: display_name.to_string(),
                is_agent,
                ..Profile::default()
            })
            .await
    }

    /// Creates the standard agent/counterpart profiles and their conversation.
    pub async fn pair(&self) -> Result<Conversation, RapportError> {
        self.profile(AGENT_ID, "Mia", true).await?;
        self.profile(COUNTERPART_ID, "Sam", false).await?;
        self.storage
            .get_or_create_conversation(AGENT_ID, COUNTERPART_ID)
            .await
    }

    /// Stores a compatibility match between two stored profiles.
    pub async fn add_match(&self, agent_id: &str, counterpart_id: &str, score: f64) -> Result<(), RapportError> {
        self.storage
            .upsert_match(&MatchCandidate {
                agent_id: agent_id.to_string(),
                counterpart_id: counterpart_id.to_string(),
                score,
            })
            .await
    }

    /// Stores an unprocessed message from the counterpart.
    pub async fn receive(&self, conversation: &Conversation, text: &str) -> Result<Message, RapportError> {
        self.receive_at(conversation, text, Utc::now()).await
    }

    pub async fn receive_at(
        &self,
        conversation: &Conversation,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<Message, RapportError> {
        let mut message = Message::from_agent(&conversation.id, &conversation.counterpart_id, text);
        message.processed = false;
        message.created_at = at;
        self.storage.insert_message(&message).await?;
        Ok(message)
    }

    /// Stores a message from the agent, as if sent at `at`.
    pub async fn agent_said_at(
        &self,
        conversation: &Conversation,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<Message, RapportError> {
        let mut message = Message::from_agent(&conversation.id, &conversation.agent_id, text);
        message.created_at = at;
        self.storage.insert_message(&message).await?;
        Ok(message)
    }

    /// Writes a context directly, replacing whatever is stored.
    pub async fn set_context(&self, mut context: ConversationContext) -> Result<(), RapportError> {
        let expected = self
            .storage
            .get_context(&context.conversation_id)
            .await?
            .map(|c| c.version)
            .unwrap_or(0);
        context.version = expected;
        if !self.storage.save_context(&context, expected).await? {
            return Err(RapportError::Internal("context seed conflicted".into()));
        }
        Ok(())
    }

    pub async fn context(&self, conversation: &Conversation) -> Result<Option<ConversationContext>, RapportError> {
        self.storage.get_context(&conversation.id).await
    }

    /// Messages sent by the agent in this conversation, oldest first.
    pub async fn agent_messages(&self, conversation: &Conversation) -> Result<Vec<Message>, RapportError> {
        Ok(self
            .storage
            .recent_messages(&conversation.id, 1_000)
            .await?
            .into_iter()
            .filter(|m| m.sender_id == conversation.agent_id)
            .collect())
    }
}
