// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared startup: tracing and agent assembly.

use std::sync::Arc;

use rapport_agent::{Adapters, Agent};
use rapport_anthropic::AnthropicProvider;
use rapport_config::RapportConfig;
use rapport_context::Persona;
use rapport_core::{RapportError, StorageAdapter};
use rapport_storage::SqliteStorage;
use tracing::info;

/// A ready agent plus the storage handle needed to close it.
pub struct App {
    pub agent: Arc<Agent>,
    pub storage: Arc<SqliteStorage>,
}

impl App {
    /// Opens storage, builds the provider, loads the persona and wires the agent.
    pub async fn start(config: &RapportConfig) -> Result<Self, RapportError> {
        let storage = {
            let storage = SqliteStorage::new(config.storage.clone());
            storage.initialize().await?;
            Arc::new(storage)
        };
        let provider = Arc::new(AnthropicProvider::new(config)?);
        let persona = Persona::load(&config.agent).await?;

        let adapters = Adapters {
            storage: storage.clone(),
            profiles: storage.clone(),
            matches: storage.clone(),
            provider,
        };
        let agent = Arc::new(Agent::new(adapters, config, persona));
        info!(agent = config.agent.name, database = config.storage.database_path, "agent ready");
        Ok(Self { agent, storage })
    }

    pub async fn close(&self) -> Result<(), RapportError> {
        self.storage.close().await
    }
}

/// Installs the fmt subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rapport={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
