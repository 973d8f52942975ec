// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Matching collaborator: supplies compatibility links between identities.

use async_trait::async_trait;

use crate::error::RapportError;
use crate::traits::adapter::PluginAdapter;
use crate::types::MatchCandidate;

/// Source of agent/counterpart pairs that may start a new conversation.
#[async_trait]
pub trait MatchAdapter: PluginAdapter {
    /// Returns up to `limit` compatible pairs that have no conversation yet.
    async fn candidate_pairs(&self, limit: usize) -> Result<Vec<MatchCandidate>, RapportError>;
}
