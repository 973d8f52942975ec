// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only profile store.

use async_trait::async_trait;

use crate::error::RapportError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Profile;

/// Lookup of identity data used to frame prompts.
#[async_trait]
pub trait ProfileAdapter: PluginAdapter {
    /// Returns the profile for `id`, or `None` if the identity is unknown.
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, RapportError>;
}
