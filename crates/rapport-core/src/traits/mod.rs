// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the collaborators the core talks to.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod matching;
pub mod profile;
pub mod provider;
pub mod storage;

pub use adapter::PluginAdapter;
pub use matching::MatchAdapter;
pub use profile::ProfileAdapter;
pub use provider::ProviderAdapter;
pub use storage::StorageAdapter;
