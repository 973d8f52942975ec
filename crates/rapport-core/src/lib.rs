// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Rapport conversation core.
//!
//! This crate provides the adapter trait definitions, the error type, and the
//! domain types (conversations, messages, scheduled messages, relationship
//! contexts) used throughout the Rapport workspace.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::RapportError;
pub use types::{AdapterType, HealthStatus};

pub use traits::{MatchAdapter, PluginAdapter, ProfileAdapter, ProviderAdapter, StorageAdapter};
