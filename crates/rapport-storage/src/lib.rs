// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Rapport conversation core.
//!
//! WAL-mode SQLite with embedded refinery migrations and a single writer
//! thread (tokio-rusqlite). Stores conversations, messages, the delayed
//! delivery queue, relationship contexts, blocks, profiles, and matches.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
