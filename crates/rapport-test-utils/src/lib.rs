// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Rapport integration tests.
//!
//! # Components
//!
//! - [`MockProvider`] - Scripted generation provider, queued per purpose
//! - [`FailingStorage`] - Storage wrapper with switchable write failures
//! - [`TestHarness`] - Agent over a temp database and the mock provider

pub mod failing_storage;
pub mod harness;
pub mod mock_provider;

pub use failing_storage::FailingStorage;
pub use harness::{AGENT_ID, COUNTERPART_ID, TestHarness};
pub use mock_provider::{MockProvider, Scripted};
