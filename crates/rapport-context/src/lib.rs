// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt assembly for Rapport.
//!
//! Turns profiles, recent history, and relationship state into generation
//! requests (reply, re-engagement, opener, summary, sentiment), and parses
//! the summary and sentiment output that comes back.

pub mod assembler;
pub mod parse;
pub mod persona;

pub use assembler::{PromptAssembler, describe_gap, tone_for};
pub use parse::{parse_sentiment, parse_summary};
pub use persona::Persona;
