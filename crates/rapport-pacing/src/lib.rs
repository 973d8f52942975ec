// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pacing for outbound agent messages.
//!
//! [`timing`] decides how long the agent "thinks" and "types" before each
//! message and whether a reply is held in-process or queued. [`segment`]
//! splits one generated blob into the discrete messages that get paced.
//! Both are pure over an injected RNG.

pub mod segment;
pub mod timing;

pub use segment::Segmenter;
pub use timing::{DispatchMode, DispatchPlan, PlannedSegment, TimingModel, TypingProfile};
