// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions, one module per table group.

pub mod blocks;
pub mod contexts;
pub mod conversations;
pub mod messages;
pub mod profiles;
pub mod scheduled;
