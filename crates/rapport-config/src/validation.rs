// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks run after deserialization.
//!
//! All problems are collected and returned together.

use crate::diagnostic::ConfigError;
use crate::model::RapportConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &RapportConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        errors.push(ConfigError::validation(
            "agent.log_level",
            format!("must be one of {}", LOG_LEVELS.join(", ")),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path",
            "must not be empty",
        ));
    }

    let generation = &config.generation;
    if generation.delimiter.trim().is_empty() {
        errors.push(ConfigError::validation(
            "generation.delimiter",
            "must contain a non-whitespace character",
        ));
    }
    if generation.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "generation.timeout_secs",
            "must be greater than zero",
        ));
    }
    if generation.history_window == 0 {
        errors.push(ConfigError::validation(
            "generation.history_window",
            "must be greater than zero",
        ));
    }

    let timing = &config.timing;
    if timing.min_chars_per_minute == 0 || timing.min_chars_per_minute > timing.max_chars_per_minute
    {
        errors.push(ConfigError::validation(
            "timing.min_chars_per_minute",
            format!(
                "must be positive and not exceed max_chars_per_minute ({})",
                timing.max_chars_per_minute
            ),
        ));
    }
    if timing.single_message_chars_per_minute == 0 {
        errors.push(ConfigError::validation(
            "timing.single_message_chars_per_minute",
            "must be greater than zero",
        ));
    }
    if timing.typing_base_ms == 0 || timing.typing_base_ms > timing.typing_cap_ms {
        errors.push(ConfigError::validation(
            "timing.typing_base_ms",
            "must be positive and not exceed typing_cap_ms",
        ));
    }
    if timing.single_message_base_ms == 0
        || timing.single_message_base_ms > timing.single_message_cap_ms
    {
        errors.push(ConfigError::validation(
            "timing.single_message_base_ms",
            "must be positive and not exceed single_message_cap_ms",
        ));
    }
    if timing.gap_min_secs > timing.gap_max_secs {
        errors.push(ConfigError::validation(
            "timing.gap_min_secs",
            format!("must not exceed gap_max_secs ({})", timing.gap_max_secs),
        ));
    }
    if timing.late_night.start_hour > 23 || timing.late_night.end_hour > 24 {
        errors.push(ConfigError::validation(
            "timing.late_night",
            "start_hour must be 0-23 and end_hour 0-24",
        ));
    }

    let relationship = &config.relationship;
    if !(0.0..=1.0).contains(&relationship.initial_threshold) {
        errors.push(ConfigError::validation(
            "relationship.initial_threshold",
            format!("must be within [0, 1], got {}", relationship.initial_threshold),
        ));
    }
    if !(relationship.max_adjustment > 0.0 && relationship.max_adjustment <= 1.0) {
        errors.push(ConfigError::validation(
            "relationship.max_adjustment",
            format!("must be within (0, 1], got {}", relationship.max_adjustment),
        ));
    }
    if relationship.termination_messages.is_empty()
        || relationship
            .termination_messages
            .iter()
            .any(|m| m.trim().is_empty())
    {
        errors.push(ConfigError::validation(
            "relationship.termination_messages",
            "must contain at least one non-empty message",
        ));
    }

    check_probability(&mut errors, "reengagement.probability", config.reengagement.probability);
    check_probability(&mut errors, "initiation.probability", config.initiation.probability);

    for (field, value) in [
        ("reengagement.batch_size", config.reengagement.batch_size),
        ("initiation.batch_size", config.initiation.batch_size),
        ("delivery.batch_size", config.delivery.batch_size),
        (
            "triggers.max_concurrent_reactions",
            config.triggers.max_concurrent_reactions,
        ),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(field, "must be greater than zero"));
        }
    }

    let triggers = &config.triggers;
    for (field, value) in [
        ("triggers.sweep_interval_secs", triggers.sweep_interval_secs),
        ("triggers.reengage_interval_secs", triggers.reengage_interval_secs),
        ("triggers.initiate_interval_secs", triggers.initiate_interval_secs),
        (
            "triggers.inbound_poll_interval_secs",
            triggers.inbound_poll_interval_secs,
        ),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(field, "must be greater than zero"));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check_probability(errors: &mut Vec<ConfigError>, field: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ConfigError::validation(
            field,
            format!("must be a probability in [0, 1], got {value}"),
        ));
    }
}
