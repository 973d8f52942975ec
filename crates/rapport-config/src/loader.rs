// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `/etc/rapport/rapport.toml`, then
//! `~/.config/rapport/rapport.toml`, then `./rapport.toml`, then `RAPPORT_*`
//! environment variables. Later layers override earlier ones.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::RapportConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/rapport/rapport.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "rapport.toml";

/// Sections addressable from the environment, most specific first so that
/// `RAPPORT_TIMING_LATE_NIGHT_ENABLED` lands in `timing.late_night.enabled`.
const ENV_SECTIONS: &[(&str, &str)] = &[
    ("timing_late_night_", "timing.late_night."),
    ("agent_", "agent."),
    ("storage_", "storage."),
    ("anthropic_", "anthropic."),
    ("generation_", "generation."),
    ("timing_", "timing."),
    ("relationship_", "relationship."),
    ("reengagement_", "reengagement."),
    ("initiation_", "initiation."),
    ("delivery_", "delivery."),
    ("triggers_", "triggers."),
];

/// Path of the per-user config file, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rapport").join("rapport.toml"))
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<RapportConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string over the compiled defaults.
///
/// No files and no environment variables are consulted.
pub fn load_config_from_str(toml_content: &str) -> Result<RapportConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RapportConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file, with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RapportConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RapportConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full layered Figment, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(RapportConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Maps a lowercased, prefix-stripped env var name to a dotted config key.
///
/// Section names are matched explicitly instead of splitting on `_`, since
/// field names such as `immediate_threshold_secs` contain underscores.
pub fn map_env_key(key: &str) -> String {
    for (prefix, dotted) in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(prefix) {
            return format!("{dotted}{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("RAPPORT_").map(|key| map_env_key(key.as_str()).into())
}
