// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Rapport conversation core.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Rapport configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to the nominal
/// production values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RapportConfig {
    /// Agent persona and process settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Anthropic API settings for the generation adapter.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Generation request shaping and output parsing.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Human-like delivery timing.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Relationship strain tracking and termination.
    #[serde(default)]
    pub relationship: RelationshipConfig,

    /// Re-engagement of dormant conversations.
    #[serde(default)]
    pub reengagement: ReengagementConfig,

    /// Opening brand-new conversations from compatibility matches.
    #[serde(default)]
    pub initiation: InitiationConfig,

    /// Delayed delivery sweep.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Cadence of the `serve` trigger loop.
    #[serde(default)]
    pub triggers: TriggersConfig,
}

/// Agent persona and process configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Name used in logs.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Inline persona prompt. Overridden by `system_prompt_file` if both set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Path to a file containing the persona prompt.
    #[serde(default)]
    pub system_prompt_file: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            system_prompt: None,
            system_prompt_file: None,
        }
    }
}

fn default_agent_name() -> String {
    "rapport".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("rapport").join("rapport.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("rapport.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// API key. `None` falls back to the `ANTHROPIC_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for every generation request.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Anthropic API version header.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            api_version: default_api_version(),
        }
    }
}

fn default_model() -> String {
    "claude-haiku-4-5-20251001".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// Generation request shaping and output parsing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Upper bound on a single generation call.
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,

    /// Token bound for reply, re-engagement, and opener requests.
    #[serde(default = "default_reply_max_tokens")]
    pub reply_max_tokens: u32,

    /// Token bound for the rolling-summary request.
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,

    /// Token bound for the sentiment-scoring request.
    #[serde(default = "default_sentiment_max_tokens")]
    pub sentiment_max_tokens: u32,

    /// Number of recent messages included in a reply prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Maximum length of the stored rolling summary, in characters.
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,

    /// Reserved string separating discrete messages in generated output.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_generation_timeout_secs(),
            reply_max_tokens: default_reply_max_tokens(),
            summary_max_tokens: default_summary_max_tokens(),
            sentiment_max_tokens: default_sentiment_max_tokens(),
            history_window: default_history_window(),
            summary_max_chars: default_summary_max_chars(),
            delimiter: default_delimiter(),
        }
    }
}

fn default_generation_timeout_secs() -> u64 {
    30
}

fn default_reply_max_tokens() -> u32 {
    400
}

fn default_summary_max_tokens() -> u32 {
    200
}

fn default_sentiment_max_tokens() -> u32 {
    16
}

fn default_history_window() -> usize {
    10
}

fn default_summary_max_chars() -> usize {
    600
}

fn default_delimiter() -> String {
    "|||".to_string()
}

/// Human-like delivery timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    /// Fixed floor for typing delays of segmented replies.
    #[serde(default = "default_typing_base_ms")]
    pub typing_base_ms: u64,

    /// Cap for typing delays of segmented replies.
    #[serde(default = "default_typing_cap_ms")]
    pub typing_cap_ms: u64,

    /// Lower bound of the randomized typing speed (characters per minute).
    #[serde(default = "default_min_chars_per_minute")]
    pub min_chars_per_minute: u32,

    /// Upper bound of the randomized typing speed (characters per minute).
    #[serde(default = "default_max_chars_per_minute")]
    pub max_chars_per_minute: u32,

    /// Maximum random jitter added to every typing delay.
    #[serde(default = "default_typing_jitter_ms")]
    pub typing_jitter_ms: u64,

    /// Floor for the single-message (unsegmented) typing delay.
    #[serde(default = "default_single_message_base_ms")]
    pub single_message_base_ms: u64,

    /// Cap for the single-message typing delay.
    #[serde(default = "default_single_message_cap_ms")]
    pub single_message_cap_ms: u64,

    /// Fixed typing speed for the single-message path.
    #[serde(default = "default_single_message_chars_per_minute")]
    pub single_message_chars_per_minute: u32,

    /// Minimum pause between parts of a multi-part reply.
    #[serde(default = "default_gap_min_secs")]
    pub gap_min_secs: u64,

    /// Maximum pause between parts of a multi-part reply.
    #[serde(default = "default_gap_max_secs")]
    pub gap_max_secs: u64,

    /// Replies whose total delay is below this are held in-process;
    /// anything longer goes through the delayed delivery queue.
    #[serde(default = "default_immediate_threshold_secs")]
    pub immediate_threshold_secs: u64,

    /// When false, delays are still computed and recorded but never slept.
    #[serde(default = "default_simulate_latency")]
    pub simulate_latency: bool,

    /// Extra response delay during the agent's local night.
    #[serde(default)]
    pub late_night: LateNightConfig,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            typing_base_ms: default_typing_base_ms(),
            typing_cap_ms: default_typing_cap_ms(),
            min_chars_per_minute: default_min_chars_per_minute(),
            max_chars_per_minute: default_max_chars_per_minute(),
            typing_jitter_ms: default_typing_jitter_ms(),
            single_message_base_ms: default_single_message_base_ms(),
            single_message_cap_ms: default_single_message_cap_ms(),
            single_message_chars_per_minute: default_single_message_chars_per_minute(),
            gap_min_secs: default_gap_min_secs(),
            gap_max_secs: default_gap_max_secs(),
            immediate_threshold_secs: default_immediate_threshold_secs(),
            simulate_latency: default_simulate_latency(),
            late_night: LateNightConfig::default(),
        }
    }
}

fn default_typing_base_ms() -> u64 {
    500
}

fn default_typing_cap_ms() -> u64 {
    5_000
}

fn default_min_chars_per_minute() -> u32 {
    60
}

fn default_max_chars_per_minute() -> u32 {
    180
}

fn default_typing_jitter_ms() -> u64 {
    400
}

fn default_single_message_base_ms() -> u64 {
    2_000
}

fn default_single_message_cap_ms() -> u64 {
    45_000
}

fn default_single_message_chars_per_minute() -> u32 {
    250
}

fn default_gap_min_secs() -> u64 {
    2
}

fn default_gap_max_secs() -> u64 {
    20
}

fn default_immediate_threshold_secs() -> u64 {
    50
}

fn default_simulate_latency() -> bool {
    true
}

/// Late-night response delay modifier.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LateNightConfig {
    #[serde(default)]
    pub enabled: bool,

    /// First local hour (inclusive) considered late night.
    #[serde(default = "default_late_night_start_hour")]
    pub start_hour: u32,

    /// Local hour (exclusive) at which late night ends.
    #[serde(default = "default_late_night_end_hour")]
    pub end_hour: u32,

    /// Upper bound of the uniformly drawn extra delay.
    #[serde(default = "default_late_night_extra_max_ms")]
    pub extra_max_ms: u64,
}

impl Default for LateNightConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start_hour: default_late_night_start_hour(),
            end_hour: default_late_night_end_hour(),
            extra_max_ms: default_late_night_extra_max_ms(),
        }
    }
}

fn default_late_night_start_hour() -> u32 {
    0
}

fn default_late_night_end_hour() -> u32 {
    6
}

fn default_late_night_extra_max_ms() -> u64 {
    20_000
}

/// Relationship strain tracking.
///
/// The threshold measures strain: `new = clamp(old - adjustment, 0, 1)`, so
/// positive sentiment lowers it and negative sentiment raises it. Reaching
/// 1.0 ends the relationship.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelationshipConfig {
    /// Strain value of a brand-new conversation.
    #[serde(default = "default_initial_threshold")]
    pub initial_threshold: f64,

    /// Scored sentiment is clamped to `[-max_adjustment, max_adjustment]`.
    #[serde(default = "default_max_adjustment")]
    pub max_adjustment: f64,

    /// Adjustments strictly below this count as negative exchanges.
    #[serde(default = "default_negative_sentiment_threshold")]
    pub negative_sentiment_threshold: f64,

    /// Consecutive negative exchanges that also end the relationship. `0` disables.
    #[serde(default)]
    pub max_consecutive_negative: u32,

    /// Farewell lines; one is picked at random for a terminating turn.
    #[serde(default = "default_termination_messages")]
    pub termination_messages: Vec<String>,

    /// Delay before the farewell is delivered.
    #[serde(default = "default_termination_delay_secs")]
    pub termination_delay_secs: u64,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            initial_threshold: default_initial_threshold(),
            max_adjustment: default_max_adjustment(),
            negative_sentiment_threshold: default_negative_sentiment_threshold(),
            max_consecutive_negative: 0,
            termination_messages: default_termination_messages(),
            termination_delay_secs: default_termination_delay_secs(),
        }
    }
}

fn default_initial_threshold() -> f64 {
    0.5
}

fn default_max_adjustment() -> f64 {
    0.2
}

fn default_negative_sentiment_threshold() -> f64 {
    -0.05
}

fn default_termination_messages() -> Vec<String> {
    vec![
        "I don't think this is working out. Take care.".to_string(),
        "I'm going to step away from this conversation. Goodbye.".to_string(),
        "This isn't right for me. Wishing you well.".to_string(),
    ]
}

fn default_termination_delay_secs() -> u64 {
    5
}

/// Re-engagement of conversations where the agent spoke last.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReengagementConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum silence since the agent's last message.
    #[serde(default = "default_reengage_min_gap_secs")]
    pub min_gap_secs: u64,

    /// Chance that an eligible conversation is re-engaged on a scan.
    #[serde(default = "default_reengage_probability")]
    pub probability: f64,

    /// Consecutive agent-initiated turns allowed before an inbound reply.
    #[serde(default = "default_reengage_max_attempts")]
    pub max_attempts: u32,

    /// Conversations examined per scan.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ReengagementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_gap_secs: default_reengage_min_gap_secs(),
            probability: default_reengage_probability(),
            max_attempts: default_reengage_max_attempts(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_reengage_min_gap_secs() -> u64 {
    3 * 60 * 60
}

fn default_reengage_probability() -> f64 {
    0.10
}

fn default_reengage_max_attempts() -> u32 {
    2
}

fn default_batch_size() -> usize {
    50
}

/// Opening new conversations from compatibility matches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InitiationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Chance that a match is opened on a scan.
    #[serde(default = "default_initiation_probability")]
    pub probability: f64,

    /// Matches examined per scan.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for InitiationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            probability: default_initiation_probability(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_initiation_probability() -> f64 {
    0.03
}

/// Delayed delivery sweep.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Maximum due entries handled by one sweep.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

/// Cadence of the periodic triggers driven by `rapport serve`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TriggersConfig {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_reengage_interval_secs")]
    pub reengage_interval_secs: u64,

    #[serde(default = "default_initiate_interval_secs")]
    pub initiate_interval_secs: u64,

    /// How often unprocessed inbound messages are polled.
    #[serde(default = "default_inbound_poll_interval_secs")]
    pub inbound_poll_interval_secs: u64,

    /// Reactions allowed to run at once.
    #[serde(default = "default_max_concurrent_reactions")]
    pub max_concurrent_reactions: usize,
}

impl Default for TriggersConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            reengage_interval_secs: default_reengage_interval_secs(),
            initiate_interval_secs: default_initiate_interval_secs(),
            inbound_poll_interval_secs: default_inbound_poll_interval_secs(),
            max_concurrent_reactions: default_max_concurrent_reactions(),
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_reengage_interval_secs() -> u64 {
    15 * 60
}

fn default_initiate_interval_secs() -> u64 {
    60 * 60
}

fn default_inbound_poll_interval_secs() -> u64 {
    5
}

fn default_max_concurrent_reactions() -> usize {
    8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_nominal_values() {
        let config = RapportConfig::default();
        assert_eq!(config.generation.history_window, 10);
        assert_eq!(config.generation.delimiter, "|||");
        assert_eq!(config.timing.immediate_threshold_secs, 50);
        assert_eq!(config.timing.gap_min_secs, 2);
        assert_eq!(config.timing.gap_max_secs, 20);
        assert_eq!(config.relationship.negative_sentiment_threshold, -0.05);
        assert_eq!(config.reengagement.min_gap_secs, 10_800);
        assert_eq!(config.reengagement.probability, 0.10);
        assert_eq!(config.reengagement.max_attempts, 2);
        assert_eq!(config.initiation.probability, 0.03);
        assert!(!config.timing.late_night.enabled);
    }

    #[test]
    fn default_database_path_ends_with_rapport_db() {
        let config = StorageConfig::default();
        assert!(config.database_path.ends_with("rapport.db"));
    }
}
