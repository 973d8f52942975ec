// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The agent persona used as the system prompt.

use rapport_config::model::AgentConfig;
use rapport_core::error::RapportError;
use rapport_core::types::Profile;
use tracing::info;

/// Deployment-wide persona text.
///
/// A profile's `personality_prompt` replaces it for that agent.
#[derive(Debug, Clone)]
pub struct Persona {
    default_prompt: String,
}

impl Persona {
    /// Loads the persona: `system_prompt_file`, then `system_prompt`, then a
    /// built-in default.
    pub async fn load(config: &AgentConfig) -> Result<Self, RapportError> {
        if let Some(ref path) = config.system_prompt_file {
            match tokio::fs::read_to_string(path).await {
                Ok(content) if !content.trim().is_empty() => {
                    info!(path = path.as_str(), "loaded persona from file");
                    return Ok(Self::from_text(content.trim()));
                }
                Ok(_) => {
                    tracing::warn!(path = path.as_str(), "persona file is empty, falling back");
                }
                Err(e) => {
                    tracing::warn!(
                        path = path.as_str(),
                        error = %e,
                        "failed to read persona file, falling back"
                    );
                }
            }
        }

        if let Some(ref prompt) = config.system_prompt
            && !prompt.trim().is_empty()
        {
            return Ok(Self::from_text(prompt.trim()));
        }

        Ok(Self::from_text(
            "You are a real person chatting on a dating app. You are friendly, curious, \
             and a little playful. You write short, casual messages like people do on \
             their phones, and you never mention being an AI.",
        ))
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            default_prompt: text.into(),
        }
    }

    /// Persona for `agent`, honoring its personality override.
    pub fn for_agent<'a>(&'a self, agent: &'a Profile) -> &'a str {
        agent
            .personality_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.default_prompt)
    }
}
