// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds generation requests from profiles, history, and relationship state.

use rapport_config::model::{GenerationConfig, RelationshipConfig};
use rapport_core::error::RapportError;
use rapport_core::types::{
    ConversationContext, GenerationPurpose, GenerationRequest, Message, Profile,
};

use crate::persona::Persona;

const SUMMARY_PROMPT: &str = "You maintain a short running summary of a chat between two people. \
Keep names, facts each person shared about themselves, plans, and the emotional tone. \
Drop greetings and small talk. Reply with the updated summary only, prefixed with \"Summary:\".";

const SENTIMENT_PROMPT: &str = "You score how the latest exchange in a chat affects the relationship. \
Reply with a single signed decimal number and nothing else.";

/// Tone guidance from the current strain level. Bands are checked in order.
const TONE_BANDS: &[(f64, &str)] = &[
    (0.3, "You feel comfortable and warm toward them. Be open and affectionate."),
    (0.6, "You are friendly but still getting to know them."),
    (0.85, "You are wary. Keep replies short and a little guarded."),
    (f64::INFINITY, "You are close to losing interest. Be curt and distant."),
];

/// Composes the requests sent to the generation service.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    persona: Persona,
    generation: GenerationConfig,
    max_adjustment: f64,
}

impl PromptAssembler {
    pub fn new(
        persona: Persona,
        generation: GenerationConfig,
        relationship: &RelationshipConfig,
    ) -> Self {
        Self {
            persona,
            generation,
            max_adjustment: relationship.max_adjustment,
        }
    }

    pub fn generation(&self) -> &GenerationConfig {
        &self.generation
    }

    /// Reply to `inbound`. `history` is chronological and may include `inbound`.
    pub fn reply_request(
        &self,
        agent: &Profile,
        counterpart: &Profile,
        context: &ConversationContext,
        history: &[Message],
        inbound: &Message,
    ) -> Result<GenerationRequest, RapportError> {
        require_display_name(agent)?;
        require_display_name(counterpart)?;

        let mut prompt = self.framing(agent, counterpart, context);
        prompt.push_str(&format_history(agent, counterpart, history));
        prompt.push_str(&format!(
            "\n{} just said: \"{}\"\n\nWrite your reply.",
            counterpart.display_name,
            inbound.content.trim()
        ));

        Ok(self.conversational(GenerationPurpose::Reply, agent, prompt))
    }

    /// Follow-up after the agent's own message went unanswered for `gap`.
    pub fn reengage_request(
        &self,
        agent: &Profile,
        counterpart: &Profile,
        context: &ConversationContext,
        history: &[Message],
        gap: chrono::Duration,
    ) -> Result<GenerationRequest, RapportError> {
        require_display_name(agent)?;
        require_display_name(counterpart)?;

        let mut prompt = self.framing(agent, counterpart, context);
        prompt.push_str(&format_history(agent, counterpart, history));
        prompt.push_str(&format!(
            "\nYou sent the last message {} ago and {} has not replied. \
             Send a natural follow-up that does not guilt them for the silence.",
            describe_gap(gap),
            counterpart.display_name
        ));

        Ok(self.conversational(GenerationPurpose::Reengage, agent, prompt))
    }

    /// Opening line for a brand-new conversation with a compatible match.
    pub fn initiate_request(
        &self,
        agent: &Profile,
        counterpart: &Profile,
        compatibility: f64,
    ) -> Result<GenerationRequest, RapportError> {
        require_display_name(agent)?;
        require_display_name(counterpart)?;

        let mut prompt = format!(
            "You are {} and you just matched with {} (compatibility {:.0}%).\n",
            agent.display_name,
            counterpart.display_name,
            (compatibility.clamp(0.0, 1.0) * 100.0)
        );
        prompt.push_str(&describe_profile("About them", counterpart));
        prompt.push_str("\nYou have never talked before. Write a short, specific opening message.");

        Ok(self.conversational(GenerationPurpose::Initiate, agent, prompt))
    }

    /// Rolling-summary update from the previous summary and new transcript lines.
    pub fn summary_request(
        &self,
        context: &ConversationContext,
        new_lines: &[String],
    ) -> GenerationRequest {
        let previous = if context.summary.is_empty() {
            "(none yet)"
        } else {
            context.summary.as_str()
        };
        let prompt = format!(
            "Current summary:\n{previous}\n\nNew messages:\n{}\n\n\
             Write the updated summary in at most {} characters.",
            new_lines.join("\n"),
            self.generation.summary_max_chars
        );
        GenerationRequest {
            purpose: GenerationPurpose::Summary,
            model: None,
            system_prompt: Some(SUMMARY_PROMPT.to_string()),
            prompt,
            max_tokens: self.generation.summary_max_tokens,
        }
    }

    /// Scores one inbound message and the agent's reply to it.
    pub fn sentiment_request(
        &self,
        counterpart: &Profile,
        inbound: &str,
        reply: &[String],
    ) -> GenerationRequest {
        let prompt = format!(
            "{name}: {inbound}\nYou: {reply}\n\n\
             How did {name}'s message make you feel about them? Answer with one number \
             between -{max:.2} (hurtful, rude, or creepy) and +{max:.2} (kind, engaging), \
             where 0 is neutral.",
            name = counterpart.display_name,
            inbound = inbound.trim(),
            reply = reply.join(" "),
            max = self.max_adjustment,
        );
        GenerationRequest {
            purpose: GenerationPurpose::Sentiment,
            model: None,
            system_prompt: Some(SENTIMENT_PROMPT.to_string()),
            prompt,
            max_tokens: self.generation.sentiment_max_tokens,
        }
    }

    fn framing(
        &self,
        agent: &Profile,
        counterpart: &Profile,
        context: &ConversationContext,
    ) -> String {
        let mut out = format!(
            "You are {} chatting with {}.\n",
            agent.display_name, counterpart.display_name
        );
        out.push_str(&describe_profile("About them", counterpart));
        out.push_str(tone_for(context.threshold));
        out.push('\n');
        if !context.summary.is_empty() {
            out.push_str(&format!("\nWhat you know so far: {}\n", context.summary));
        }
        out
    }

    fn conversational(
        &self,
        purpose: GenerationPurpose,
        agent: &Profile,
        prompt: String,
    ) -> GenerationRequest {
        let system_prompt = format!(
            "{}\n\nIf you want to send more than one chat message, separate them with {}. \
             Use plain text without markdown.",
            self.persona.for_agent(agent),
            self.generation.delimiter
        );
        GenerationRequest {
            purpose,
            model: None,
            system_prompt: Some(system_prompt),
            prompt,
            max_tokens: self.generation.reply_max_tokens,
        }
    }
}

fn require_display_name(profile: &Profile) -> Result<(), RapportError> {
    if profile.display_name.trim().is_empty() {
        return Err(RapportError::Invariant(format!(
            "profile {} has no display name",
            profile.id
        )));
    }
    Ok(())
}

/// Tone guidance for a strain value.
pub fn tone_for(threshold: f64) -> &'static str {
    TONE_BANDS
        .iter()
        .find(|(upper, _)| threshold < *upper)
        .map(|(_, tone)| *tone)
        .unwrap_or(TONE_BANDS[TONE_BANDS.len() - 1].1)
}

fn describe_profile(heading: &str, profile: &Profile) -> String {
    let mut facts = Vec::new();
    if let Some(ref date) = profile.birth_date {
        facts.push(format!("born {date}"));
    }
    if let Some(ref place) = profile.birth_place {
        facts.push(format!("from {place}"));
    }
    if let Some(serde_json::Value::Object(ref attrs)) = profile.attributes {
        for (key, value) in attrs {
            match value {
                serde_json::Value::String(s) => facts.push(format!("{key}: {s}")),
                serde_json::Value::Null => {}
                other => facts.push(format!("{key}: {other}")),
            }
        }
    }
    if facts.is_empty() {
        String::new()
    } else {
        format!("{heading}: {}.\n", facts.join("; "))
    }
}

fn format_history(agent: &Profile, counterpart: &Profile, history: &[Message]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = history
        .iter()
        .map(|m| {
            let speaker = if m.sender_id == agent.id {
                "You"
            } else if m.sender_id == counterpart.id {
                counterpart.display_name.as_str()
            } else {
                m.sender_id.as_str()
            };
            format!("{speaker}: {}", m.content)
        })
        .collect();
    format!("\nRecent messages:\n{}\n", lines.join("\n"))
}

/// Coarse human phrasing of a silence, e.g. "3 hours" or "2 days".
pub fn describe_gap(gap: chrono::Duration) -> String {
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit}")
        } else {
            format!("{n} {unit}s")
        }
    };
    let days = gap.num_days();
    if days >= 1 {
        return plural(days, "day");
    }
    let hours = gap.num_hours();
    if hours >= 1 {
        return plural(hours, "hour");
    }
    plural(gap.num_minutes().max(1), "minute")
}
