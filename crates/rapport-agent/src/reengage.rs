// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent-initiated turns: follow-ups in dormant conversations and openers
//! for new matches.
//!
//! Both scans are probabilistic and bounded. A follow-up is attempted only
//! while the context's attempt counter is below the limit; the counter is
//! claimed with a versioned write before anything is sent, so concurrent
//! scans cannot push it past the limit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use rapport_config::model::{InitiationConfig, ReengagementConfig};
use rapport_core::error::RapportError;
use rapport_core::types::{
    Conversation, ConversationContext, DormantConversation, GenerationRequest, MatchCandidate,
    Profile,
};
use rapport_core::MatchAdapter;
use tracing::{debug, info, warn};

use crate::dispatch::{Dispatched, transcript_line};
use crate::pipeline::Pipeline;

/// Counts from one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub examined: usize,
    pub engaged: usize,
    /// Attempt limit reached, or the pair already has a conversation.
    pub skipped_limit: usize,
    /// The Bernoulli trial failed.
    pub skipped_roll: usize,
    pub skipped_blocked: usize,
    pub failed: usize,
}

/// Per-candidate result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Engaged,
    SkippedLimit,
    SkippedRoll,
    SkippedBlocked,
}

impl ScanReport {
    fn record(&mut self, decision: Result<Decision, RapportError>, conversation: &str) {
        match decision {
            Ok(Decision::Engaged) => self.engaged += 1,
            Ok(Decision::SkippedLimit) => self.skipped_limit += 1,
            Ok(Decision::SkippedRoll) => self.skipped_roll += 1,
            Ok(Decision::SkippedBlocked) => self.skipped_blocked += 1,
            Err(e) => {
                warn!(conversation = conversation, error = %e, "agent-initiated turn failed");
                self.failed += 1;
            }
        }
    }
}

/// Runs the re-engagement and initiation scans.
pub struct ReengagementScheduler {
    pipeline: Arc<Pipeline>,
    matches: Arc<dyn MatchAdapter + Send + Sync>,
    reengagement: ReengagementConfig,
    initiation: InitiationConfig,
}

impl ReengagementScheduler {
    pub(crate) fn new(
        pipeline: Arc<Pipeline>,
        matches: Arc<dyn MatchAdapter + Send + Sync>,
        reengagement: ReengagementConfig,
        initiation: InitiationConfig,
    ) -> Self {
        Self {
            pipeline,
            matches,
            reengagement,
            initiation,
        }
    }

    pub async fn reengage_scan(&self) -> Result<ScanReport, RapportError> {
        self.reengage_scan_at(Utc::now()).await
    }

    /// Considers every conversation whose last message is the agent's and is
    /// older than the minimum gap at `now`.
    pub async fn reengage_scan_at(&self, now: DateTime<Utc>) -> Result<ScanReport, RapportError> {
        let mut report = ScanReport::default();
        if !self.reengagement.enabled {
            debug!("re-engagement disabled");
            return Ok(report);
        }

        let min_gap = chrono::Duration::from_std(std::time::Duration::from_secs(
            self.reengagement.min_gap_secs,
        ))
        .map_err(|e| RapportError::Config(format!("min_gap_secs out of range: {e}")))?;
        let dormant = self
            .pipeline
            .storage
            .dormant_conversations(now - min_gap, self.reengagement.batch_size)
            .await?;

        for candidate in &dormant {
            report.examined += 1;
            let decision = self.reengage_one(candidate, now).await;
            report.record(decision, &candidate.conversation.id);
        }

        log_report("re-engagement", &report);
        Ok(report)
    }

    async fn reengage_one(
        &self,
        candidate: &DormantConversation,
        now: DateTime<Utc>,
    ) -> Result<Decision, RapportError> {
        let p = &self.pipeline;
        let conversation = &candidate.conversation;
        let _guard = p.lock(&conversation.id).await;

        if p
            .is_blocked_pair(&conversation.agent_id, &conversation.counterpart_id)
            .await?
        {
            return Ok(Decision::SkippedBlocked);
        }

        let context = p.context(&conversation.id).await?;
        let max_attempts = self.reengagement.max_attempts;
        if context.reengagement_attempts >= max_attempts {
            debug!(conversation_id = %conversation.id, "re-engagement attempt limit reached");
            return Ok(Decision::SkippedLimit);
        }
        if !self.roll(self.reengagement.probability) {
            return Ok(Decision::SkippedRoll);
        }

        let (agent, counterpart) = p.participants(conversation).await?;
        let history = p.history(&conversation.id).await?;
        let gap = now - candidate.last_agent_message_at;
        let request = p
            .assembler
            .reengage_request(&agent, &counterpart, &context, &history, gap)?;
        let segments = self.generate_segments(request).await?;

        // Claim the attempt before sending anything.
        let claimed = p
            .commit(&conversation.id, |ctx| {
                if ctx.reengagement_attempts >= max_attempts {
                    return false;
                }
                ctx.reengagement_attempts += 1;
                true
            })
            .await?;
        let Some(claimed) = claimed else {
            return Ok(Decision::SkippedLimit);
        };

        self.send_and_record(conversation, &agent, &segments, &claimed)
            .await?;
        info!(
            conversation_id = %conversation.id,
            attempt = claimed.reengagement_attempts,
            gap_secs = gap.num_seconds(),
            "re-engaged dormant conversation"
        );
        Ok(Decision::Engaged)
    }

    pub async fn initiation_scan(&self) -> Result<ScanReport, RapportError> {
        let mut report = ScanReport::default();
        if !self.initiation.enabled {
            debug!("initiation disabled");
            return Ok(report);
        }

        let candidates = self
            .matches
            .candidate_pairs(self.initiation.batch_size)
            .await?;
        for candidate in &candidates {
            report.examined += 1;
            let decision = self.initiate_one(candidate).await;
            let pair = format!("{}/{}", candidate.agent_id, candidate.counterpart_id);
            report.record(decision, &pair);
        }

        log_report("initiation", &report);
        Ok(report)
    }

    async fn initiate_one(&self, candidate: &MatchCandidate) -> Result<Decision, RapportError> {
        let p = &self.pipeline;
        let (agent_id, counterpart_id) = (&candidate.agent_id, &candidate.counterpart_id);

        if p.is_blocked_pair(agent_id, counterpart_id).await? {
            return Ok(Decision::SkippedBlocked);
        }
        if p.storage
            .find_conversation(agent_id, counterpart_id)
            .await?
            .is_some()
        {
            return Ok(Decision::SkippedLimit);
        }
        if !self.roll(self.initiation.probability) {
            return Ok(Decision::SkippedRoll);
        }

        let agent = p.profile(agent_id).await?;
        let counterpart = p.profile(counterpart_id).await?;
        let request = p
            .assembler
            .initiate_request(&agent, &counterpart, candidate.score)?;
        let segments = self.generate_segments(request).await?;

        let conversation = p
            .storage
            .get_or_create_conversation(agent_id, counterpart_id)
            .await?;
        let _guard = p.lock(&conversation.id).await;

        // The opener counts as the first agent-initiated turn. Anything
        // already stored means another scan or an inbound message won.
        let claimed = p
            .commit(&conversation.id, |ctx| {
                if ctx.version != 0 {
                    return false;
                }
                ctx.reengagement_attempts = 1;
                true
            })
            .await?;
        let Some(claimed) = claimed else {
            return Ok(Decision::SkippedLimit);
        };

        self.send_and_record(&conversation, &agent, &segments, &claimed)
            .await?;
        info!(
            conversation_id = %conversation.id,
            agent_id = %agent.id,
            counterpart_id = %counterpart.id,
            score = candidate.score,
            "opened new conversation"
        );
        Ok(Decision::Engaged)
    }

    async fn generate_segments(
        &self,
        request: GenerationRequest,
    ) -> Result<Vec<String>, RapportError> {
        let p = &self.pipeline;
        let blob = p.generate(request).await?;
        let segments = p.segmenter.segment(&blob);
        if segments.is_empty() {
            return Err(RapportError::Parse {
                what: "agent-initiated message".into(),
                raw: blob,
            });
        }
        Ok(segments)
    }

    /// Dispatches `segments`, then records the transcript and a fresh
    /// summary. No sentiment is scored: there is no counterpart text.
    async fn send_and_record(
        &self,
        conversation: &Conversation,
        agent: &Profile,
        segments: &[String],
        context: &ConversationContext,
    ) -> Result<(), RapportError> {
        let p = &self.pipeline;
        let plan = p.plan(segments, agent);
        let dispatched = p
            .dispatcher
            .dispatch(conversation, &plan, &agent.display_name)
            .await?;

        let said: Vec<String> = segments
            .iter()
            .map(|s| transcript_line(&agent.display_name, s))
            .collect();
        let append: Vec<String> = match &dispatched {
            Dispatched::Immediate { messages } => messages
                .iter()
                .map(|m| transcript_line(&agent.display_name, &m.content))
                .collect(),
            Dispatched::Deferred { .. } => Vec::new(),
        };
        let summary = p.summarize(context, &said).await;

        if summary.is_none() && append.is_empty() {
            return Ok(());
        }
        p.commit(&conversation.id, |ctx| {
            if let Some(summary) = &summary {
                ctx.summary = summary.clone();
            }
            ctx.append_transcript(&append);
            true
        })
        .await?;
        Ok(())
    }

    fn roll(&self, probability: f64) -> bool {
        let probability = probability.clamp(0.0, 1.0);
        self.pipeline.with_rng(|rng| rng.gen_bool(probability))
    }
}

fn log_report(scan: &str, report: &ScanReport) {
    if report.examined == 0 {
        debug!(scan, "scan found no candidates");
        return;
    }
    info!(
        scan,
        examined = report.examined,
        engaged = report.engaged,
        skipped_limit = report.skipped_limit,
        skipped_roll = report.skipped_roll,
        skipped_blocked = report.skipped_blocked,
        failed = report.failed,
        "scan finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_each_decision() {
        let mut report = ScanReport::default();
        report.record(Ok(Decision::Engaged), "c1");
        report.record(Ok(Decision::SkippedRoll), "c2");
        report.record(Ok(Decision::SkippedRoll), "c3");
        report.record(Ok(Decision::SkippedLimit), "c4");
        report.record(Ok(Decision::SkippedBlocked), "c5");
        report.record(Err(RapportError::Internal("boom".into())), "c6");
        assert_eq!(
            report,
            ScanReport {
                examined: 0,
                engaged: 1,
                skipped_limit: 1,
                skipped_roll: 2,
                skipped_blocked: 1,
                failed: 1,
            }
        );
    }
}
