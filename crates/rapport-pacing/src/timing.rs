// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response, typing, and gap delays, and the immediate-vs-deferred decision.

use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use rand::Rng;
use rapport_config::model::TimingConfig;

/// Response-delay mixture: (cumulative probability, band start ms, band end ms).
const RESPONSE_BANDS: [(f64, u64, u64); 3] = [
    (0.70, 0, 5_000),
    (0.90, 5_000, 10_000),
    (1.00, 10_000, 15_000),
];

/// Typing speed in characters per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSpeed {
    Fixed(u32),
    /// Drawn uniformly from the inclusive range on every call.
    Range(u32, u32),
}

/// Parameters of one typing-delay formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingProfile {
    pub base_ms: u64,
    pub cap_ms: u64,
    pub speed: TypingSpeed,
    pub jitter_ms: u64,
}

impl TypingProfile {
    /// Profile for the parts of a multi-part reply.
    pub fn segmented(config: &TimingConfig) -> Self {
        Self {
            base_ms: config.typing_base_ms,
            cap_ms: config.typing_cap_ms,
            speed: TypingSpeed::Range(config.min_chars_per_minute, config.max_chars_per_minute),
            jitter_ms: config.typing_jitter_ms,
        }
    }

    /// Profile for a lone message, including every queued send.
    pub fn single_message(config: &TimingConfig) -> Self {
        Self {
            base_ms: config.single_message_base_ms,
            cap_ms: config.single_message_cap_ms,
            speed: TypingSpeed::Fixed(config.single_message_chars_per_minute),
            jitter_ms: config.typing_jitter_ms,
        }
    }

    /// `base + length / speed * 60_000 + jitter`, capped.
    pub fn delay(&self, length: usize, rng: &mut impl Rng) -> Duration {
        let cpm = match self.speed {
            TypingSpeed::Fixed(cpm) => cpm,
            TypingSpeed::Range(lo, hi) if lo < hi => rng.gen_range(lo..=hi),
            TypingSpeed::Range(lo, _) => lo,
        }
        .max(1) as u64;
        let typing_ms = (length as u64).saturating_mul(60_000) / cpm;
        let jitter_ms = if self.jitter_ms > 0 {
            rng.gen_range(0..=self.jitter_ms)
        } else {
            0
        };
        let total = self
            .base_ms
            .saturating_add(typing_ms)
            .saturating_add(jitter_ms)
            .min(self.cap_ms);
        Duration::from_millis(total)
    }
}

/// How a reply is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Held in-process with simulated waits, then persisted.
    Immediate,
    /// Persisted to the delayed delivery queue and sent by the sweep.
    Deferred,
}

/// One message of a planned reply.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSegment {
    pub content: String,
    /// Pause after the previous segment was sent. Zero for the first one.
    pub gap_before: Duration,
    pub typing: Duration,
    /// Time from the start of the turn until this segment is sent.
    pub send_offset: Duration,
}

impl PlannedSegment {
    /// Offset at which typing starts. Queued entries are scheduled here, and
    /// the sweep waits out the typing delay before sending.
    pub fn typing_starts_at(&self) -> Duration {
        self.send_offset.saturating_sub(self.typing)
    }
}

/// Full timing of one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPlan {
    pub response_delay: Duration,
    pub segments: Vec<PlannedSegment>,
    /// Response delay plus every gap and typing delay.
    pub total: Duration,
    pub mode: DispatchMode,
}

impl DispatchPlan {
    pub fn is_immediate(&self) -> bool {
        self.mode == DispatchMode::Immediate
    }
}

/// Timing decisions for outbound messages.
#[derive(Debug, Clone)]
pub struct TimingModel {
    config: TimingConfig,
}

impl TimingModel {
    pub fn new(config: TimingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    /// Three-band mixture: 70% in [0, 5s), 20% in [5s, 10s), 10% in [10s, 15s].
    pub fn response_delay(&self, rng: &mut impl Rng) -> Duration {
        let roll: f64 = rng.gen_range(0.0..1.0);
        let (_, lo, hi) = RESPONSE_BANDS
            .iter()
            .copied()
            .find(|(cumulative, _, _)| roll < *cumulative)
            .unwrap_or(RESPONSE_BANDS[2]);
        let ms = if hi == 15_000 {
            rng.gen_range(lo..=hi)
        } else {
            rng.gen_range(lo..hi)
        };
        Duration::from_millis(ms)
    }

    /// Response delay plus the late-night extra when `local_hour` falls in
    /// the configured window.
    pub fn response_delay_at(&self, local_hour: Option<u32>, rng: &mut impl Rng) -> Duration {
        let base = self.response_delay(rng);
        match local_hour {
            Some(hour) if self.is_late_night(hour) => base + self.late_night_extra(rng),
            _ => base,
        }
    }

    fn is_late_night(&self, hour: u32) -> bool {
        let window = &self.config.late_night;
        if !window.enabled {
            return false;
        }
        if window.start_hour <= window.end_hour {
            (window.start_hour..window.end_hour).contains(&hour)
        } else {
            hour >= window.start_hour || hour < window.end_hour
        }
    }

    fn late_night_extra(&self, rng: &mut impl Rng) -> Duration {
        let max = self.config.late_night.extra_max_ms;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(0..=max))
    }

    /// Typing delay for one message of `length` characters.
    pub fn typing_delay(
        &self,
        profile: &TypingProfile,
        length: usize,
        rng: &mut impl Rng,
    ) -> Duration {
        profile.delay(length, rng)
    }

    /// Whole seconds, uniform in `[gap_min_secs, gap_max_secs]`.
    pub fn inter_message_gap(&self, rng: &mut impl Rng) -> Duration {
        let (lo, hi) = (self.config.gap_min_secs, self.config.gap_max_secs);
        let secs = if lo < hi { rng.gen_range(lo..=hi) } else { lo };
        Duration::from_secs(secs)
    }

    pub fn is_immediate(&self, total: Duration) -> bool {
        total < Duration::from_secs(self.config.immediate_threshold_secs)
    }

    /// Plans the delivery of `segments` in order.
    ///
    /// A lone message uses the single-message typing profile; parts of a
    /// multi-part reply use the segmented one.
    pub fn plan(
        &self,
        segments: &[String],
        local_hour: Option<u32>,
        rng: &mut impl Rng,
    ) -> DispatchPlan {
        let profile = if segments.len() == 1 {
            TypingProfile::single_message(&self.config)
        } else {
            TypingProfile::segmented(&self.config)
        };
        let response_delay = self.response_delay_at(local_hour, rng);

        let mut cursor = response_delay;
        let planned = segments
            .iter()
            .enumerate()
            .map(|(i, content)| {
                let gap_before = if i == 0 {
                    Duration::ZERO
                } else {
                    self.inter_message_gap(rng)
                };
                let typing = profile.delay(content.chars().count(), rng);
                cursor += gap_before + typing;
                PlannedSegment {
                    content: content.clone(),
                    gap_before,
                    typing,
                    send_offset: cursor,
                }
            })
            .collect();

        let mode = if self.is_immediate(cursor) {
            DispatchMode::Immediate
        } else {
            DispatchMode::Deferred
        };
        tracing::trace!(total_ms = cursor.as_millis() as u64, ?mode, "planned dispatch");

        DispatchPlan {
            response_delay,
            segments: planned,
            total: cursor,
            mode,
        }
    }
}

/// Local wall-clock hour for a participant at `utc_offset_minutes` from UTC.
pub fn local_hour(now: DateTime<Utc>, utc_offset_minutes: i32) -> u32 {
    (now + chrono::Duration::minutes(i64::from(utc_offset_minutes))).hour()
}
