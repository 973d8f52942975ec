// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sweep of the delayed delivery queue.
//!
//! Each due entry waits out a typing delay recomputed from its length, then
//! moves `pending -> sent` together with its message insert. Entries that
//! already left `pending` (a concurrent sweep got there first) are skipped.

use std::sync::{Arc, PoisonError};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rapport_config::model::{DeliveryConfig, TimingConfig};
use rapport_core::error::RapportError;
use rapport_core::types::{DeliveryOutcome, Message, ScheduledMessage};
use rapport_core::StorageAdapter;
use rapport_pacing::TypingProfile;
use tracing::{debug, error, info};

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub sent: usize,
    pub failed: usize,
    /// Entries another sweep handled first.
    pub skipped: usize,
}

/// Drains due entries of the delayed delivery queue.
pub struct DeliverySweeper {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    typing: TypingProfile,
    batch_size: usize,
    simulate_latency: bool,
    rng: std::sync::Mutex<StdRng>,
}

impl DeliverySweeper {
    pub fn new(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        timing: &TimingConfig,
        delivery: &DeliveryConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            storage,
            typing: TypingProfile::single_message(timing),
            batch_size: delivery.batch_size,
            simulate_latency: timing.simulate_latency,
            rng: std::sync::Mutex::new(rng),
        }
    }

    /// Sweeps everything due now.
    pub async fn sweep(&self) -> Result<SweepReport, RapportError> {
        self.sweep_at(Utc::now()).await
    }

    /// Sweeps entries scheduled at or before `now`, earliest first.
    ///
    /// Only the initial query can fail the sweep; per-entry errors are
    /// recorded on the entry and counted.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, RapportError> {
        let due = self.storage.due_scheduled(now, self.batch_size).await?;
        let mut report = SweepReport::default();

        for entry in due {
            report.examined += 1;
            self.deliver(&entry, &mut report).await;
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                sent = report.sent,
                failed = report.failed,
                skipped = report.skipped,
                "delivery sweep finished"
            );
        } else {
            debug!("delivery sweep found nothing due");
        }
        Ok(report)
    }

    async fn deliver(&self, entry: &ScheduledMessage, report: &mut SweepReport) {
        let typing = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            self.typing.delay(entry.content.chars().count(), &mut *rng)
        };
        if self.simulate_latency {
            tokio::time::sleep(typing).await;
        }

        let message = Message::from_agent(&entry.conversation_id, &entry.sender_id, &entry.content);
        match self.storage.deliver_scheduled(entry.id, &message).await {
            Ok(DeliveryOutcome::Sent) => {
                debug!(
                    scheduled_id = entry.id,
                    conversation_id = %entry.conversation_id,
                    message_id = %message.id,
                    "scheduled message sent"
                );
                metrics::counter!("rapport_scheduled_sent_total").increment(1);
                report.sent += 1;
            }
            Ok(DeliveryOutcome::AlreadyHandled) => {
                debug!(scheduled_id = entry.id, "scheduled message already handled");
                report.skipped += 1;
            }
            Err(e) => {
                error!(
                    scheduled_id = entry.id,
                    conversation_id = %entry.conversation_id,
                    error = %e,
                    "scheduled send failed"
                );
                match self.storage.fail_scheduled(entry.id, &e.to_string()).await {
                    Ok(true) => {
                        metrics::counter!("rapport_scheduled_failed_total").increment(1);
                        report.failed += 1;
                    }
                    Ok(false) => report.skipped += 1,
                    Err(mark_err) => {
                        error!(
                            scheduled_id = entry.id,
                            error = %mark_err,
                            "could not mark scheduled message failed"
                        );
                        report.failed += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rapport_config::model::StorageConfig;
    use rapport_core::types::{NewScheduledMessage, ScheduleStatus};
    use rapport_storage::SqliteStorage;
    use tempfile::TempDir;

    async fn setup() -> (Arc<SqliteStorage>, DeliverySweeper, String, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("sweep.db").to_string_lossy().to_string(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        let storage = Arc::new(storage);
        let conv = storage
            .get_or_create_conversation("agent", "user")
            .await
            .unwrap();

        let timing = TimingConfig {
            simulate_latency: false,
            ..TimingConfig::default()
        };
        let sweeper = DeliverySweeper::new(
            storage.clone(),
            &timing,
            &DeliveryConfig::default(),
            StdRng::seed_from_u64(7),
        );
        (storage, sweeper, conv.id, dir)
    }

    async fn enqueue(storage: &SqliteStorage, conv: &str, content: &str, at: DateTime<Utc>) -> i64 {
        storage
            .enqueue_scheduled(&NewScheduledMessage {
                conversation_id: conv.to_string(),
                sender_id: "agent".into(),
                content: content.into(),
                scheduled_at: at,
                effects: vec![],
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn sends_due_entries_in_schedule_order() {
        let (storage, sweeper, conv, _dir) = setup().await;
        let now = Utc::now();
        enqueue(&storage, &conv, "second", now - chrono::Duration::seconds(10)).await;
        enqueue(&storage, &conv, "first", now - chrono::Duration::seconds(20)).await;
        let future = enqueue(&storage, &conv, "later", now + chrono::Duration::hours(1)).await;

        let report = sweeper.sweep_at(now).await.unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(report.sent, 2);

        let messages = storage.recent_messages(&conv, 10).await.unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);

        let pending = storage.get_scheduled(future).await.unwrap().unwrap();
        assert_eq!(pending.status, ScheduleStatus::Pending);
    }

    #[tokio::test]
    async fn repeated_sweeps_leave_terminal_entries_alone() {
        let (storage, sweeper, conv, _dir) = setup().await;
        let now = Utc::now();
        let id = enqueue(&storage, &conv, "hello", now - chrono::Duration::seconds(1)).await;

        let first = sweeper.sweep_at(now).await.unwrap();
        assert_eq!(first.sent, 1);
        let sent = storage.get_scheduled(id).await.unwrap().unwrap();
        assert_eq!(sent.status, ScheduleStatus::Sent);

        for _ in 0..3 {
            let again = sweeper.sweep_at(now + chrono::Duration::minutes(5)).await.unwrap();
            assert_eq!(again, SweepReport::default());
        }
        assert_eq!(storage.get_scheduled(id).await.unwrap().unwrap(), sent);
        assert_eq!(storage.recent_messages(&conv, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_queue_is_a_no_op() {
        let (_storage, sweeper, _conv, _dir) = setup().await;
        assert_eq!(sweeper.sweep().await.unwrap(), SweepReport::default());
    }
}
