// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery sweep behavior over deferred replies.

use chrono::{Duration, Utc};
use rapport_agent::{ReactionOutcome, SweepReport};
use rapport_core::StorageAdapter;
use rapport_core::types::{GenerationPurpose, ScheduleStatus};
use rapport_test_utils::TestHarness;

/// Harness where every reply is deferred to the queue.
async fn deferring() -> TestHarness {
    TestHarness::builder()
        .configure(|c| c.timing.immediate_threshold_secs = 0)
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn repeated_sweeps_deliver_each_entry_once() {
    let harness = deferring().await;
    let conv = harness.pair().await.unwrap();
    harness.provider.respond(GenerationPurpose::Reply, "a|||b|||c");
    let inbound = harness.receive(&conv, "what's new?").await.unwrap();
    let outcome = harness.agent.engine().react(&inbound.id).await.unwrap();
    assert!(matches!(outcome, ReactionOutcome::Replied { .. }));

    let later = Utc::now() + Duration::hours(1);
    let first = harness.agent.sweeper().sweep_at(later).await.unwrap();
    assert_eq!(
        first,
        SweepReport {
            examined: 3,
            sent: 3,
            ..SweepReport::default()
        }
    );

    for _ in 0..3 {
        let again = harness.agent.sweeper().sweep_at(later).await.unwrap();
        assert_eq!(again, SweepReport::default());
    }

    let sent: Vec<_> = harness
        .agent_messages(&conv)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(sent, vec!["a", "b", "c"]);
    let queued = harness.storage.list_scheduled(&conv.id).await.unwrap();
    assert!(queued.iter().all(|e| e.status == ScheduleStatus::Sent));
    assert!(queued.iter().all(|e| e.sent_at.is_some()));
}

#[tokio::test]
async fn entries_not_yet_due_are_left_alone() {
    let harness = deferring().await;
    let conv = harness.pair().await.unwrap();
    let inbound = harness.receive(&conv, "hey").await.unwrap();
    harness.agent.engine().react(&inbound.id).await.unwrap();

    let report = harness
        .agent
        .sweeper()
        .sweep_at(Utc::now() - Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(report.examined, 0);
    let queued = harness.storage.list_scheduled(&conv.id).await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].status, ScheduleStatus::Pending);
}

#[tokio::test]
async fn failed_delivery_is_marked_and_not_retried() {
    let harness = deferring().await;
    let conv = harness.pair().await.unwrap();
    harness.provider.respond(GenerationPurpose::Reply, "one|||two");
    let inbound = harness.receive(&conv, "hey").await.unwrap();
    harness.agent.engine().react(&inbound.id).await.unwrap();

    harness.failing.fail_deliveries(true);
    let later = Utc::now() + Duration::hours(1);
    let report = harness.agent.sweeper().sweep_at(later).await.unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(report.failed, 2);

    let queued = harness.storage.list_scheduled(&conv.id).await.unwrap();
    assert!(queued.iter().all(|e| e.status == ScheduleStatus::Failed));
    assert!(
        queued
            .iter()
            .all(|e| e.last_error.as_deref().is_some_and(|err| err.contains("injected")))
    );

    harness.failing.fail_deliveries(false);
    let again = harness.agent.sweeper().sweep_at(later).await.unwrap();
    assert_eq!(again.examined, 0);
    assert!(harness.agent_messages(&conv).await.unwrap().is_empty());
}

#[tokio::test]
async fn enqueue_failure_stops_the_remaining_parts() {
    let harness = deferring().await;
    let conv = harness.pair().await.unwrap();
    harness.provider.respond(GenerationPurpose::Reply, "one|||two");
    harness.failing.fail_enqueues(true);

    let inbound = harness.receive(&conv, "hey").await.unwrap();
    let outcome = harness.agent.engine().react(&inbound.id).await.unwrap();
    assert!(matches!(outcome, ReactionOutcome::Replied { .. }));
    assert!(harness.storage.list_scheduled(&conv.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn overlapping_sweeps_deliver_each_entry_once() {
    let harness = deferring().await;
    let conv = harness.pair().await.unwrap();
    harness.provider.respond(GenerationPurpose::Reply, "a|||b|||c");
    let inbound = harness.receive(&conv, "what's new?").await.unwrap();
    harness.agent.engine().react(&inbound.id).await.unwrap();

    let later = Utc::now() + Duration::hours(1);
    let sweeper = harness.agent.sweeper();
    let (left, right) = tokio::join!(sweeper.sweep_at(later), sweeper.sweep_at(later));
    let (left, right) = (left.unwrap(), right.unwrap());

    assert_eq!(left.sent + right.sent, 3);
    assert_eq!(left.failed + right.failed, 0);
    assert_eq!(left.examined + right.examined, left.sent + right.sent + left.skipped + right.skipped);

    let sent: Vec<_> = harness
        .agent_messages(&conv)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(sent, vec!["a", "b", "c"]);
    let ctx = harness.context(&conv).await.unwrap().unwrap();
    assert_eq!(ctx.transcript, "Sam: what's new?\nMia: a\nMia: b\nMia: c");
}
