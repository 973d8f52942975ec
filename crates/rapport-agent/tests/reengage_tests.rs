// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Re-engagement and initiation scans against a temp database.

use chrono::{Duration, Utc};
use rapport_agent::ScanReport;
use rapport_core::types::GenerationPurpose;
use rapport_core::{MatchAdapter, StorageAdapter};
use rapport_test_utils::{AGENT_ID, COUNTERPART_ID, TestHarness};

async fn always_reengaging() -> TestHarness {
    TestHarness::builder()
        .configure(|c| {
            c.reengagement.probability = 1.0;
            c.reengagement.max_attempts = 2;
        })
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn dormant_conversation_is_followed_up_until_the_limit() {
    let harness = always_reengaging().await;
    let conv = harness.pair().await.unwrap();
    let now = Utc::now();
    harness
        .agent_said_at(&conv, "how was the concert?", now - Duration::hours(4))
        .await
        .unwrap();

    let scheduler = harness.agent.scheduler();
    let first = scheduler.reengage_scan_at(now).await.unwrap();
    assert_eq!(first.examined, 1);
    assert_eq!(first.engaged, 1);
    assert_eq!(harness.context(&conv).await.unwrap().unwrap().reengagement_attempts, 1);

    let prompts = harness.provider.requests_for(GenerationPurpose::Reengage);
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].prompt.contains("has not replied"));

    let second = scheduler
        .reengage_scan_at(now + Duration::hours(4))
        .await
        .unwrap();
    assert_eq!(second.engaged, 1);

    for hours in [8, 12, 16] {
        let report = scheduler
            .reengage_scan_at(now + Duration::hours(hours))
            .await
            .unwrap();
        assert_eq!(
            report,
            ScanReport {
                examined: 1,
                skipped_limit: 1,
                ..ScanReport::default()
            }
        );
    }

    let ctx = harness.context(&conv).await.unwrap().unwrap();
    assert_eq!(ctx.reengagement_attempts, 2);
    let sent = harness.agent_messages(&conv).await.unwrap();
    assert_eq!(sent.len(), 3, "original message plus two follow-ups");
    assert!(ctx.transcript.contains("Mia: mock follow-up"));
}

#[tokio::test]
async fn inbound_reply_resets_the_attempt_counter() {
    let harness = always_reengaging().await;
    let conv = harness.pair().await.unwrap();
    let now = Utc::now();
    harness
        .agent_said_at(&conv, "still up?", now - Duration::hours(4))
        .await
        .unwrap();
    harness.agent.scheduler().reengage_scan_at(now).await.unwrap();
    assert_eq!(harness.context(&conv).await.unwrap().unwrap().reengagement_attempts, 1);

    let inbound = harness.receive(&conv, "sorry, fell asleep").await.unwrap();
    harness.agent.engine().react(&inbound.id).await.unwrap();
    assert_eq!(harness.context(&conv).await.unwrap().unwrap().reengagement_attempts, 0);
}

#[tokio::test]
async fn recent_or_answered_conversations_are_not_candidates() {
    let harness = always_reengaging().await;
    let conv = harness.pair().await.unwrap();
    let now = Utc::now();
    harness
        .agent_said_at(&conv, "hey", now - Duration::hours(1))
        .await
        .unwrap();

    let report = harness.agent.scheduler().reengage_scan_at(now).await.unwrap();
    assert_eq!(report.examined, 0);

    harness
        .receive_at(&conv, "hi!", now - Duration::minutes(30))
        .await
        .unwrap();
    let report = harness
        .agent
        .scheduler()
        .reengage_scan_at(now + Duration::hours(6))
        .await
        .unwrap();
    assert_eq!(report.examined, 0);
}

#[tokio::test]
async fn blocked_pairs_are_never_followed_up() {
    let harness = always_reengaging().await;
    let conv = harness.pair().await.unwrap();
    let now = Utc::now();
    harness
        .agent_said_at(&conv, "hello?", now - Duration::hours(5))
        .await
        .unwrap();
    harness
        .storage
        .record_block(COUNTERPART_ID, AGENT_ID)
        .await
        .unwrap();

    let report = harness.agent.scheduler().reengage_scan_at(now).await.unwrap();
    assert_eq!(report.engaged, 0);
    assert!(harness.provider.requests_for(GenerationPurpose::Reengage).is_empty());
    assert_eq!(harness.agent_messages(&conv).await.unwrap().len(), 1);
}

#[tokio::test]
async fn zero_probability_skips_by_roll() {
    let harness = TestHarness::builder()
        .configure(|c| c.reengagement.probability = 0.0)
        .build()
        .await
        .unwrap();
    let conv = harness.pair().await.unwrap();
    let now = Utc::now();
    harness
        .agent_said_at(&conv, "hey", now - Duration::hours(4))
        .await
        .unwrap();

    let report = harness.agent.scheduler().reengage_scan_at(now).await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.skipped_roll, 1);
    assert!(harness.context(&conv).await.unwrap().is_none());
}

#[tokio::test]
async fn failed_follow_up_generation_counts_as_failed() {
    let harness = always_reengaging().await;
    let conv = harness.pair().await.unwrap();
    let now = Utc::now();
    harness
        .agent_said_at(&conv, "hey", now - Duration::hours(4))
        .await
        .unwrap();
    harness.provider.fail(GenerationPurpose::Reengage, "overloaded");

    let report = harness.agent.scheduler().reengage_scan_at(now).await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(harness.context(&conv).await.unwrap().is_none(), "attempt not consumed");
}

#[tokio::test]
async fn disabled_reengagement_does_nothing() {
    let harness = TestHarness::builder()
        .configure(|c| c.reengagement.enabled = false)
        .build()
        .await
        .unwrap();
    let conv = harness.pair().await.unwrap();
    let now = Utc::now();
    harness
        .agent_said_at(&conv, "hey", now - Duration::hours(4))
        .await
        .unwrap();

    let report = harness.agent.scheduler().reengage_scan_at(now).await.unwrap();
    assert_eq!(report, ScanReport::default());
}

#[tokio::test]
async fn match_is_opened_once() {
    let harness = TestHarness::builder()
        .configure(|c| c.initiation.probability = 1.0)
        .build()
        .await
        .unwrap();
    harness.profile("agent-2", "Ava", true).await.unwrap();
    harness.profile("user-2", "Lee", false).await.unwrap();
    harness.add_match("agent-2", "user-2", 0.8).await.unwrap();

    let report = harness.agent.scheduler().initiation_scan().await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.engaged, 1);

    let conv = harness
        .storage
        .find_conversation("agent-2", "user-2")
        .await
        .unwrap()
        .expect("conversation opened");
    assert_eq!(conv.agent_id, "agent-2");

    let sent = harness.storage.recent_messages(&conv.id, 10).await.unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content, "mock opener");
    assert_eq!(sent[0].sender_id, "agent-2");

    let ctx = harness.context(&conv).await.unwrap().unwrap();
    assert_eq!(ctx.reengagement_attempts, 1);
    assert_eq!(ctx.transcript, "Ava: mock opener");

    let prompt = &harness.provider.requests_for(GenerationPurpose::Initiate)[0].prompt;
    assert!(prompt.contains("Lee"));

    assert!(harness.storage.candidate_pairs(10).await.unwrap().is_empty());
    let again = harness.agent.scheduler().initiation_scan().await.unwrap();
    assert_eq!(again.examined, 0);
}

#[tokio::test]
async fn failed_opener_creates_no_conversation() {
    let harness = TestHarness::builder()
        .configure(|c| c.initiation.probability = 1.0)
        .build()
        .await
        .unwrap();
    harness.profile("agent-2", "Ava", true).await.unwrap();
    harness.profile("user-2", "Lee", false).await.unwrap();
    harness.add_match("agent-2", "user-2", 0.8).await.unwrap();
    harness.provider.fail(GenerationPurpose::Initiate, "overloaded");

    let report = harness.agent.scheduler().initiation_scan().await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(
        harness
            .storage
            .find_conversation("agent-2", "user-2")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn blocked_match_is_not_opened() {
    let harness = TestHarness::builder()
        .configure(|c| c.initiation.probability = 1.0)
        .build()
        .await
        .unwrap();
    harness.profile("agent-2", "Ava", true).await.unwrap();
    harness.profile("user-2", "Lee", false).await.unwrap();
    harness.add_match("agent-2", "user-2", 0.8).await.unwrap();
    harness.storage.record_block("user-2", "agent-2").await.unwrap();

    let report = harness.agent.scheduler().initiation_scan().await.unwrap();
    assert_eq!(report.engaged, 0);
    assert!(harness.provider.requests_for(GenerationPurpose::Initiate).is_empty());
}
