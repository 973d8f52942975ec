// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `rapport serve` command implementation.
//!
//! Runs the delivery sweep, both scans, and the inbound poll on their own
//! intervals. Reactions are spawned per message and bounded by a semaphore.
//! A shutdown signal stops the timers, drains in-flight reactions, and
//! closes storage.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rapport_agent::{Agent, shutdown};
use rapport_config::RapportConfig;
use rapport_core::{RapportError, StorageAdapter};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::app::App;

/// Inbound messages fetched per poll.
const INBOUND_BATCH: usize = 100;

pub async fn run_serve(config: RapportConfig) -> Result<(), RapportError> {
    info!("starting rapport serve");
    let app = App::start(&config).await?;
    let cancel = shutdown::install_signal_handler();
    let triggers = &config.triggers;

    let mut loops = Vec::new();

    let agent = app.agent.clone();
    loops.push(every(
        "delivery sweep",
        triggers.sweep_interval_secs,
        cancel.clone(),
        move || {
            let agent = agent.clone();
            async move { agent.sweeper().sweep().await.map(|_| ()) }
        },
    ));

    let agent = app.agent.clone();
    loops.push(every(
        "re-engagement scan",
        triggers.reengage_interval_secs,
        cancel.clone(),
        move || {
            let agent = agent.clone();
            async move { agent.scheduler().reengage_scan().await.map(|_| ()) }
        },
    ));

    let agent = app.agent.clone();
    loops.push(every(
        "initiation scan",
        triggers.initiate_interval_secs,
        cancel.clone(),
        move || {
            let agent = agent.clone();
            async move { agent.scheduler().initiation_scan().await.map(|_| ()) }
        },
    ));

    let max_reactions = triggers.max_concurrent_reactions.max(1);
    let permits = Arc::new(Semaphore::new(max_reactions));
    let agent = app.agent.clone();
    let storage = app.storage.clone();
    let poll_permits = permits.clone();
    loops.push(every(
        "inbound poll",
        triggers.inbound_poll_interval_secs,
        cancel.clone(),
        move || {
            let agent = agent.clone();
            let storage = storage.clone();
            let permits = poll_permits.clone();
            async move {
                let pending = storage.unprocessed_inbound(INBOUND_BATCH).await?;
                for message in pending {
                    let Ok(permit) = permits.clone().acquire_owned().await else {
                        break;
                    };
                    let agent = agent.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        react(&agent, &message.id).await;
                    });
                }
                Ok(())
            }
        },
    ));

    info!("rapport serve running, waiting for shutdown signal");
    cancel.cancelled().await;

    for handle in loops {
        if let Err(e) = handle.await {
            error!(error = %e, "trigger loop panicked");
        }
    }
    // Every permit back means no reaction is still running.
    if let Ok(all) = permits.acquire_many(max_reactions as u32).await {
        drop(all);
    }

    app.close().await?;
    info!("rapport serve stopped");
    Ok(())
}

async fn react(agent: &Agent, message_id: &str) {
    match agent.engine().react(message_id).await {
        Ok(outcome) => debug!(message_id, ?outcome, "reaction finished"),
        Err(e) => error!(message_id, error = %e, "reaction failed"),
    }
}

/// Runs `tick` every `interval_secs` until `cancel` fires. Errors are
/// logged and the loop keeps going.
fn every<F, Fut>(
    name: &'static str,
    interval_secs: u64,
    cancel: CancellationToken,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), RapportError>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(trigger = name, interval_secs, "trigger loop started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = tick().await {
                        error!(trigger = name, error = %e, "trigger run failed");
                    }
                }
                _ = cancel.cancelled() => {
                    info!(trigger = name, "trigger loop shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn loop_ticks_until_cancelled() {
        let cancel = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counted = runs.clone();
        let handle = every("test", 10, cancel.clone(), move || {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_secs(25)).await;
        cancel.cancel();
        handle.await.unwrap();
        // Ticks at 0s, 10s and 20s.
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_tick_keeps_the_loop_alive() {
        let cancel = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counted = runs.clone();
        let handle = every("test", 5, cancel.clone(), move || {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Err(RapportError::Internal("boom".into()))
            }
        });

        tokio::time::sleep(Duration::from_secs(12)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn reaction_runs_against_a_real_agent() {
        let harness = rapport_test_utils::TestHarness::new().await.unwrap();
        let conv = harness.pair().await.unwrap();
        let inbound = harness.receive(&conv, "hello").await.unwrap();

        react(&harness.agent, &inbound.id).await;
        assert_eq!(harness.agent_messages(&conv).await.unwrap().len(), 1);
        let stored = harness.storage.get_message(&inbound.id).await.unwrap().unwrap();
        assert!(stored.processed);
    }
}
