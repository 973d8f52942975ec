// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot trigger subcommands, for driving the agent from cron or by hand.

use rapport_agent::ReactionOutcome;
use rapport_config::RapportConfig;
use rapport_core::RapportError;

use crate::app::App;

pub async fn run_sweep(config: RapportConfig) -> Result<(), RapportError> {
    let app = App::start(&config).await?;
    let result = app.agent.sweeper().sweep().await;
    app.close().await?;
    let report = result?;
    println!(
        "sweep: examined {}, sent {}, failed {}, skipped {}",
        report.examined, report.sent, report.failed, report.skipped
    );
    Ok(())
}

pub async fn run_reengage(config: RapportConfig) -> Result<(), RapportError> {
    let app = App::start(&config).await?;
    let result = app.agent.scheduler().reengage_scan().await;
    app.close().await?;
    let report = result?;
    println!(
        "reengage: examined {}, engaged {}, at limit {}, not rolled {}, blocked {}, failed {}",
        report.examined,
        report.engaged,
        report.skipped_limit,
        report.skipped_roll,
        report.skipped_blocked,
        report.failed
    );
    Ok(())
}

pub async fn run_initiate(config: RapportConfig) -> Result<(), RapportError> {
    let app = App::start(&config).await?;
    let result = app.agent.scheduler().initiation_scan().await;
    app.close().await?;
    let report = result?;
    println!(
        "initiate: examined {}, opened {}, existing {}, not rolled {}, blocked {}, failed {}",
        report.examined,
        report.engaged,
        report.skipped_limit,
        report.skipped_roll,
        report.skipped_blocked,
        report.failed
    );
    Ok(())
}

pub async fn run_react(config: RapportConfig, message_id: &str) -> Result<(), RapportError> {
    let app = App::start(&config).await?;
    let result = app.agent.engine().react(message_id).await;
    app.close().await?;
    println!("react {message_id}: {}", describe(&result?));
    Ok(())
}

fn describe(outcome: &ReactionOutcome) -> String {
    match outcome {
        ReactionOutcome::Replied { plan, segments } => format!(
            "replied with {} part(s), {}",
            segments.len(),
            if plan.is_immediate() { "sent now" } else { "scheduled" }
        ),
        ReactionOutcome::NothingToSend => "nothing to send".into(),
        ReactionOutcome::Terminated { scheduled_id } => {
            format!("relationship ended, farewell scheduled as #{scheduled_id}")
        }
        ReactionOutcome::Blocked => "pair is blocked".into(),
        ReactionOutcome::AlreadyProcessed => "already processed".into(),
        ReactionOutcome::GenerationFailed => "generation failed, turn abandoned".into(),
    }
}
