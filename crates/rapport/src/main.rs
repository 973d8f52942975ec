// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rapport - a human-paced conversational agent.
//!
//! Binary entry point. Every subcommand shares config loading and agent
//! assembly; `serve` runs the triggers on timers until a shutdown signal.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod app;
mod serve;
mod trigger;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rapport_config::RapportConfig;
use tracing::error;

/// Rapport - a human-paced conversational agent.
#[derive(Parser, Debug)]
#[command(name = "rapport", version, about, long_about = None)]
struct Cli {
    /// Config file to load instead of the standard search locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every trigger on a timer until interrupted.
    Serve,
    /// Deliver due scheduled messages once.
    Sweep,
    /// Run one re-engagement scan over dormant conversations.
    Reengage,
    /// Run one initiation scan over compatibility matches.
    Initiate,
    /// React to a single stored inbound message.
    React {
        /// Id of the inbound message.
        message_id: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> RapportConfig {
    let loaded = match path {
        Some(path) => rapport_config::load_and_validate_path(path),
        None => rapport_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            rapport_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    app::init_tracing(&config.agent.log_level);

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Sweep => trigger::run_sweep(config).await,
        Commands::Reengage => trigger::run_reengage(config).await,
        Commands::Initiate => trigger::run_initiate(config).await,
        Commands::React { message_id } => trigger::run_react(config, &message_id).await,
    };

    if let Err(e) = result {
        error!(error = %e, "rapport exited with an error");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
