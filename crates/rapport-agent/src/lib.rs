// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn execution for the Rapport conversation core.
//!
//! [`Agent`] wires the adapters to four entry points, each safe to invoke
//! repeatedly from an external trigger:
//! - [`RelationshipEngine::react`] answers one inbound message
//! - [`DeliverySweeper::sweep`] drains the delayed delivery queue
//! - [`ReengagementScheduler::reengage_scan`] follows up in dormant conversations
//! - [`ReengagementScheduler::initiation_scan`] opens conversations with new matches

pub mod delivery;
pub mod dispatch;
pub mod engine;
mod pipeline;
pub mod reengage;
pub mod shutdown;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rapport_config::RapportConfig;
use rapport_context::{Persona, PromptAssembler};
use rapport_core::{MatchAdapter, ProfileAdapter, ProviderAdapter, StorageAdapter};
use tracing::info;

pub use delivery::{DeliverySweeper, SweepReport};
pub use dispatch::{Dispatched, Dispatcher};
pub use engine::{ReactionOutcome, RelationshipEngine};
pub use reengage::{ReengagementScheduler, ScanReport};

use crate::pipeline::Pipeline;

/// The external collaborators a running agent talks to.
#[derive(Clone)]
pub struct Adapters {
    pub storage: Arc<dyn StorageAdapter + Send + Sync>,
    pub profiles: Arc<dyn ProfileAdapter + Send + Sync>,
    pub matches: Arc<dyn MatchAdapter + Send + Sync>,
    pub provider: Arc<dyn ProviderAdapter + Send + Sync>,
}

/// Engine, sweeper, and scheduler sharing one set of adapters.
pub struct Agent {
    engine: RelationshipEngine,
    sweeper: DeliverySweeper,
    scheduler: ReengagementScheduler,
}

impl Agent {
    /// Builds an agent with entropy-seeded randomness.
    pub fn new(adapters: Adapters, config: &RapportConfig, persona: Persona) -> Self {
        Self::build(adapters, config, persona, StdRng::from_entropy())
    }

    /// Builds an agent whose every random draw derives from `seed`.
    pub fn with_seed(adapters: Adapters, config: &RapportConfig, persona: Persona, seed: u64) -> Self {
        Self::build(adapters, config, persona, StdRng::seed_from_u64(seed))
    }

    fn build(adapters: Adapters, config: &RapportConfig, persona: Persona, mut rng: StdRng) -> Self {
        let assembler =
            PromptAssembler::new(persona, config.generation.clone(), &config.relationship);
        let pipeline = Arc::new(Pipeline::new(
            &adapters,
            config,
            assembler,
            StdRng::seed_from_u64(rng.next_u64()),
        ));
        let sweeper = DeliverySweeper::new(
            adapters.storage.clone(),
            &config.timing,
            &config.delivery,
            StdRng::seed_from_u64(rng.next_u64()),
        );
        let scheduler = ReengagementScheduler::new(
            pipeline.clone(),
            adapters.matches.clone(),
            config.reengagement.clone(),
            config.initiation.clone(),
        );

        info!(
            agent_name = config.agent.name.as_str(),
            simulate_latency = config.timing.simulate_latency,
            "agent initialized"
        );

        Self {
            engine: RelationshipEngine::new(pipeline),
            sweeper,
            scheduler,
        }
    }

    pub fn engine(&self) -> &RelationshipEngine {
        &self.engine
    }

    pub fn sweeper(&self) -> &DeliverySweeper {
        &self.sweeper
    }

    pub fn scheduler(&self) -> &ReengagementScheduler {
        &self.scheduler
    }
}
