//! Model wiring
//!
//! Registers the four actors on a fresh `ActorSystem`, seeds the two
//! time-zero events (the server announcing itself ready, then the
//! generator start) and runs the simulation to the statistics report.

use crate::generator::ArrivalGenerator;
use crate::messages::{self, ids};
use crate::queue::FifoQueue;
use crate::random::Exponential;
use crate::server::Server;
use crate::settings::Mm1Settings;
use crate::stats::{Mm1Summary, StatsCollector, SummarySlot};
use anyhow::{Context, Result};
use des_actors::{ActorSystem, KernelConfig, Message, RunReport, SimTime};
use serde::Serialize;
use tracing::info;

/// Summary plus the kernel's own account of the run
#[derive(Debug, Clone, Serialize)]
pub struct Mm1Outcome {
    pub summary: Mm1Summary,
    pub run: RunReport,
}

/// A configured, not yet started M/M/1 simulation
pub struct Mm1Model {
    system: ActorSystem,
    slot: SummarySlot,
}

impl Mm1Model {
    pub async fn build(settings: &Mm1Settings, kernel: KernelConfig) -> Result<Self> {
        settings.validate().context("Invalid model settings")?;
        let system = ActorSystem::with_config(kernel).context("Invalid kernel configuration")?;
        let slot = SummarySlot::new();

        system
            .register_actor(ids::STATS, StatsCollector::new(slot.clone()))
            .await?;
        system
            .register_actor(
                ids::SERVER,
                Server::new(
                    Exponential::new(settings.service_rate, settings.service_seed())?,
                    ids::STATS,
                    settings.entity_name.as_str(),
                ),
            )
            .await?;
        system
            .register_actor(
                ids::QUEUE,
                FifoQueue::new(ids::SERVER, ids::STATS, settings.entity_name.as_str()),
            )
            .await?;
        system
            .register_actor(
                ids::ARRIVALS,
                ArrivalGenerator::new(
                    Exponential::new(settings.arrival_rate, settings.seed)?,
                    settings.arrival_count(),
                    ids::QUEUE,
                    ids::STATS,
                    settings.entity_name.as_str(),
                    settings.report_delay,
                ),
            )
            .await?;

        // Equal times go out in submission order: the server is idle before the first arrival.
        system
            .schedule_event(
                SimTime::ZERO,
                Message::signal(messages::SERVER_READY, ids::DRIVER, ids::QUEUE),
            )
            .await?;
        system
            .schedule_event(
                SimTime::ZERO,
                Message::signal(messages::START, ids::DRIVER, ids::ARRIVALS),
            )
            .await?;

        info!(
            system_id = system.system_id(),
            arrivals = settings.arrival_count(),
            offered_load = settings.offered_load(),
            "M/M/1 model built"
        );
        Ok(Self { system, slot })
    }

    /// Run to completion; fails if the run ends without a statistics report
    pub async fn run(self) -> Result<Mm1Outcome> {
        let run = self.system.run().await.context("Simulation failed")?;
        let summary = self.slot.take().with_context(|| {
            format!(
                "Simulation ended at {} without a statistics report ({})",
                run.final_clock,
                run.shutdown_reason.as_deref().unwrap_or("no shutdown reason")
            )
        })?;
        Ok(Mm1Outcome { summary, run })
    }
}

/// Build and run in one step
pub async fn simulate(settings: &Mm1Settings, kernel: KernelConfig) -> Result<Mm1Outcome> {
    Mm1Model::build(settings, kernel).await?.run().await
}
