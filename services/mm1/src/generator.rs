//! Arrival Generator
//!
//! On `start`, schedules the whole batch of arrivals up front: simulation
//! time runs far ahead of wall-clock time, so there is nothing to gain from
//! generating them lazily. The statistics report is scheduled after the
//! last arrival plus the configured delay.

use crate::messages::{self, delivered_at};
use crate::random::Exponential;
use async_trait::async_trait;
use des_actors::{Accepts, ActorBehavior, ActorContext, ActorId, Message, Result, Scheduled};
use serde_json::json;
use tracing::{debug, info, warn};

pub struct ArrivalGenerator {
    interarrival: Exponential,
    count: usize,
    destination: ActorId,
    stats: ActorId,
    entity_name: String,
    report_delay: f64,
    started: bool,
}

impl ArrivalGenerator {
    pub fn new(
        interarrival: Exponential,
        count: usize,
        destination: impl Into<ActorId>,
        stats: impl Into<ActorId>,
        entity_name: impl Into<String>,
        report_delay: f64,
    ) -> Self {
        Self {
            interarrival,
            count,
            destination: destination.into(),
            stats: stats.into(),
            entity_name: entity_name.into(),
            report_delay,
            started: false,
        }
    }
}

#[async_trait]
impl ActorBehavior for ArrivalGenerator {
    fn accepts(&self) -> Accepts {
        Accepts::only([messages::START])
    }

    async fn process(&mut self, msg: &Message, ctx: &ActorContext) -> Result<()> {
        if self.started {
            warn!(actor_id = %ctx.id(), "Generator already started, ignoring repeated start");
            return Ok(());
        }
        self.started = true;

        let mut scheduled_time = delivered_at(msg)?;
        let mut dropped = 0usize;
        for i in 0..self.count {
            scheduled_time = scheduled_time.plus(self.interarrival.sample())?;
            let entity = format!("{}_{i}", self.entity_name);
            debug!(entity = %entity, time = %scheduled_time, "Generated arrival");

            let arrival = ctx.message(self.entity_name.as_str(), &self.destination, json!(entity));
            if let Scheduled::Dropped = ctx.schedule_at(scheduled_time, arrival).await? {
                dropped += 1;
            }
        }

        let report_time = scheduled_time.plus(self.report_delay)?;
        ctx.schedule_at(report_time, ctx.message(messages::REPORT, &self.stats, json!(null)))
            .await?;

        info!(
            actor_id = %ctx.id(),
            arrivals = self.count,
            dropped,
            last_arrival = %scheduled_time,
            report_at = %report_time,
            "Arrival batch scheduled"
        );
        Ok(())
    }
}
