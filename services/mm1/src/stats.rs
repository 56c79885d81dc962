//! Statistics Collector
//!
//! Aggregates the reports of the queue and the server. On `report` it
//! computes the run summary, publishes it through a `SummarySlot` and
//! requests shutdown of the simulation.

use crate::messages::{self, delivered_at, QueueDepth, ServiceTime, WaitTime};
use async_trait::async_trait;
use des_actors::{Accepts, ActorBehavior, ActorContext, Message, Result, SimTime};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome statistics of one M/M/1 run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mm1Summary {
    /// Simulation time at which the report was produced
    pub simulated_time: f64,
    pub arrivals: u64,
    pub served: u64,
    pub mean_wait: f64,
    pub max_wait: f64,
    pub mean_service: f64,
    /// Time-weighted mean number of waiting entities
    pub mean_queue_depth: f64,
    pub max_queue_depth: usize,
    /// Fraction of simulated time the server was busy
    pub utilisation: f64,
    /// Completed services per unit of simulation time
    pub throughput: f64,
}

/// Where the collector leaves its summary for the caller
#[derive(Debug, Clone, Default)]
pub struct SummarySlot(Arc<Mutex<Option<Mm1Summary>>>);

impl SummarySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Option<Mm1Summary> {
        self.0.lock().take()
    }

    fn publish(&self, summary: Mm1Summary) {
        *self.0.lock() = Some(summary);
    }
}

/// Running totals of one observable
#[derive(Debug, Default)]
struct Tally {
    count: u64,
    sum: f64,
    max: f64,
}

impl Tally {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.max = self.max.max(value);
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Integral of queue depth over simulation time
#[derive(Debug, Default)]
struct DepthIntegral {
    area: f64,
    depth: usize,
    since: SimTime,
    max: usize,
}

impl DepthIntegral {
    fn advance(&mut self, now: SimTime) {
        if let Some(elapsed) = now.duration_since(self.since) {
            self.area += self.depth as f64 * elapsed;
            self.since = now;
        }
    }

    fn record(&mut self, now: SimTime, depth: usize) {
        self.advance(now);
        self.depth = depth;
        self.max = self.max.max(depth);
    }
}

pub struct StatsCollector {
    slot: SummarySlot,
    arrivals: u64,
    waits: Tally,
    services: Tally,
    depth: DepthIntegral,
}

impl StatsCollector {
    pub fn new(slot: SummarySlot) -> Self {
        Self {
            slot,
            arrivals: 0,
            waits: Tally::default(),
            services: Tally::default(),
            depth: DepthIntegral::default(),
        }
    }

    fn summarise(&mut self, now: SimTime) -> Mm1Summary {
        self.depth.advance(now);
        let elapsed = now.as_f64();
        let per_unit = |x: f64| if elapsed > 0.0 { x / elapsed } else { 0.0 };

        Mm1Summary {
            simulated_time: elapsed,
            arrivals: self.arrivals,
            served: self.services.count,
            mean_wait: self.waits.mean(),
            max_wait: self.waits.max,
            mean_service: self.services.mean(),
            mean_queue_depth: per_unit(self.depth.area),
            max_queue_depth: self.depth.max,
            utilisation: per_unit(self.services.sum),
            throughput: per_unit(self.services.count as f64),
        }
    }
}

#[async_trait]
impl ActorBehavior for StatsCollector {
    fn accepts(&self) -> Accepts {
        Accepts::only([
            messages::ENTITY_ARRIVED,
            messages::QUEUE_DEPTH,
            messages::WAIT_TIME,
            messages::SERVICE_TIME,
            messages::REPORT,
        ])
    }

    async fn process(&mut self, msg: &Message, ctx: &ActorContext) -> Result<()> {
        let now = delivered_at(msg)?;
        match msg.message_type().as_str() {
            messages::ENTITY_ARRIVED => self.arrivals += 1,
            messages::QUEUE_DEPTH => {
                let QueueDepth { depth } = msg.content_as()?;
                self.depth.record(now, depth);
            }
            messages::WAIT_TIME => {
                let WaitTime { entity, wait } = msg.content_as()?;
                debug!(entity = %entity, wait, "Wait recorded");
                self.waits.add(wait);
            }
            messages::SERVICE_TIME => {
                let ServiceTime { service, .. } = msg.content_as()?;
                self.services.add(service);
            }
            _ => {
                let summary = self.summarise(now);
                if summary.served < summary.arrivals {
                    warn!(
                        arrivals = summary.arrivals,
                        served = summary.served,
                        "Report produced before every entity was served"
                    );
                }
                info!(
                    time = %now,
                    served = summary.served,
                    mean_wait = summary.mean_wait,
                    utilisation = summary.utilisation,
                    "Statistics reported"
                );
                self.slot.publish(summary);
                ctx.request_shutdown("statistics reported");
            }
        }
        Ok(())
    }
}
