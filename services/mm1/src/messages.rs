//! Message vocabulary of the M/M/1 model
//!
//! Entity arrivals use the configured entity name as their message type;
//! everything else is a fixed name. Statistics payloads are typed structs
//! carried as JSON.

use des_actors::{KernelError, Message, Result, SimTime};
use serde::{Deserialize, Serialize};

/// Starts the arrival generator
pub const START: &str = "start";
/// Server finished an entity (or is idle at the start of a run)
pub const SERVER_READY: &str = "server-ready";
/// Tells the statistics actor to summarise and end the run
pub const REPORT: &str = "report";

pub const ENTITY_ARRIVED: &str = "entity-arrived";
pub const QUEUE_DEPTH: &str = "queue-depth";
pub const WAIT_TIME: &str = "wait-time";
pub const SERVICE_TIME: &str = "service-time";

/// Well-known actor identities
pub mod ids {
    pub const ARRIVALS: &str = "arrivals";
    pub const QUEUE: &str = "queue";
    pub const SERVER: &str = "server";
    pub const STATS: &str = "stats";
    /// Sender of the events seeded before the run starts
    pub const DRIVER: &str = "mm1";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueDepth {
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitTime {
    pub entity: String,
    pub wait: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTime {
    pub entity: String,
    pub service: f64,
}

/// Delivery time of a dispatched message
pub fn delivered_at(msg: &Message) -> Result<SimTime> {
    msg.delivery_time().ok_or_else(|| {
        KernelError::processing(format!(
            "'{}' from '{}' carries no delivery time",
            msg.message_type(),
            msg.sender()
        ))
    })
}

/// Entity identifier carried as a string payload
pub fn entity_of(msg: &Message) -> Result<String> {
    msg.content_as::<String>()
}
