//! Probe actor standing in for model neighbours
#![allow(dead_code)]

use async_trait::async_trait;
use des_actors::{ActorBehavior, ActorContext, KernelConfig, Message, Result, SimTime};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Seen {
    pub message_type: String,
    pub content: serde_json::Value,
    pub at: f64,
}

/// Records every message it is handed
#[derive(Debug, Clone, Default)]
pub struct Probe(Arc<Mutex<Vec<Seen>>>);

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.0.lock().clone()
    }

    pub fn of_type(&self, message_type: &str) -> Vec<Seen> {
        self.0
            .lock()
            .iter()
            .filter(|s| s.message_type == message_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ActorBehavior for Probe {
    async fn process(&mut self, msg: &Message, _ctx: &ActorContext) -> Result<()> {
        self.0.lock().push(Seen {
            message_type: msg.message_type().to_string(),
            content: msg.content().clone(),
            at: msg.delivery_time().map(SimTime::as_f64).unwrap_or(f64::NAN),
        });
        Ok(())
    }
}

pub fn at(t: f64) -> SimTime {
    SimTime::new(t).unwrap()
}

/// Kernel config that ends a run once the queue stays empty
pub fn idle_config(ms: u64) -> KernelConfig {
    let mut config = KernelConfig::default();
    config.scheduler.idle_stop_ms = Some(ms);
    config
}
