//! Shared probe actors and helpers for kernel integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use des_actors::{
    Accepts, ActorBehavior, ActorContext, ActorSystem, KernelConfig, KernelError, Message,
    Result, RunReport, SimTime, SupervisorDirective,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// What a probe saw for one processed message
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    pub message_type: String,
    pub sender: String,
    pub content: serde_json::Value,
    pub delivered: f64,
}

/// Append-only log shared between a probe and the test body
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Delivered>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, msg: &Message) {
        self.0.lock().push(Delivered {
            message_type: msg.message_type().to_string(),
            sender: msg.sender().to_string(),
            content: msg.content().clone(),
            delivered: msg.delivery_time().map(SimTime::as_f64).unwrap_or(f64::NAN),
        });
    }

    pub fn entries(&self) -> Vec<Delivered> {
        self.0.lock().clone()
    }

    pub fn times(&self) -> Vec<f64> {
        self.0.lock().iter().map(|d| d.delivered).collect()
    }

    pub fn tags(&self) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .map(|d| d.content.as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// Records every message; optionally stops the run after `n`
pub struct Recorder {
    journal: Journal,
    accepts: Accepts,
    stop_after: Option<usize>,
}

impl Recorder {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            accepts: Accepts::Any,
            stop_after: None,
        }
    }

    pub fn accepting(mut self, types: &[&str]) -> Self {
        self.accepts = Accepts::only(types.iter().copied());
        self
    }

    pub fn stop_after(mut self, n: usize) -> Self {
        self.stop_after = Some(n);
        self
    }
}

#[async_trait]
impl ActorBehavior for Recorder {
    fn accepts(&self) -> Accepts {
        self.accepts.clone()
    }

    async fn process(&mut self, msg: &Message, ctx: &ActorContext) -> Result<()> {
        self.journal.record(msg);
        if let Some(n) = self.stop_after {
            if self.journal.len() >= n {
                ctx.request_shutdown("recorder saw enough");
            }
        }
        Ok(())
    }
}

/// Holds the first message until released, so the mailbox can fill up
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl ActorBehavior for Gate {
    async fn process(&mut self, _msg: &Message, _ctx: &ActorContext) -> Result<()> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

/// Fails every message and answers with a fixed directive
pub struct Faulty {
    pub directive: SupervisorDirective,
    pub journal: Journal,
}

#[async_trait]
impl ActorBehavior for Faulty {
    async fn process(&mut self, msg: &Message, _ctx: &ActorContext) -> Result<()> {
        self.journal.record(msg);
        Err(KernelError::processing(format!(
            "cannot handle {}",
            msg.message_type()
        )))
    }

    async fn on_error(&mut self, _error: &KernelError, _ctx: &ActorContext) -> SupervisorDirective {
        self.directive
    }
}

pub fn at(t: f64) -> SimTime {
    SimTime::new(t).expect("valid simulation time")
}

pub fn tagged(message_type: &str, to: &str, tag: &str) -> Message {
    Message::new(message_type, "driver", to, serde_json::json!(tag))
}

/// Default config that stops once the queue has been quiet for `ms`
pub fn idle_config(ms: u64) -> KernelConfig {
    let mut config = KernelConfig::default();
    config.scheduler.idle_stop_ms = Some(ms);
    config
}

/// Run with a wall-clock guard so a hang fails the test instead of stalling it
pub async fn run_bounded(system: &ActorSystem) -> Result<RunReport> {
    tokio::time::timeout(Duration::from_secs(10), system.run())
        .await
        .expect("simulation run did not finish")
}
