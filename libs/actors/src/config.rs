//! Kernel configuration
//!
//! Plain data consumed by the kernel. Loading it from files or the
//! environment happens outside this crate.

use crate::error::{KernelError, Result};
use crate::mailbox::{BackpressurePolicy, Capacity, MailboxConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bounded scheduler queue size
pub const DEFAULT_QUEUE_CAPACITY: usize = 1 << 20;

/// How the scheduler hands a message to its recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Wait for the recipient's completion signal before the next pop
    AwaitProcessed,
    /// Deliver and move on
    FireAndForget,
}

/// Scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub queue_capacity: Capacity,
    pub queue_policy: BackpressurePolicy,
    /// Bound on a submission blocked by a full queue
    pub submit_timeout_ms: u64,
    pub dispatch: DispatchMode,
    /// Bound on the wait for a completion signal
    pub processing_timeout_ms: u64,
    /// Stop once the queue has stayed empty this long
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_stop_ms: Option<u64>,
    /// Stop instead of dispatching anything scheduled after this time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizon: Option<f64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: Capacity::Bounded(DEFAULT_QUEUE_CAPACITY),
            queue_policy: BackpressurePolicy::Reject,
            submit_timeout_ms: 1_000,
            dispatch: DispatchMode::AwaitProcessed,
            processing_timeout_ms: 5_000,
            idle_stop_ms: None,
            horizon: None,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        self.queue_capacity.validate("scheduler.queue_capacity")?;
        if self.queue_policy == BackpressurePolicy::Block && self.submit_timeout_ms == 0 {
            return Err(KernelError::configuration(
                "block policy needs a non-zero timeout",
                Some("scheduler.submit_timeout_ms"),
            ));
        }
        // Only the dispatch loop frees queue space, and under await-processed
        // it is parked on the very actor that would be blocked submitting.
        if self.queue_policy == BackpressurePolicy::Block
            && self.queue_capacity.limit().is_some()
            && self.dispatch == DispatchMode::AwaitProcessed
        {
            return Err(KernelError::configuration(
                "a bounded block-policy queue needs fire_and_forget dispatch",
                Some("scheduler.queue_policy"),
            ));
        }
        if self.processing_timeout_ms == 0 {
            return Err(KernelError::configuration(
                "processing timeout must be positive",
                Some("scheduler.processing_timeout_ms"),
            ));
        }
        if self.idle_stop_ms == Some(0) {
            return Err(KernelError::configuration(
                "idle stop grace must be positive",
                Some("scheduler.idle_stop_ms"),
            ));
        }
        if let Some(horizon) = self.horizon {
            if !horizon.is_finite() || horizon < 0.0 {
                return Err(KernelError::configuration(
                    format!("horizon {horizon} is not a valid simulation time"),
                    Some("scheduler.horizon"),
                ));
            }
        }
        Ok(())
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_millis(self.processing_timeout_ms)
    }

    pub fn idle_stop(&self) -> Option<Duration> {
        self.idle_stop_ms.map(Duration::from_millis)
    }
}

/// Complete kernel configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Default for actors registered without their own mailbox config
    pub mailbox: MailboxConfig,
    pub scheduler: SchedulerConfig,
    pub startup_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            mailbox: MailboxConfig::default(),
            scheduler: SchedulerConfig::default(),
            startup_timeout_ms: 5_000,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl KernelConfig {
    pub fn validate(&self) -> Result<()> {
        self.mailbox.validate()?;
        self.scheduler.validate()?;
        if self.startup_timeout_ms == 0 {
            return Err(KernelError::configuration(
                "startup timeout must be positive",
                Some("startup_timeout_ms"),
            ));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(KernelError::configuration(
                "shutdown timeout must be positive",
                Some("shutdown_timeout_ms"),
            ));
        }
        Ok(())
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
