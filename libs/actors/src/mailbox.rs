//! Actor Mailboxes
//!
//! Per-actor FIFO delivery queue split into a sending half (`Mailbox`, kept
//! in the registry entry and used only by the scheduler's dispatch path) and
//! a receiving half (`MailboxReceiver`, owned by the actor loop). Capacity
//! and the policy applied when that capacity is reached are explicit
//! configuration; an unbounded mailbox has to be asked for.

use crate::error::{KernelError, Result};
use crate::message::Message;
use crate::registry::ActorId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TryRecvError, TrySendError};

/// Default bounded mailbox size
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1024;

/// Default wait under the `Block` policy
pub const DEFAULT_BLOCK_TIMEOUT_MS: u64 = 1_000;

/// Queue capacity, shared by mailboxes and the scheduler queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capacity {
    Bounded(usize),
    Unbounded,
}

impl Capacity {
    /// Upper bound, `None` when unbounded
    pub fn limit(&self) -> Option<usize> {
        match self {
            Capacity::Bounded(n) => Some(*n),
            Capacity::Unbounded => None,
        }
    }

    pub(crate) fn validate(&self, field: &str) -> Result<()> {
        match self {
            Capacity::Bounded(0) => Err(KernelError::configuration(
                "bounded capacity must be at least 1",
                Some(field),
            )),
            _ => Ok(()),
        }
    }
}

/// What happens to a message that arrives at a full queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Wait for space, up to the configured timeout
    Block,
    /// Drop the incoming message and report it
    DropNewest,
    /// Fail with a full-queue error
    Reject,
}

/// Mailbox configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    pub capacity: Capacity,
    pub policy: BackpressurePolicy,
    pub block_timeout_ms: u64,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            capacity: Capacity::Bounded(DEFAULT_MAILBOX_CAPACITY),
            policy: BackpressurePolicy::Block,
            block_timeout_ms: DEFAULT_BLOCK_TIMEOUT_MS,
        }
    }
}

impl MailboxConfig {
    pub fn bounded(capacity: usize, policy: BackpressurePolicy) -> Self {
        Self {
            capacity: Capacity::Bounded(capacity),
            policy,
            ..Self::default()
        }
    }

    /// Explicit opt-in to unbounded growth
    pub fn unbounded() -> Self {
        Self {
            capacity: Capacity::Unbounded,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.capacity.validate("mailbox.capacity")?;
        if self.policy == BackpressurePolicy::Block && self.block_timeout_ms == 0 {
            return Err(KernelError::configuration(
                "block policy needs a non-zero timeout",
                Some("mailbox.block_timeout_ms"),
            ));
        }
        Ok(())
    }

    pub fn block_timeout(&self) -> Duration {
        Duration::from_millis(self.block_timeout_ms)
    }
}

/// Outcome of a delivery that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Enqueued,
    /// Dropped under the `DropNewest` policy
    Dropped,
}

enum MailboxTx {
    Bounded(mpsc::Sender<Message>),
    Unbounded(mpsc::UnboundedSender<Message>),
}

impl Clone for MailboxTx {
    fn clone(&self) -> Self {
        match self {
            MailboxTx::Bounded(tx) => MailboxTx::Bounded(tx.clone()),
            MailboxTx::Unbounded(tx) => MailboxTx::Unbounded(tx.clone()),
        }
    }
}

enum MailboxRx {
    Bounded(mpsc::Receiver<Message>),
    Unbounded(mpsc::UnboundedReceiver<Message>),
}

/// Sending half of an actor mailbox
#[derive(Clone)]
pub struct Mailbox {
    owner: ActorId,
    tx: MailboxTx,
    /// Backlog of the unbounded channel; bounded depth comes from its permits
    unbounded_depth: Arc<AtomicUsize>,
    config: MailboxConfig,
}

/// Receiving half, owned by the actor loop
pub struct MailboxReceiver {
    owner: ActorId,
    rx: MailboxRx,
    unbounded_depth: Arc<AtomicUsize>,
}

impl Mailbox {
    pub fn new(owner: ActorId, config: MailboxConfig) -> Result<(Self, MailboxReceiver)> {
        config.validate()?;
        let (tx, rx) = match config.capacity {
            Capacity::Bounded(capacity) => {
                let (tx, rx) = mpsc::channel(capacity);
                (MailboxTx::Bounded(tx), MailboxRx::Bounded(rx))
            }
            Capacity::Unbounded => {
                let (tx, rx) = mpsc::unbounded_channel();
                (MailboxTx::Unbounded(tx), MailboxRx::Unbounded(rx))
            }
        };
        let unbounded_depth = Arc::new(AtomicUsize::new(0));

        let mailbox = Self {
            owner: owner.clone(),
            tx,
            unbounded_depth: Arc::clone(&unbounded_depth),
            config,
        };
        let receiver = MailboxReceiver {
            owner,
            rx,
            unbounded_depth,
        };
        Ok((mailbox, receiver))
    }

    pub fn owner(&self) -> &ActorId {
        &self.owner
    }

    pub fn config(&self) -> &MailboxConfig {
        &self.config
    }

    /// Messages waiting to be taken; senders blocked on a full mailbox are not counted
    pub fn depth(&self) -> usize {
        match &self.tx {
            MailboxTx::Bounded(tx) => tx.max_capacity() - tx.capacity(),
            MailboxTx::Unbounded(_) => self.unbounded_depth.load(Ordering::Acquire),
        }
    }

    /// Enqueue at the tail, applying the backpressure policy when full
    pub async fn deliver(&self, msg: Message) -> Result<Delivery> {
        let outcome = match &self.tx {
            MailboxTx::Unbounded(tx) => {
                // Count before the send so a fast taker never sees the depth underflow.
                self.unbounded_depth.fetch_add(1, Ordering::AcqRel);
                tx.send(msg).map_err(|_| {
                    self.unbounded_depth.fetch_sub(1, Ordering::AcqRel);
                    self.closed()
                })
            }
            MailboxTx::Bounded(tx) => match tx.try_send(msg) {
                Ok(()) => Ok(()),
                Err(TrySendError::Closed(_)) => Err(self.closed()),
                Err(TrySendError::Full(msg)) => self.on_full(tx, msg).await,
            },
        };

        match outcome {
            Ok(()) => Ok(Delivery::Enqueued),
            Err(None) => Ok(Delivery::Dropped),
            Err(Some(e)) => Err(e),
        }
    }

    /// `Err(None)` means dropped by policy
    async fn on_full(
        &self,
        tx: &mpsc::Sender<Message>,
        msg: Message,
    ) -> std::result::Result<(), Option<KernelError>> {
        match self.config.policy {
            BackpressurePolicy::Reject => Err(Some(self.full())),
            BackpressurePolicy::DropNewest => {
                tracing::warn!(
                    actor_id = %self.owner,
                    message_type = %msg.message_type(),
                    "Mailbox full, dropping newest message"
                );
                Err(None)
            }
            BackpressurePolicy::Block => {
                match tx.send_timeout(msg, self.config.block_timeout()).await {
                    Ok(()) => Ok(()),
                    Err(SendTimeoutError::Timeout(_)) => {
                        tracing::warn!(
                            actor_id = %self.owner,
                            timeout_ms = self.config.block_timeout_ms,
                            "Mailbox still full after blocking"
                        );
                        Err(Some(self.full()))
                    }
                    Err(SendTimeoutError::Closed(_)) => Err(self.closed()),
                }
            }
        }
    }

    fn full(&self) -> KernelError {
        KernelError::MailboxFull {
            actor: self.owner.clone(),
            capacity: self.config.capacity.limit().unwrap_or(usize::MAX),
        }
    }

    fn closed(&self) -> Option<KernelError> {
        Some(KernelError::MailboxClosed {
            actor: self.owner.clone(),
        })
    }
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("owner", &self.owner)
            .field("depth", &self.depth())
            .field("config", &self.config)
            .finish()
    }
}

impl MailboxReceiver {
    pub fn owner(&self) -> &ActorId {
        &self.owner
    }

    /// Wait for the next message; `None` once closed and drained
    pub async fn take(&mut self) -> Option<Message> {
        match &mut self.rx {
            MailboxRx::Bounded(rx) => rx.recv().await,
            MailboxRx::Unbounded(rx) => {
                let msg = rx.recv().await;
                if msg.is_some() {
                    self.unbounded_depth.fetch_sub(1, Ordering::AcqRel);
                }
                msg
            }
        }
    }

    /// Next message if one is present, without waiting
    pub fn try_take(&mut self) -> Option<Message> {
        let result = match &mut self.rx {
            MailboxRx::Bounded(rx) => rx.try_recv(),
            MailboxRx::Unbounded(rx) => rx.try_recv().inspect(|_| {
                self.unbounded_depth.fetch_sub(1, Ordering::AcqRel);
            }),
        };
        match result {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Stop accepting deliveries; the backlog stays takeable
    pub fn close(&mut self) {
        match &mut self.rx {
            MailboxRx::Bounded(rx) => rx.close(),
            MailboxRx::Unbounded(rx) => rx.close(),
        }
    }

    pub fn depth(&self) -> usize {
        match &self.rx {
            MailboxRx::Bounded(rx) => rx.len(),
            MailboxRx::Unbounded(rx) => rx.len(),
        }
    }
}
