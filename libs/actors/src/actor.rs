//! Actor contract and per-actor message loop
//!
//! Each registered actor runs as its own tokio task that owns the
//! behavior and the receiving half of the mailbox. The rest of the kernel
//! only ever holds an `ActorRef`, which validates and enqueues.
//!
//! # Lifecycle
//!
//! ```text
//! Created --on_start--> Running --shutdown/Stop--> Draining --on_stop--> Stopped
//! ```
//!
//! Only a `Running` actor accepts deliveries. On shutdown the mailbox is
//! closed and whatever is already in it is processed before `on_stop`.

use crate::error::{KernelError, Result};
use crate::mailbox::{Delivery, Mailbox, MailboxReceiver};
use crate::message::{Message, MessageType};
use crate::registry::ActorId;
use crate::scheduler::Scheduled;
use crate::shutdown::ShutdownSignal;
use crate::system::SystemHandle;
use crate::telemetry::{KernelEvent, Telemetry};
use crate::time::SimTime;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Lifecycle state of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorState {
    Created,
    Running,
    Draining,
    Stopped,
}

impl ActorState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ActorState::Created,
            1 => ActorState::Running,
            2 => ActorState::Draining,
            _ => ActorState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ActorState::Created => 0,
            ActorState::Running => 1,
            ActorState::Draining => 2,
            ActorState::Stopped => 3,
        }
    }
}

impl fmt::Display for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActorState::Created => "created",
            ActorState::Running => "running",
            ActorState::Draining => "draining",
            ActorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        StateCell(AtomicU8::new(ActorState::Created.as_u8()))
    }

    fn load(&self) -> ActorState {
        ActorState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn swap(&self, state: ActorState) -> ActorState {
        ActorState::from_u8(self.0.swap(state.as_u8(), Ordering::AcqRel))
    }
}

/// Whether an actor handles a message type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Accept,
    Reject,
}

/// Message types an actor declares it handles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accepts {
    Any,
    Only(HashSet<MessageType>),
}

impl Accepts {
    pub fn only<I, T>(types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<MessageType>,
    {
        Accepts::Only(types.into_iter().map(Into::into).collect())
    }

    pub fn handles(&self, message_type: &MessageType) -> Disposition {
        match self {
            Accepts::Any => Disposition::Accept,
            Accepts::Only(types) if types.contains(message_type) => Disposition::Accept,
            Accepts::Only(_) => Disposition::Reject,
        }
    }
}

impl Default for Accepts {
    fn default() -> Self {
        Accepts::Any
    }
}

/// What the actor loop does after a processing failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorDirective {
    /// Keep processing
    Resume,
    /// Stop this actor; the simulation carries on
    Stop,
    /// Stop the whole run with `ActorFailed`
    Escalate,
}

/// Domain behavior of an actor
#[async_trait]
pub trait ActorBehavior: Send + 'static {
    /// Message types this actor handles; anything else is rejected at delivery
    fn accepts(&self) -> Accepts {
        Accepts::Any
    }

    /// Handle one delivered message
    async fn process(&mut self, msg: &Message, ctx: &ActorContext) -> Result<()>;

    /// Called before the actor accepts anything; an error aborts registration
    async fn on_start(&mut self, _ctx: &ActorContext) -> Result<()> {
        Ok(())
    }

    /// Called after the backlog is drained
    async fn on_stop(&mut self, _ctx: &ActorContext) -> Result<()> {
        Ok(())
    }

    /// Handle failure - return supervision directive
    async fn on_error(&mut self, error: &KernelError, _ctx: &ActorContext) -> SupervisorDirective {
        error!(error = %error, "Actor error");
        SupervisorDirective::Resume
    }
}

struct ActorCell {
    id: ActorId,
    mailbox: Mailbox,
    accepts: Accepts,
    state: StateCell,
    actor_type: &'static str,
}

/// Shared handle to a registered actor
#[derive(Clone)]
pub struct ActorRef {
    cell: Arc<ActorCell>,
}

impl ActorRef {
    pub(crate) fn new(
        id: ActorId,
        mailbox: Mailbox,
        accepts: Accepts,
        actor_type: &'static str,
    ) -> Self {
        Self {
            cell: Arc::new(ActorCell {
                id,
                mailbox,
                accepts,
                state: StateCell::new(),
                actor_type,
            }),
        }
    }

    pub fn id(&self) -> &ActorId {
        &self.cell.id
    }

    pub fn actor_type(&self) -> &'static str {
        self.cell.actor_type
    }

    pub fn state(&self) -> ActorState {
        self.cell.state.load()
    }

    pub fn mailbox_depth(&self) -> usize {
        self.cell.mailbox.depth()
    }

    pub fn handles(&self, message_type: &MessageType) -> Disposition {
        self.cell.accepts.handles(message_type)
    }

    /// Validate and enqueue a delivered message
    ///
    /// Nothing is enqueued when validation fails. `Delivery::Dropped` means
    /// the mailbox was full under the drop policy.
    pub async fn receive(&self, msg: Message) -> Result<Delivery> {
        if msg.recipient() != self.id() {
            return Err(KernelError::InvalidRecipient {
                actor: self.id().clone(),
                recipient: msg.recipient().clone(),
            });
        }
        if self.handles(msg.message_type()) == Disposition::Reject {
            return Err(KernelError::UnknownMessageType {
                actor: self.id().clone(),
                message_type: msg.message_type().clone(),
            });
        }
        if msg.is_processed() {
            return Err(KernelError::AlreadyProcessed {
                message_type: msg.message_type().clone(),
                sender: msg.sender().clone(),
            });
        }
        let state = self.state();
        if state != ActorState::Running {
            return Err(KernelError::NotAccepting {
                actor: self.id().clone(),
                state,
            });
        }
        self.cell.mailbox.deliver(msg).await
    }

    /// Returns the previous state
    pub(crate) fn transition(&self, to: ActorState) -> ActorState {
        self.cell.state.swap(to)
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", self.id())
            .field("actor_type", &self.actor_type())
            .field("state", &self.state())
            .field("mailbox_depth", &self.mailbox_depth())
            .finish()
    }
}

/// What an actor may do to the rest of the system
///
/// There is no clock accessor: an actor learns the time from the delivery
/// stamp on the message it is processing.
#[derive(Clone)]
pub struct ActorContext {
    id: ActorId,
    system: SystemHandle,
}

impl ActorContext {
    pub(crate) fn new(id: ActorId, system: SystemHandle) -> Self {
        Self { id, system }
    }

    pub fn id(&self) -> &ActorId {
        &self.id
    }

    pub fn system_id(&self) -> &str {
        self.system.system_id()
    }

    /// Message from this actor to `recipient`
    pub fn message(
        &self,
        message_type: impl Into<MessageType>,
        recipient: impl Into<ActorId>,
        content: serde_json::Value,
    ) -> Message {
        Message::new(message_type, self.id.clone(), recipient, content)
    }

    pub async fn schedule_at(&self, time: SimTime, msg: Message) -> Result<Scheduled> {
        self.system.schedule_event(time, msg).await
    }

    pub async fn schedule_after(&self, delta: f64, msg: Message) -> Result<Scheduled> {
        self.system.schedule_after(delta, msg).await
    }

    /// Deliver at the current simulation time
    pub async fn dispatch(&self, msg: Message) -> Result<Scheduled> {
        self.system.dispatch_message(msg).await
    }

    pub fn request_shutdown(&self, reason: impl Into<String>) -> bool {
        self.system.request_shutdown(reason)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.system.is_shutting_down()
    }
}

impl fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorContext")
            .field("id", &self.id)
            .field("system_id", &self.system.system_id())
            .finish()
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Runs one actor: start-up handshake, message loop, drain, stop
pub(crate) struct ActorTask {
    actor: ActorRef,
    behavior: Box<dyn ActorBehavior>,
    receiver: MailboxReceiver,
    ctx: ActorContext,
    telemetry: Telemetry,
    shutdown: ShutdownSignal,
}

impl ActorTask {
    pub(crate) fn new(
        actor: ActorRef,
        behavior: Box<dyn ActorBehavior>,
        receiver: MailboxReceiver,
        ctx: ActorContext,
        telemetry: Telemetry,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            actor,
            behavior,
            receiver,
            ctx,
            telemetry,
            shutdown,
        }
    }

    fn id(&self) -> &ActorId {
        self.actor.id()
    }

    fn set_state(&self, to: ActorState) {
        let from = self.actor.transition(to);
        if from != to {
            debug!(actor_id = %self.id(), from = %from, to = %to, "Actor state changed");
            self.telemetry.emit(KernelEvent::ActorStateChanged {
                actor: self.id().clone(),
                from,
                to,
            });
        }
    }

    /// `started` resolves once the actor accepts messages, or with the
    /// `on_start` error. A failed start is not a run failure.
    pub(crate) async fn run(mut self, started: oneshot::Sender<Result<()>>) -> Result<()> {
        let task_start = Instant::now();
        info!(
            actor_id = %self.id(),
            actor_type = self.actor.actor_type(),
            "Starting actor task execution"
        );

        if let Err(e) = self.behavior.on_start(&self.ctx).await {
            error!(
                actor_id = %self.id(),
                error = %e,
                startup_duration_ms = task_start.elapsed().as_millis(),
                "Actor failed to start during initialization"
            );
            self.set_state(ActorState::Stopped);
            let _ = started.send(Err(e));
            return Ok(());
        }

        self.set_state(ActorState::Running);
        let _ = started.send(Ok(()));
        debug!(
            actor_id = %self.id(),
            startup_duration_ms = task_start.elapsed().as_millis(),
            "Actor successfully started, entering message loop"
        );

        let mut outcome = self.message_loop().await;

        self.set_state(ActorState::Draining);
        self.receiver.close();
        if outcome.is_ok() {
            outcome = self.drain().await;
        }

        let shutdown_start = Instant::now();
        if let Err(e) = self.behavior.on_stop(&self.ctx).await {
            error!(
                actor_id = %self.id(),
                error = %e,
                shutdown_duration_ms = shutdown_start.elapsed().as_millis(),
                "Actor failed to stop cleanly"
            );
        }
        self.set_state(ActorState::Stopped);

        info!(
            actor_id = %self.id(),
            total_runtime_ms = task_start.elapsed().as_millis(),
            "Actor task execution completed"
        );
        outcome
    }

    async fn message_loop(&mut self) -> Result<()> {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.wait() => return Ok(()),
                msg = self.receiver.take() => msg,
            };
            let Some(msg) = next else {
                return Ok(());
            };
            if let Flow::Stop = self.handle(msg).await? {
                return Ok(());
            }
        }
    }

    /// Process what was queued before the mailbox closed
    async fn drain(&mut self) -> Result<()> {
        let mut drained = 0usize;
        while let Some(msg) = self.receiver.try_take() {
            drained += 1;
            if let Flow::Stop = self.handle(msg).await? {
                break;
            }
        }
        if drained > 0 {
            debug!(actor_id = %self.id(), drained, "Drained mailbox backlog");
        }
        Ok(())
    }

    async fn handle(&mut self, mut msg: Message) -> Result<Flow> {
        let start = Instant::now();
        let result = self.behavior.process(&msg, &self.ctx).await;
        let flow = match result {
            Ok(()) => {
                self.telemetry
                    .metrics()
                    .record_message_processed(start.elapsed());
                Ok(Flow::Continue)
            }
            Err(error) => self.supervise(&msg, error, start).await,
        };

        // The directive is settled before the dispatcher is released, so a
        // stopping actor no longer accepts the next event.
        if let Err(e) = msg.mark_processed() {
            warn!(actor_id = %self.id(), error = %e, "Message completed twice");
        }
        flow
    }

    async fn supervise(
        &mut self,
        msg: &Message,
        error: KernelError,
        start: Instant,
    ) -> Result<Flow> {
        error!(
            actor_id = %self.id(),
            message_type = %msg.message_type(),
            error = %error,
            error_category = error.category(),
            processing_duration_ns = start.elapsed().as_nanos() as u64,
            "Actor message processing failed"
        );
        self.telemetry.emit(KernelEvent::ProcessingFailed {
            actor: self.id().clone(),
            error: error.clone(),
        });

        match self.behavior.on_error(&error, &self.ctx).await {
            SupervisorDirective::Resume => {
                debug!(actor_id = %self.id(), directive = "Resume", "Actor resumed after error");
                Ok(Flow::Continue)
            }
            SupervisorDirective::Stop => {
                warn!(
                    actor_id = %self.id(),
                    directive = "Stop",
                    error = %error,
                    "Stopping actor due to error directive"
                );
                self.set_state(ActorState::Draining);
                Ok(Flow::Stop)
            }
            SupervisorDirective::Escalate => {
                error!(
                    actor_id = %self.id(),
                    directive = "Escalate",
                    error = %error,
                    "Escalating actor failure"
                );
                self.set_state(ActorState::Draining);
                let failure = KernelError::actor_failed(self.id().clone(), error.to_string());
                self.telemetry.emit(KernelEvent::ActorFailed {
                    error: failure.clone(),
                });
                Err(failure)
            }
        }
    }
}
