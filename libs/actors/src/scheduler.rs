//! Event Scheduler
//!
//! Owns the logical clock and the time-ordered event queue, and is the only
//! writer of either. A `BinaryHeap` with reversed `Ord` on `Event` acts as a
//! min-heap keyed by `(time, submission id)`, so equal times dispatch in
//! submission order and a fixed input always yields the same delivery
//! sequence.
//!
//! # Dispatch
//!
//! 1. Pop the earliest event (suspending while the queue is empty)
//! 2. Advance the clock to its time, or flag it as late and leave the clock
//! 3. Stamp the delivery time and resolve the recipient in the registry
//! 4. Hand the message to `ActorRef::receive`
//! 5. In `AwaitProcessed` mode, wait (bounded) for the completion signal
//!
//! Routing and validation failures are reported and the loop carries on.
//! A heap that surfaces an event it should have surfaced earlier is fatal.

use crate::config::{DispatchMode, SchedulerConfig};
use crate::error::{KernelError, Result};
use crate::event::{Event, EventId};
use crate::mailbox::{BackpressurePolicy, Delivery};
use crate::message::Message;
use crate::registry::ActorRegistry;
use crate::shutdown::ShutdownTrigger;
use crate::telemetry::{KernelEvent, Telemetry};
use crate::time::SimTime;
use parking_lot::Mutex;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome of a submission that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduled {
    Queued(EventId),
    /// Dropped under the `DropNewest` policy
    Dropped,
}

impl Scheduled {
    pub fn event_id(&self) -> Option<EventId> {
        match self {
            Scheduled::Queued(id) => Some(*id),
            Scheduled::Dropped => None,
        }
    }
}

/// The dispatcher's view of the head of the queue
#[derive(Debug)]
enum Next {
    Event(Event),
    BeyondHorizon(SimTime),
    Idle,
}

/// Highest key dispatched so far and the submission counter when it was
/// popped. Anything submitted before that pop must not surface below it.
#[derive(Debug, Clone, Copy)]
struct HighWater {
    key: (SimTime, EventId),
    next_id_at_pop: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<Event>,
    next_id: u64,
    high_water: Option<HighWater>,
}

impl QueueState {
    fn check_and_record(&mut self, event: &Event) -> Result<()> {
        let key = event.key();
        if let Some(mark) = self.high_water {
            if key < mark.key {
                if key.1.raw() < mark.next_id_at_pop {
                    return Err(KernelError::queue_corrupted(format!(
                        "{} at {} surfaced after {} at {}",
                        key.1, key.0, mark.key.1, mark.key.0
                    )));
                }
                return Ok(());
            }
        }
        self.high_water = Some(HighWater {
            key,
            next_id_at_pop: self.next_id,
        });
        Ok(())
    }
}

struct SchedulerShared {
    queue: Mutex<QueueState>,
    /// Wakes the dispatcher when something is queued
    queued: Notify,
    /// Wakes submitters blocked on a full queue
    space: Notify,
    /// `SimTime` bits; written only by the dispatch loop
    clock: AtomicU64,
    horizon: Option<SimTime>,
    config: SchedulerConfig,
    telemetry: Telemetry,
}

/// Handle to the scheduler; clones share one clock and one queue
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, telemetry: Telemetry) -> Self {
        let horizon = config.horizon.and_then(|h| SimTime::new(h).ok());
        Self {
            shared: Arc::new(SchedulerShared {
                queue: Mutex::new(QueueState::default()),
                queued: Notify::new(),
                space: Notify::new(),
                clock: AtomicU64::new(SimTime::ZERO.to_bits()),
                horizon,
                config,
                telemetry,
            }),
        }
    }

    /// Current simulation time
    pub fn now(&self) -> SimTime {
        SimTime::from_bits(self.shared.clock.load(Ordering::Acquire))
    }

    /// Events waiting in the queue
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().heap.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Queue `message` for delivery at `time`
    ///
    /// Any time is accepted, including one the clock has already passed;
    /// such an event is flagged as late when it is dispatched.
    pub async fn schedule_at(&self, time: SimTime, message: Message) -> Result<Scheduled> {
        let message = match self.try_push(time, message) {
            Ok(id) => return Ok(Scheduled::Queued(id)),
            Err(message) => message,
        };

        let capacity = self.capacity();
        match self.shared.config.queue_policy {
            BackpressurePolicy::Reject => {
                warn!(
                    capacity,
                    message_type = %message.message_type(),
                    recipient = %message.recipient(),
                    "Scheduler queue full, rejecting event"
                );
                Err(KernelError::QueueFull { capacity })
            }
            BackpressurePolicy::DropNewest => {
                warn!(
                    capacity,
                    message_type = %message.message_type(),
                    recipient = %message.recipient(),
                    "Scheduler queue full, dropping event"
                );
                self.shared.telemetry.emit(KernelEvent::EventDropped {
                    time,
                    message_type: message.message_type().clone(),
                    recipient: message.recipient().clone(),
                });
                Ok(Scheduled::Dropped)
            }
            BackpressurePolicy::Block => self.push_blocking(time, message).await,
        }
    }

    /// Queue `message` `delta` after the current time
    ///
    /// The current time is read now; the clock may move before the event is
    /// dispatched.
    pub async fn schedule_after(&self, delta: f64, message: Message) -> Result<Scheduled> {
        let time = self.now().plus(delta)?;
        self.schedule_at(time, message).await
    }

    /// Queue `message` at the current time without advancing the clock
    pub async fn dispatch_immediately(&self, message: Message) -> Result<Scheduled> {
        self.schedule_at(self.now(), message).await
    }

    fn capacity(&self) -> usize {
        self.shared
            .config
            .queue_capacity
            .limit()
            .unwrap_or(usize::MAX)
    }

    /// Push unless the queue is full, in which case the message comes back
    fn try_push(&self, time: SimTime, message: Message) -> std::result::Result<EventId, Message> {
        let message_type = message.message_type().clone();
        let recipient = message.recipient().clone();

        let mut state = self.shared.queue.lock();
        if let Some(limit) = self.shared.config.queue_capacity.limit() {
            if state.heap.len() >= limit {
                return Err(message);
            }
        }
        let id = EventId::new(state.next_id);
        state.next_id += 1;
        state.heap.push(Event::new(id, time, message));
        drop(state);

        self.shared.queued.notify_one();
        debug!(
            event_id = %id,
            scheduled = %time,
            message_type = %message_type,
            recipient = %recipient,
            "Event scheduled"
        );
        self.shared.telemetry.emit(KernelEvent::EventScheduled {
            id,
            time,
            message_type,
            recipient,
        });
        Ok(id)
    }

    async fn push_blocking(&self, time: SimTime, mut message: Message) -> Result<Scheduled> {
        let deadline = Instant::now() + self.shared.config.submit_timeout();
        loop {
            let notified = self.shared.space.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_push(time, message) {
                Ok(id) => return Ok(Scheduled::Queued(id)),
                Err(returned) => message = returned,
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let capacity = self.capacity();
                warn!(
                    capacity,
                    timeout_ms = self.shared.config.submit_timeout_ms,
                    "Scheduler queue still full after blocking"
                );
                return Err(KernelError::QueueFull { capacity });
            }
        }
    }

    /// Pop the head if it is due, without waiting
    fn try_pop(&self) -> Result<Option<Next>> {
        let mut state = self.shared.queue.lock();
        let head_time = match state.heap.peek() {
            Some(head) => head.time(),
            None => return Ok(None),
        };
        if let Some(horizon) = self.shared.horizon {
            if head_time > horizon {
                return Ok(Some(Next::BeyondHorizon(head_time)));
            }
        }
        let event = match state.heap.pop() {
            Some(event) => event,
            None => return Ok(None),
        };
        state.check_and_record(&event)?;
        drop(state);

        self.shared.space.notify_one();
        Ok(Some(Next::Event(event)))
    }

    /// Suspend until the queue has something to offer
    async fn wait_next(&self) -> Result<Next> {
        loop {
            let notified = self.shared.queued.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(next) = self.try_pop()? {
                return Ok(next);
            }
            notified.await;
        }
    }

    async fn next(&self) -> Result<Next> {
        match self.shared.config.idle_stop() {
            None => self.wait_next().await,
            Some(grace) => match tokio::time::timeout(grace, self.wait_next()).await {
                Ok(next) => next,
                Err(_) => Ok(Next::Idle),
            },
        }
    }

    /// Dispatch loop
    ///
    /// Runs until shutdown is requested. Returns an error only for failures
    /// that compromise simulation time, after requesting shutdown itself.
    pub async fn run(&self, registry: Arc<ActorRegistry>, shutdown: ShutdownTrigger) -> Result<()> {
        let mut signal = shutdown.subscribe();
        let telemetry = &self.shared.telemetry;
        info!(
            dispatch = ?self.shared.config.dispatch,
            pending = self.pending(),
            "Scheduler loop running"
        );

        loop {
            if signal.is_triggered() {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = signal.wait() => break,
                next = self.next() => next,
            };

            let outcome = match next {
                Ok(Next::Event(event)) => self.dispatch(event, &registry).await,
                Ok(Next::BeyondHorizon(time)) => {
                    info!(next_event = %time, clock = %self.now(), "Simulation horizon reached");
                    shutdown.request("simulation horizon reached", telemetry);
                    break;
                }
                Ok(Next::Idle) => {
                    info!(clock = %self.now(), "Scheduler queue idle");
                    shutdown.request("scheduler idle", telemetry);
                    break;
                }
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                error!(error = %e, clock = %self.now(), "Scheduler halted on fatal error");
                shutdown.request(format!("scheduler failed: {e}"), telemetry);
                return Err(e);
            }
        }

        info!(clock = %self.now(), pending = self.pending(), "Scheduler loop stopped");
        Ok(())
    }

    async fn dispatch(&self, event: Event, registry: &ActorRegistry) -> Result<()> {
        let telemetry = &self.shared.telemetry;
        let id = event.id();
        let scheduled = event.time();
        let clock = self.now();

        if scheduled > clock {
            self.shared
                .clock
                .store(scheduled.to_bits(), Ordering::Release);
            telemetry.emit(KernelEvent::ClockAdvanced {
                from: clock,
                to: scheduled,
            });
        } else if scheduled < clock {
            let error = KernelError::LateEvent { scheduled, clock };
            warn!(
                event_id = %id,
                scheduled = %scheduled,
                clock = %clock,
                "Late event, clock not moved"
            );
            telemetry.emit(KernelEvent::LateEvent { id, error });
        }

        let delivered = self.now();
        let mut message = event.into_message();
        message.stamp_delivery(delivered);

        let recipient = match registry.lookup(message.recipient()) {
            Some(actor) => actor,
            None => {
                let error = KernelError::RecipientNotFound(message.recipient().clone());
                warn!(
                    event_id = %id,
                    recipient = %message.recipient(),
                    message_type = %message.message_type(),
                    "Recipient not found, dropping event"
                );
                telemetry.emit(KernelEvent::RoutingFailed { id, error });
                return Ok(());
            }
        };

        let message_type = message.message_type().clone();
        debug!(
            event_id = %id,
            scheduled = %scheduled,
            delivered = %delivered,
            message_type = %message_type,
            sender = %message.sender(),
            recipient = %recipient.id(),
            "Dispatching event"
        );
        telemetry.emit(KernelEvent::EventDispatched {
            id,
            scheduled,
            delivered,
            message_type: message_type.clone(),
            sender: message.sender().clone(),
            recipient: recipient.id().clone(),
        });

        let completion = match self.shared.config.dispatch {
            DispatchMode::AwaitProcessed => Some(message.attach_completion()),
            DispatchMode::FireAndForget => None,
        };

        match recipient.receive(message).await {
            Ok(Delivery::Enqueued) => {}
            Ok(Delivery::Dropped) => {
                telemetry.emit(KernelEvent::MessageDropped {
                    actor: recipient.id().clone(),
                    message_type,
                });
                return Ok(());
            }
            Err(error) => {
                warn!(
                    event_id = %id,
                    actor_id = %recipient.id(),
                    error = %error,
                    "Message rejected"
                );
                telemetry.emit(KernelEvent::MessageRejected {
                    actor: recipient.id().clone(),
                    error,
                });
                return Ok(());
            }
        }

        if let Some(done) = completion {
            let timeout = self.shared.config.processing_timeout();
            match tokio::time::timeout(timeout, done).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    warn!(
                        event_id = %id,
                        actor_id = %recipient.id(),
                        "Message discarded before processing finished"
                    );
                }
                Err(_) => {
                    let error = KernelError::ProcessingTimeout {
                        actor: recipient.id().clone(),
                        timeout_ms: self.shared.config.processing_timeout_ms,
                    };
                    warn!(event_id = %id, error = %error, "Processing wait timed out");
                    telemetry.emit(KernelEvent::ProcessingTimedOut { id, error });
                }
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("clock", &self.now())
            .field("pending", &self.pending())
            .field("config", &self.shared.config)
            .finish()
    }
}
