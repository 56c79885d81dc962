//! Kernel Telemetry
//!
//! The kernel reports lifecycle, dispatch and error events to an injected
//! `TelemetryObserver`; where those events end up is the observer's
//! business. Counters in `KernelMetrics` are kept regardless of the
//! observer and end up in the run report.

use crate::actor::ActorState;
use crate::error::KernelError;
use crate::event::EventId;
use crate::message::MessageType;
use crate::registry::ActorId;
use crate::time::SimTime;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Structured kernel event
#[derive(Debug, Clone, PartialEq)]
pub enum KernelEvent {
    ActorRegistered {
        actor: ActorId,
        actor_type: &'static str,
    },
    ActorStateChanged {
        actor: ActorId,
        from: ActorState,
        to: ActorState,
    },
    EventScheduled {
        id: EventId,
        time: SimTime,
        message_type: MessageType,
        recipient: ActorId,
    },
    /// Queue full under the drop policy
    EventDropped {
        time: SimTime,
        message_type: MessageType,
        recipient: ActorId,
    },
    EventDispatched {
        id: EventId,
        scheduled: SimTime,
        delivered: SimTime,
        message_type: MessageType,
        sender: ActorId,
        recipient: ActorId,
    },
    ClockAdvanced {
        from: SimTime,
        to: SimTime,
    },
    LateEvent {
        id: EventId,
        error: KernelError,
    },
    RoutingFailed {
        id: EventId,
        error: KernelError,
    },
    MessageRejected {
        actor: ActorId,
        error: KernelError,
    },
    /// Mailbox full under the drop policy
    MessageDropped {
        actor: ActorId,
        message_type: MessageType,
    },
    ProcessingFailed {
        actor: ActorId,
        error: KernelError,
    },
    ProcessingTimedOut {
        id: EventId,
        error: KernelError,
    },
    ActorFailed {
        error: KernelError,
    },
    ShutdownRequested {
        reason: String,
    },
}

/// Sink for kernel events
pub trait TelemetryObserver: Send + Sync {
    fn observe(&self, event: &KernelEvent);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl TelemetryObserver for NullObserver {
    fn observe(&self, _event: &KernelEvent) {}
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<KernelEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<KernelEvent> {
        self.events.lock().clone()
    }

    /// Events for which `pred` holds
    pub fn matching<F>(&self, pred: F) -> Vec<KernelEvent>
    where
        F: Fn(&KernelEvent) -> bool,
    {
        self.events.lock().iter().filter(|e| pred(e)).cloned().collect()
    }

    /// Dispatches in the order they happened
    pub fn dispatches(&self) -> Vec<KernelEvent> {
        self.matching(|e| matches!(e, KernelEvent::EventDispatched { .. }))
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl TelemetryObserver for RecordingObserver {
    fn observe(&self, event: &KernelEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Kernel-wide counters
#[derive(Debug, Default)]
pub struct KernelMetrics {
    pub actors_registered: AtomicU64,
    pub actors_stopped: AtomicU64,
    pub events_scheduled: AtomicU64,
    pub events_dropped: AtomicU64,
    pub events_dispatched: AtomicU64,
    pub late_events: AtomicU64,
    pub routing_failures: AtomicU64,
    pub messages_rejected: AtomicU64,
    pub messages_dropped: AtomicU64,
    pub messages_processed: AtomicU64,
    pub processing_failures: AtomicU64,
    pub processing_timeouts: AtomicU64,
    pub total_processing_time_ns: AtomicU64,
}

impl KernelMetrics {
    pub fn record_message_processed(&self, duration: Duration) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn avg_processing_time_ns(&self) -> f64 {
        let count = self.messages_processed.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_processing_time_ns.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    fn record(&self, event: &KernelEvent) {
        let counter = match event {
            KernelEvent::ActorRegistered { .. } => &self.actors_registered,
            KernelEvent::ActorStateChanged {
                to: ActorState::Stopped,
                ..
            } => &self.actors_stopped,
            KernelEvent::EventScheduled { .. } => &self.events_scheduled,
            KernelEvent::EventDropped { .. } => &self.events_dropped,
            KernelEvent::EventDispatched { .. } => &self.events_dispatched,
            KernelEvent::LateEvent { .. } => &self.late_events,
            KernelEvent::RoutingFailed { .. } => &self.routing_failures,
            KernelEvent::MessageRejected { .. } => &self.messages_rejected,
            KernelEvent::MessageDropped { .. } => &self.messages_dropped,
            KernelEvent::ProcessingFailed { .. } => &self.processing_failures,
            KernelEvent::ProcessingTimedOut { .. } => &self.processing_timeouts,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            actors_registered: self.actors_registered.load(Ordering::Relaxed),
            actors_stopped: self.actors_stopped.load(Ordering::Relaxed),
            events_scheduled: self.events_scheduled.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            late_events: self.late_events.load(Ordering::Relaxed),
            routing_failures: self.routing_failures.load(Ordering::Relaxed),
            messages_rejected: self.messages_rejected.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            processing_failures: self.processing_failures.load(Ordering::Relaxed),
            processing_timeouts: self.processing_timeouts.load(Ordering::Relaxed),
            avg_processing_time_ns: self.avg_processing_time_ns(),
        }
    }
}

/// Point-in-time copy of the kernel counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub actors_registered: u64,
    pub actors_stopped: u64,
    pub events_scheduled: u64,
    pub events_dropped: u64,
    pub events_dispatched: u64,
    pub late_events: u64,
    pub routing_failures: u64,
    pub messages_rejected: u64,
    pub messages_dropped: u64,
    pub messages_processed: u64,
    pub processing_failures: u64,
    pub processing_timeouts: u64,
    pub avg_processing_time_ns: f64,
}

/// Observer plus counters, shared by every kernel component
#[derive(Clone)]
pub struct Telemetry {
    observer: Arc<dyn TelemetryObserver>,
    metrics: Arc<KernelMetrics>,
}

impl Telemetry {
    pub fn new(observer: Arc<dyn TelemetryObserver>) -> Self {
        Self {
            observer,
            metrics: Arc::new(KernelMetrics::default()),
        }
    }

    pub fn emit(&self, event: KernelEvent) {
        self.metrics.record(&event);
        self.observer.observe(&event);
    }

    pub fn metrics(&self) -> &Arc<KernelMetrics> {
        &self.metrics
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(Arc::new(NullObserver))
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}
