//! Kernel Error Types
//!
//! One error enum covers registration, routing, actor-level validation,
//! backpressure, timing and consistency failures. Only the consistency
//! failures (`QueueCorrupted`, `SchedulerFailed`, `ActorFailed`) are fatal
//! to a run; every other variant is reported and the failing loop carries on.

use crate::actor::ActorState;
use crate::message::MessageType;
use crate::registry::ActorId;
use crate::time::SimTime;
use thiserror::Error;

/// Main kernel error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    /// Registration under an identity that is already taken
    #[error("actor '{0}' is already registered")]
    DuplicateIdentity(ActorId),

    /// Dispatch-time routing failure, the event is dropped
    #[error("no actor registered as '{0}'")]
    RecipientNotFound(ActorId),

    /// Message handed to an actor it is not addressed to
    #[error("message addressed to '{recipient}' was handed to '{actor}'")]
    InvalidRecipient { actor: ActorId, recipient: ActorId },

    /// Actor does not handle this message type
    #[error("actor '{actor}' does not handle message type '{message_type}'")]
    UnknownMessageType {
        actor: ActorId,
        message_type: MessageType,
    },

    /// Mailbox backpressure
    #[error("mailbox of '{actor}' is full (capacity {capacity})")]
    MailboxFull { actor: ActorId, capacity: usize },

    /// Mailbox receiver is gone or draining
    #[error("mailbox of '{actor}' is closed")]
    MailboxClosed { actor: ActorId },

    /// Actor is not in the Running state
    #[error("actor '{actor}' is {state} and not accepting messages")]
    NotAccepting { actor: ActorId, state: ActorState },

    /// Scheduler queue backpressure
    #[error("scheduler queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Event scheduled behind the clock at dispatch
    #[error("late event: scheduled at {scheduled} while the clock is at {clock}")]
    LateEvent { scheduled: SimTime, clock: SimTime },

    /// Synchronous wait for processing exceeded its bound
    #[error("actor '{actor}' did not finish processing within {timeout_ms}ms")]
    ProcessingTimeout { actor: ActorId, timeout_ms: u64 },

    /// Second processing attempt on the same message
    #[error("message '{message_type}' from '{sender}' was already processed")]
    AlreadyProcessed {
        message_type: MessageType,
        sender: ActorId,
    },

    /// Time value that is negative, NaN or infinite
    #[error("invalid simulation time {0}")]
    InvalidTime(f64),

    /// Actor failed to come up
    #[error("actor '{actor}' failed to start: {message}")]
    StartupFailed { actor: ActorId, message: String },

    /// Domain processing error returned from an actor
    #[error("processing error: {message}")]
    Processing { message: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Heap ordering no longer holds, simulation time cannot be trusted
    #[error("scheduler queue corrupted: {message}")]
    QueueCorrupted { message: String },

    /// Scheduler loop panicked, no further events can be dispatched
    #[error("scheduler failed: {message}")]
    SchedulerFailed { message: String },

    /// Actor escalated a failure or its loop panicked
    #[error("actor '{actor}' failed: {message}")]
    ActorFailed { actor: ActorId, message: String },
}

/// Result type alias for kernel operations
pub type Result<T> = std::result::Result<T, KernelError>;

impl KernelError {
    /// Create a processing error
    pub fn processing(message: impl Into<String>) -> Self {
        Self::Processing {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    /// Create a queue corruption error
    pub fn queue_corrupted(message: impl Into<String>) -> Self {
        Self::QueueCorrupted {
            message: message.into(),
        }
    }

    /// Create a scheduler failure
    pub fn scheduler_failed(message: impl Into<String>) -> Self {
        Self::SchedulerFailed {
            message: message.into(),
        }
    }

    /// Create an actor failure
    pub fn actor_failed(actor: ActorId, message: impl Into<String>) -> Self {
        Self::ActorFailed {
            actor,
            message: message.into(),
        }
    }

    /// Errors that halt the run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            KernelError::QueueCorrupted { .. }
                | KernelError::SchedulerFailed { .. }
                | KernelError::ActorFailed { .. }
        )
    }

    /// Errors that are reported while the loop continues
    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }

    /// Get error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            KernelError::DuplicateIdentity(_) | KernelError::StartupFailed { .. } => "registration",
            KernelError::RecipientNotFound(_) => "routing",
            KernelError::InvalidRecipient { .. }
            | KernelError::UnknownMessageType { .. }
            | KernelError::NotAccepting { .. }
            | KernelError::AlreadyProcessed { .. } => "validation",
            KernelError::MailboxFull { .. }
            | KernelError::MailboxClosed { .. }
            | KernelError::QueueFull { .. } => "backpressure",
            KernelError::LateEvent { .. }
            | KernelError::InvalidTime(_)
            | KernelError::ProcessingTimeout { .. } => "timing",
            KernelError::Processing { .. } => "processing",
            KernelError::Configuration { .. } => "configuration",
            KernelError::QueueCorrupted { .. }
            | KernelError::SchedulerFailed { .. }
            | KernelError::ActorFailed { .. } => "fatal",
        }
    }
}
