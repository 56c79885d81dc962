//! Scheduled events
//!
//! An `Event` pairs a message with the simulation time it is scheduled
//! for. `Ord` is reversed on `(time, id)` so that `BinaryHeap<Event>` pops
//! the earliest time first and, among equal times, the earliest submission.

use crate::message::Message;
use crate::time::SimTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Submission sequence number, strictly increasing per scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(u64);

impl EventId {
    pub(crate) fn new(raw: u64) -> Self {
        EventId(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// A message waiting in the scheduler queue. Immutable once queued.
#[derive(Debug)]
pub struct Event {
    id: EventId,
    time: SimTime,
    message: Message,
}

impl Event {
    pub(crate) fn new(id: EventId, time: SimTime, message: Message) -> Self {
        Self { id, time, message }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Ordering key
    pub fn key(&self) -> (SimTime, EventId) {
        (self.time, self.id)
    }

    pub(crate) fn into_message(self) -> Message {
        self.message
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: smallest (time, id) is the heap maximum.
        other.key().cmp(&self.key())
    }
}
