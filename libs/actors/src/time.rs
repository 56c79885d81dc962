//! Simulation Time
//!
//! Logical timestamps with no dependency on wall-clock time. A `SimTime`
//! is always finite and non-negative, which gives it a total order and
//! lets the scheduler key its heap on it directly.

use crate::error::{KernelError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A point on the logical simulation clock
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SimTime(f64);

impl SimTime {
    /// The zero-point of simulation time.
    pub const ZERO: SimTime = SimTime(0.0);

    /// Create a time value, rejecting negative, NaN and infinite input
    pub fn new(value: f64) -> Result<Self> {
        if value.is_finite() && value >= 0.0 {
            // Normalise -0.0 so that equality and ordering agree.
            Ok(SimTime(value + 0.0))
        } else {
            Err(KernelError::InvalidTime(value))
        }
    }

    /// Raw value
    #[inline]
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Time `delta` units after `self`
    pub fn plus(self, delta: f64) -> Result<Self> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(KernelError::InvalidTime(delta));
        }
        SimTime::new(self.0 + delta)
    }

    /// Returns `true` if `self` is strictly before `other`.
    #[inline]
    pub fn is_before(self, other: SimTime) -> bool {
        self < other
    }

    /// Elapsed time since `earlier`, `None` if `earlier` is later
    pub fn duration_since(self, earlier: SimTime) -> Option<f64> {
        if earlier > self {
            None
        } else {
            Some(self.0 - earlier.0)
        }
    }

    pub(crate) fn to_bits(self) -> u64 {
        self.0.to_bits()
    }

    pub(crate) fn from_bits(bits: u64) -> Self {
        SimTime(f64::from_bits(bits))
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl TryFrom<f64> for SimTime {
    type Error = KernelError;

    fn try_from(value: f64) -> Result<Self> {
        SimTime::new(value)
    }
}

impl From<SimTime> for f64 {
    fn from(time: SimTime) -> f64 {
        time.0
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T={}", self.0)
    }
}
