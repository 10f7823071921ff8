//! Simulation clock: the engine's position on the wall-clock timeline.
//!
//! Time is supplied by the caller (client-observed wall clock), so tests
//! drive it explicitly and the clock only ever moves forward.

use crate::types::{DurationMs, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimClock {
    pub started_at: Timestamp,
    now:            Timestamp,
}

impl SimClock {
    pub fn new(now: Timestamp) -> Self {
        Self { started_at: now, now }
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn elapsed_ms(&self) -> DurationMs {
        self.now - self.started_at
    }

    /// Move forward to `t`. Returns false (and stays put) if `t` is in the past.
    pub fn advance_to(&mut self, t: Timestamp) -> bool {
        if t < self.now {
            return false;
        }
        self.now = t;
        true
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn wall_clock_ms() -> Timestamp {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
