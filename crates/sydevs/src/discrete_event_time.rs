//! The superdense time coordinate `(t, c)` that orders every event in a
//! simulation run.

use sydevs_types::TimePoint;
use std::fmt;

/// A simulated instant plus a "superdense" index `c` distinguishing
/// multiple events that occur at the same `t`.
///
/// `c` increments by exactly one per dispatched event; it resets to zero
/// whenever `t` itself advances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscreteEventTime {
    t: TimePoint,
    c: i64,
}

impl DiscreteEventTime {
    pub fn new(t: TimePoint) -> Self {
        Self { t, c: 0 }
    }

    pub fn t(&self) -> &TimePoint {
        &self.t
    }

    pub fn c(&self) -> i64 {
        self.c
    }

    /// Replaces the time point and resets `c` to zero.
    pub fn set_time(&mut self, t: TimePoint) {
        self.t = t;
        self.c = 0;
    }

    /// Advances the superdense index for the next event at the same `t`.
    pub fn tick(&mut self) -> i64 {
        self.c += 1;
        self.c
    }
}

impl PartialOrd for DiscreteEventTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DiscreteEventTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.t.cmp(&other.t).then(self.c.cmp(&other.c))
    }
}

impl fmt::Display for DiscreteEventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.t, self.c)
    }
}
