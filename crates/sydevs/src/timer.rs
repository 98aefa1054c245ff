//! Per-node wall-clock accounting.
//!
//! Distinct from simulated time: this measures how long the host CPU
//! actually spends inside one node's handlers, for profiling a run
//! after the fact. Every node pairs [`Timer::start`]/[`Timer::stop`]
//! around each framework-dispatched handler call, even when the
//! handler returns an error, so a run's per-node cost accounting stays
//! accurate regardless of how it ends.

use std::time::{Duration, Instant};

/// Accumulates wall-clock time spent inside one node's handlers.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    accumulated: Duration,
    running_since: Option<Instant>,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            accumulated: Duration::ZERO,
            running_since: None,
        }
    }

    /// Begins timing a handler call. A second `start` before the
    /// matching `stop` is a bug in the dispatch wrapper, not a user
    /// error, so it simply restarts the clock rather than nesting.
    pub fn start(&mut self) {
        self.running_since = Some(Instant::now());
    }

    /// Ends timing and folds the elapsed time into the running total.
    /// A `stop` with no matching `start` is a no-op.
    pub fn stop(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed();
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.accumulated
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_without_start_is_a_no_op() {
        let mut timer = Timer::new();
        timer.stop();
        assert_eq!(timer.elapsed(), Duration::ZERO);
    }

    #[test]
    fn start_then_stop_accumulates_elapsed_time() {
        let mut timer = Timer::new();
        timer.start();
        assert!(timer.is_running());
        std::thread::sleep(Duration::from_millis(1));
        timer.stop();
        assert!(!timer.is_running());
        assert!(timer.elapsed() >= Duration::from_millis(1));
    }

    #[test]
    fn repeated_start_stop_accumulates_across_calls() {
        let mut timer = Timer::new();
        timer.start();
        timer.stop();
        let first = timer.elapsed();
        timer.start();
        timer.stop();
        assert!(timer.elapsed() >= first);
    }
}
