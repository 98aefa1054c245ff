//! Per-event retained timestamps, used by nodes that need to report an
//! elapsed duration since some earlier point without storing a whole
//! `TimePoint` per event. Ported from `sydevs::time_cache`.

use std::collections::HashMap;

use sydevs_types::{Duration, Scale, TimePoint};

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    retention_time: TimePoint,
    precision: Scale,
}

/// Maps event ids to the time they were last retained at, evicting
/// entries whose elapsed duration becomes impossible to represent
/// exactly at their subscribed precision as time advances.
pub struct TimeCache {
    entries: HashMap<i64, CacheEntry>,
}

impl TimeCache {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Records `current_time` as the retention point for `event_id` at
    /// `precision`, overwriting any prior retention.
    pub fn retain_event(&mut self, event_id: i64, precision: Scale, current_time: &TimePoint) {
        self.entries.insert(
            event_id,
            CacheEntry { retention_time: current_time.clone(), precision },
        );
    }

    pub fn release_event(&mut self, event_id: i64) -> bool {
        self.entries.remove(&event_id).is_some()
    }

    /// Drops entries whose retained duration is no longer exactly
    /// representable at `t` (i.e. `t` has advanced past what the entry's
    /// precision can still distinguish).
    pub fn advance_time(&mut self, t: &TimePoint) {
        self.entries.retain(|_, entry| {
            let dt = t.diff(&entry.retention_time).rescaled(entry.precision);
            dt.finite()
        });
    }

    /// Duration elapsed since `event_id` was retained, at its recorded
    /// precision; infinite if the id is unknown.
    pub fn duration_since(&self, event_id: i64, current_time: &TimePoint) -> Duration {
        match self.entries.get(&event_id) {
            Some(entry) => current_time.diff(&entry.retention_time).rescaled(entry.precision),
            None => Duration::inf(),
        }
    }

    pub fn event_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TimeCache {
    fn default() -> Self {
        Self::new()
    }
}
