//! A priority queue of scheduled event ids, keyed by precision-aware
//! "phase durations" so that mixed-precision plans compare in
//! chronological order. Ported from `sydevs::time_queue`.

use std::collections::{BTreeMap, HashSet};

use sydevs_types::{Duration, Scale, TimePoint, QUANTITY_LIMIT};

use crate::error::{KernelError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PhaseDuration {
    multiplier: i64,
    precision: Scale,
}

impl PhaseDuration {
    fn as_duration(self) -> Duration {
        Duration::new(self.multiplier, self.precision)
    }
}

#[derive(Debug, Clone, Copy)]
struct EventAccount {
    phase: PhaseDuration,
    precision: Scale,
}

/// Schedules event ids against a shared "current time", tracking which
/// ids are imminent (due right now) versus planned for the future.
pub struct TimeQueue {
    default_precision: Scale,
    current_time: TimePoint,
    /// Sorted list of distinct phase durations with at least one event.
    queue: Vec<PhaseDuration>,
    event_ids_by_phase: BTreeMap<PhaseDurationKey, HashSet<i64>>,
    event_accounts: std::collections::HashMap<i64, EventAccount>,
}

/// `PhaseDuration` is not `Hash`/`Ord` in a way that matches its
/// chronological meaning without reference to `current_time`, so the
/// map key is the raw `(multiplier, precision)` pair used purely as a
/// lookup key into the parallel sorted `queue` vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct PhaseDurationKey(i64, i32);

impl From<PhaseDuration> for PhaseDurationKey {
    fn from(p: PhaseDuration) -> Self {
        PhaseDurationKey(p.multiplier, p.precision.level())
    }
}

impl TimeQueue {
    pub fn new() -> Self {
        Self::at(TimePoint::new())
    }

    pub fn starting_at(dt0: Duration) -> Self {
        Self::at(TimePoint::from_duration(dt0))
    }

    pub fn at(t0: TimePoint) -> Self {
        let default_precision = t0.precision() + t0.nscales() as i32;
        Self {
            default_precision,
            current_time: t0,
            queue: Vec::new(),
            event_ids_by_phase: BTreeMap::new(),
            event_accounts: std::collections::HashMap::new(),
        }
    }

    pub fn current_time(&self) -> &TimePoint {
        &self.current_time
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn time_count(&self) -> i64 {
        self.queue.len() as i64
    }

    /// Advances by the imminent duration (there must be at least one
    /// scheduled event).
    pub fn advance_time(&mut self) -> Result<&TimePoint> {
        if self.is_empty() {
            return Err(KernelError::QueueEmpty);
        }
        let dt = self.imminent_duration();
        self.current_time.advance(dt);
        Ok(&self.current_time)
    }

    pub fn advance_time_by(&mut self, dt: Duration) -> Result<&TimePoint> {
        if !self.can_advance_by(dt)? {
            return Err(KernelError::AdvanceBeyondImminent);
        }
        self.current_time.advance(dt);
        Ok(&self.current_time)
    }

    pub fn advance_time_to(&mut self, t: TimePoint) -> Result<&TimePoint> {
        if t < self.current_time {
            return Err(KernelError::AdvanceBeforeCurrentTime);
        }
        while self.current_time < t {
            let dt = t.gap(&self.current_time);
            self.advance_time_by(dt)?;
        }
        if self.current_time != t {
            return Err(KernelError::logic("unexpected error advancing time queue to specified time"));
        }
        Ok(&self.current_time)
    }

    pub fn can_advance_by(&self, dt: Duration) -> Result<bool> {
        let mut okay = true;
        if dt != Duration::zero() {
            if !dt.valid() {
                return Err(KernelError::invalid_argument("advancement duration must be valid"));
            }
            if dt < Duration::zero() {
                return Err(KernelError::domain("advancement duration must be non-negative"));
            }
            if !dt.finite() {
                return Err(KernelError::domain("advancement duration must be finite"));
            }
            let imminent = self.imminent_duration();
            if imminent.finite() {
                let precision = dt.precision().min(imminent.precision());
                okay = self.refined_duration(dt, precision) <= self.refined_duration(imminent, precision);
            }
        }
        Ok(okay)
    }

    pub fn imminent_duration(&self) -> Duration {
        match self.queue.first() {
            Some(pdt) => self.duration_from_phase(*pdt),
            None => Duration::inf(),
        }
    }

    pub fn duration_until(&self, event_id: i64) -> Duration {
        match self.event_accounts.get(&event_id) {
            Some(acc) => self.rescaled_duration_from_phase(acc.phase, acc.precision),
            None => Duration::inf(),
        }
    }

    pub fn duration_at(&self, time_index: i64) -> Result<Duration> {
        if time_index < 0 || time_index >= self.time_count() {
            return Err(KernelError::TimeIndexOutOfRange(time_index));
        }
        Ok(self.duration_from_phase(self.queue[time_index as usize]))
    }

    pub fn imminent_event_ids(&self) -> Result<&HashSet<i64>> {
        if self.is_empty() {
            return Err(KernelError::QueueEmpty);
        }
        let key = PhaseDurationKey::from(self.queue[0]);
        Ok(self.event_ids_by_phase.get(&key).expect("front phase must have event ids"))
    }

    pub fn event_ids_at(&self, time_index: i64) -> Result<&HashSet<i64>> {
        if time_index < 0 || time_index >= self.time_count() {
            return Err(KernelError::TimeIndexOutOfRange(time_index));
        }
        let key = PhaseDurationKey::from(self.queue[time_index as usize]);
        Ok(self.event_ids_by_phase.get(&key).expect("indexed phase must have event ids"))
    }

    pub fn pop_imminent_event(&mut self, event_id: i64) -> Result<()> {
        if self.is_empty() {
            return Err(KernelError::QueueEmpty);
        }
        let pdt = self.queue[0];
        let key = PhaseDurationKey::from(pdt);
        let set = self.event_ids_by_phase.get_mut(&key).expect("front phase must have event ids");
        if !set.remove(&event_id) {
            return Err(KernelError::NoSuchImminentEvent(event_id));
        }
        if set.is_empty() {
            self.event_ids_by_phase.remove(&key);
            self.queue.remove(0);
        }
        self.event_accounts.remove(&event_id);
        Ok(())
    }

    pub fn pop_imminent_events(&mut self) -> Result<HashSet<i64>> {
        if self.is_empty() {
            return Err(KernelError::QueueEmpty);
        }
        let pdt = self.queue.remove(0);
        let key = PhaseDurationKey::from(pdt);
        let ids = self.event_ids_by_phase.remove(&key).expect("front phase must have event ids");
        for id in &ids {
            self.event_accounts.remove(id);
        }
        Ok(ids)
    }

    pub fn plan_event(&mut self, event_id: i64, dt: Duration) -> Result<()> {
        if !dt.valid() {
            return Err(KernelError::invalid_argument("planned duration must be valid"));
        }
        if dt < Duration::zero() {
            return Err(KernelError::domain("planned duration must be non-negative"));
        }
        if !dt.finite() {
            return Err(KernelError::domain("planned duration must be finite"));
        }
        self.cancel_event(event_id);
        let pdt = self.phase_from_duration(dt);
        let key = PhaseDurationKey::from(pdt);
        let idx = self.lower_bound(pdt);
        if idx >= self.queue.len() || PhaseDurationKey::from(self.queue[idx]) != key {
            self.queue.insert(idx, pdt);
            self.event_ids_by_phase.insert(key, HashSet::from([event_id]));
        } else {
            self.event_ids_by_phase.get_mut(&key).unwrap().insert(event_id);
        }
        self.event_accounts.insert(event_id, EventAccount { phase: pdt, precision: dt.precision() });
        Ok(())
    }

    pub fn cancel_event(&mut self, event_id: i64) -> bool {
        let Some(acc) = self.event_accounts.remove(&event_id) else {
            return false;
        };
        let key = PhaseDurationKey::from(acc.phase);
        let remove_phase = match self.event_ids_by_phase.get_mut(&key) {
            Some(set) => {
                set.remove(&event_id);
                set.is_empty()
            }
            None => false,
        };
        if remove_phase {
            self.event_ids_by_phase.remove(&key);
            if let Some(idx) = self.queue.iter().position(|p| PhaseDurationKey::from(*p) == key) {
                self.queue.remove(idx);
            }
        }
        true
    }

    fn duration_from_phase(&self, pdt: PhaseDuration) -> Duration {
        let mut multiplier = pdt.multiplier - self.current_time.epoch_phase(pdt.precision);
        if multiplier < 0 {
            multiplier += QUANTITY_LIMIT;
        }
        Duration::new(multiplier, pdt.precision)
    }

    fn refined_duration(&self, dt: Duration, precision: Scale) -> Duration {
        let mut multiplier = dt.multiplier();
        if multiplier > 0 {
            let mut s = dt.precision() - 1;
            while multiplier < QUANTITY_LIMIT && s >= precision {
                multiplier = 1000 * multiplier - self.current_time.scale_phase(s);
                s = s - 1;
            }
        }
        Duration::new(multiplier, precision)
    }

    fn refined_duration_from_phase(&self, pdt: PhaseDuration, precision: Scale) -> Duration {
        let dt = self.duration_from_phase(pdt);
        self.refined_duration(dt, precision)
    }

    fn rescaled_duration_from_phase(&self, pdt: PhaseDuration, precision: Scale) -> Duration {
        let dt = self.duration_from_phase(pdt);
        if precision <= dt.precision() {
            self.refined_duration(dt, precision)
        } else {
            Duration::new(dt.multiplier(), precision)
        }
    }

    fn phase_from_duration(&mut self, dt: Duration) -> PhaseDuration {
        let mut precision = if dt.multiplier() == 0 { self.current_time.precision() } else { dt.precision() };
        let mut phase = self.current_time.epoch_phase(precision) + dt.multiplier();
        let final_precision;
        loop {
            let mut carry = 0i64;
            if phase >= QUANTITY_LIMIT {
                phase -= QUANTITY_LIMIT;
                carry = 1;
            }
            if phase % 1000 != 0 {
                final_precision = precision;
                break;
            }
            if phase == 0 && (precision + 5).level() >= (self.current_time.precision() + self.current_time.nscales() as i32).level() {
                let unbounded = if self.current_time.sign() == 1 { carry == 0 } else { carry == 1 };
                if unbounded {
                    final_precision = self.default_precision;
                    break;
                }
            }
            phase = phase / 1000 + (QUANTITY_LIMIT / 1000) * (self.current_time.scale_phase(precision + 5) + carry);
            precision = precision + 1;
        }
        PhaseDuration { multiplier: phase, precision: final_precision }
    }

    fn lower_bound(&self, pdt: PhaseDuration) -> usize {
        let mut lo = 0usize;
        let mut hi = self.queue.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let precision = self.queue[mid].precision.min(pdt.precision);
            let entry_dt = self.refined_duration_from_phase(self.queue[mid], precision);
            let value_dt = self.refined_duration_from_phase(pdt, precision);
            if entry_dt < value_dt {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }
}

impl Default for TimeQueue {
    fn default() -> Self {
        Self::new()
    }
}
