//! An arbitrary-precision signed time value, built from a vector of
//! base-1000 digits, ported from `sydevs::time_point`.

use std::cmp::{max, min};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::quantity::{Duration, QUANTITY_LIMIT};
use crate::scale::{levels, Scale};

/// A point in time represented exactly as a signed sum of base-1000
/// digits, each scaled by `precision + i`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePoint {
    sign: i8,
    precision: Scale,
    digits: Vec<i16>,
}

impl Default for TimePoint {
    fn default() -> Self {
        Self::new()
    }
}

impl TimePoint {
    /// The zero time point.
    pub fn new() -> Self {
        Self {
            sign: 1,
            precision: levels::UNIT,
            digits: Vec::new(),
        }
    }

    /// Constructs a time point offset from zero by `dt`.
    pub fn from_duration(dt: Duration) -> Self {
        let mut tp = Self::new();
        tp += dt;
        tp
    }

    pub fn sign(&self) -> i64 {
        self.sign as i64
    }

    pub fn precision(&self) -> Scale {
        self.precision
    }

    pub fn nscales(&self) -> i64 {
        self.digits.len() as i64
    }

    /// The digit at scale `precision`, `0` outside the stored range.
    pub fn scale_digit(&self, precision: Scale) -> i64 {
        if precision < self.precision || precision >= self.precision + self.nscales() as i32 {
            0
        } else {
            self.digits[(precision.level() - self.precision.level()) as usize] as i64
        }
    }

    /// The same digit, measured from the left (negative-infinity side).
    pub fn scale_phase(&self, precision: Scale) -> i64 {
        let mut phase = self.scale_digit(precision);
        if self.sign == -1 {
            phase = 1000 - phase;
            if self.precision < precision {
                phase -= 1;
            } else if phase == 1000 {
                phase = 0;
            }
        }
        phase
    }

    /// Aggregates five consecutive scale phases (an "epoch") into one
    /// `[0, QUANTITY_LIMIT)` integer.
    pub fn epoch_phase(&self, precision: Scale) -> i64 {
        let mut phase: i64 = 0;
        let mut s = precision + 4;
        loop {
            phase = 1000 * phase + self.scale_digit(s);
            if s == precision {
                break;
            }
            s = s - 1;
        }
        if self.sign == -1 {
            phase = QUANTITY_LIMIT - phase;
            if self.precision < precision {
                phase -= 1;
            } else if phase == QUANTITY_LIMIT {
                phase = 0;
            }
        }
        phase
    }

    /// Advances by `rhs` (a finite, non-negative duration), then
    /// truncates digits finer than `rhs.precision()` — "multiscale"
    /// advancement.
    pub fn advance(&mut self, rhs: Duration) -> &Self {
        assert!(rhs.valid(), "advancement duration must be valid");
        assert!(rhs >= Duration::zero(), "advancement duration must be non-negative");
        assert!(rhs.finite(), "advancement duration must be finite");
        if rhs > Duration::zero() {
            if self.precision < rhs.precision() {
                if self.sign == -1 {
                    *self += Duration::new(-1, rhs.precision());
                }
                let mut precision = rhs.precision();
                if self.nscales() > precision.steps_above(self.precision) as i64 {
                    while self.scale_digit(precision) == 0 {
                        precision = precision + 1;
                    }
                }
                let drop = min(precision.steps_above(self.precision) as i64, self.digits.len() as i64) as usize;
                self.digits.drain(0..drop);
                self.precision = precision;
            }
            *self += rhs;
        }
        self
    }

    /// Adds `rhs` exactly (no truncation), carrying across digits and
    /// flipping the sign if the result crosses zero.
    pub fn add_assign(&mut self, rhs: Duration) {
        assert!(rhs.valid(), "adjustment duration must be valid");
        assert!(rhs.finite(), "adjustment duration must be finite");
        if rhs == Duration::zero() {
            return;
        }
        let dt = if self.sign == -1 { -rhs.coarsened() } else { rhs.coarsened() };

        if self.digits.is_empty() {
            self.precision = dt.precision();
            self.digits.push(0);
        } else {
            if self.precision > dt.precision() {
                let pad = self.precision.steps_above(dt.precision()) as usize;
                let mut new_digits = vec![0i16; pad];
                new_digits.extend_from_slice(&self.digits);
                self.digits = new_digits;
                self.precision = dt.precision();
            }
            if self.precision + self.nscales() as i32 <= dt.precision() {
                let extra = dt.precision().steps_above(self.precision) as i64 - self.nscales() + 1;
                self.digits.extend(std::iter::repeat(0i16).take(extra as usize));
            }
        }

        {
            let mut tick_count: i64 = dt.multiplier();
            let mut i = dt.precision().steps_above(self.precision) as usize;
            while tick_count != 0 {
                let rest = tick_count / 1000;
                let offset = tick_count - 1000 * rest;
                let sum = self.digits[i] as i64 + offset;
                if sum >= 1000 {
                    self.digits[i] = (sum - 1000) as i16;
                    tick_count = rest + 1;
                } else if sum >= 0 {
                    self.digits[i] = sum as i16;
                    tick_count = rest;
                } else {
                    self.digits[i] = (sum + 1000) as i16;
                    tick_count = rest - 1;
                }
                if tick_count != 0 && i + 1 == self.digits.len() {
                    self.digits.push(0);
                    if tick_count < 0 && tick_count > -1000 {
                        self.digits[i + 1] = tick_count as i16;
                        tick_count = 0;
                    }
                }
                i += 1;
            }
        }

        {
            let mut lead_zero = 0usize;
            while lead_zero < self.digits.len() && self.digits[lead_zero] == 0 {
                lead_zero += 1;
            }
            if lead_zero > 0 {
                self.precision = self.precision + lead_zero as i32;
                self.digits.drain(0..lead_zero);
            }
            if self.digits.is_empty() {
                self.precision = levels::UNIT;
                self.sign = 1;
            } else {
                if *self.digits.last().unwrap() < 0 {
                    let n = self.digits.len();
                    self.digits[n - 1] = -self.digits[n - 1];
                    self.sign = -self.sign;
                    for i in (1..n).rev() {
                        self.digits[i] -= 1;
                        self.digits[i - 1] = 1000 - self.digits[i - 1];
                    }
                }
                while *self.digits.last().unwrap() == 0 {
                    self.digits.pop();
                }
            }
        }
    }

    pub fn sub_assign(&mut self, rhs: Duration) {
        self.add_assign(-rhs);
    }

    /// Exact difference from `rhs`; `±inf` if not exactly representable.
    pub fn diff(&self, rhs: &TimePoint) -> Duration {
        let min_precision = min(self.precision, rhs.precision);
        let max_precision = max(self.precision + self.nscales() as i32, rhs.precision + rhs.nscales() as i32) - 1;
        let mut dt = Duration::new((self.sign() - rhs.sign()) / 2, max_precision + 1);
        let mut s = max_precision;
        loop {
            if !dt.finite() {
                break;
            }
            let scale_dt = Duration::new(self.scale_phase(s) - rhs.scale_phase(s), s);
            let next_dt = dt + scale_dt;
            if (next_dt - dt) != scale_dt {
                dt = if dt > Duration::zero() { Duration::inf() } else { Duration::neg_inf() };
            } else {
                dt = next_dt;
            }
            if s == min_precision {
                break;
            }
            s = s - 1;
        }
        dt
    }

    /// Rounded approximation of the difference from `rhs`, always finite
    /// and accurate to one precision step.
    pub fn gap(&self, rhs: &TimePoint) -> Duration {
        let min_precision = min(self.precision, rhs.precision);
        let max_precision = max(self.precision + self.nscales() as i32, rhs.precision + rhs.nscales() as i32) - 1;
        let mut big_dt = Duration::new((self.sign() - rhs.sign()) / 2, max_precision + 1);
        let mut precision = min_precision;
        {
            let mut s = max_precision;
            loop {
                if precision != min_precision || s < min_precision {
                    break;
                }
                let scale_dt = Duration::new(self.scale_phase(s) - rhs.scale_phase(s), s);
                let next_dt = big_dt + scale_dt;
                if (next_dt - big_dt) != scale_dt {
                    precision = s + 1;
                } else {
                    big_dt = next_dt;
                }
                if s == min_precision {
                    break;
                }
                s = s - 1;
            }
        }
        let mut small_dt = Duration::zero();
        {
            let mut s = min_precision;
            while s < precision {
                small_dt = small_dt + Duration::new(self.scale_phase(s) - rhs.scale_phase(s), s);
                let rounded_dt = (small_dt + Duration::zero().fixed_at(s - 4)).unfixed();
                if rounded_dt.finite() {
                    small_dt = rounded_dt;
                }
                s = s + 1;
            }
        }
        if small_dt == Duration::new(500, precision - 1) {
            if big_dt > Duration::zero() {
                big_dt + Duration::new(1, precision)
            } else {
                big_dt
            }
        } else if small_dt == Duration::new(-500, precision - 1) {
            if big_dt < Duration::zero() {
                big_dt - Duration::new(1, precision)
            } else {
                big_dt
            }
        } else {
            big_dt + (small_dt + Duration::zero().fixed_at(precision)).unfixed()
        }
    }

    fn upper_discrepant_precision(&self, rhs: &TimePoint) -> Scale {
        let min_precision = min(self.precision, rhs.precision);
        let mut upd = max(self.precision + self.nscales() as i32, rhs.precision + rhs.nscales() as i32) - 1;
        while upd >= min_precision {
            if self.sign() * self.scale_digit(upd) != rhs.sign() * rhs.scale_digit(upd) {
                break;
            }
            upd = upd - 1;
        }
        upd
    }
}

impl std::ops::AddAssign<Duration> for TimePoint {
    fn add_assign(&mut self, rhs: Duration) {
        TimePoint::add_assign(self, rhs);
    }
}

impl std::ops::SubAssign<Duration> for TimePoint {
    fn sub_assign(&mut self, rhs: Duration) {
        TimePoint::sub_assign(self, rhs);
    }
}

impl std::ops::Add<Duration> for TimePoint {
    type Output = TimePoint;
    fn add(mut self, rhs: Duration) -> TimePoint {
        self += rhs;
        self
    }
}

impl std::ops::Sub<Duration> for TimePoint {
    type Output = TimePoint;
    fn sub(mut self, rhs: Duration) -> TimePoint {
        self -= rhs;
        self
    }
}

impl std::ops::Sub for &TimePoint {
    type Output = Duration;
    fn sub(self, rhs: &TimePoint) -> Duration {
        self.diff(rhs)
    }
}

impl PartialOrd for TimePoint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        let upd = self.upper_discrepant_precision(other);
        Some((self.sign() * self.scale_digit(upd)).cmp(&(other.sign() * other.scale_digit(upd))))
    }
}

impl Ord for TimePoint {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.partial_cmp(other).unwrap()
    }
}

impl fmt::Debug for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "time_point()")?;
        if self.digits.is_empty() {
            return Ok(());
        }
        let mut s = self.precision + self.nscales() as i32 - 1;
        loop {
            write!(f, " {} {}", if self.sign == 1 { "+" } else { "-" }, self.scale_digit(s))?;
            write!(f, "e{}", s.level())?;
            if s == self.precision {
                break;
            }
            s = s - 1;
        }
        Ok(())
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ns(n: i64) -> Duration {
        Duration::new_fixed(n, levels::NANO)
    }

    #[test]
    fn zero_time_point_has_no_digits() {
        let tp = TimePoint::new();
        assert_eq!(tp.nscales(), 0);
        assert_eq!(tp.sign(), 1);
    }

    #[test]
    fn additive_identity() {
        let mut tp = TimePoint::new();
        tp += Duration::zero();
        assert_eq!(tp, TimePoint::new());
    }

    #[test]
    fn add_then_subtract_round_trips() {
        let mut tp = TimePoint::new();
        tp += ns(5_000_388);
        let before = tp.clone();
        tp += ns(640_000);
        tp -= ns(640_000);
        assert_eq!(tp, before);
    }

    #[test]
    fn advance_truncates_finer_digits() {
        let mut tp = TimePoint::new();
        tp += Duration::new_fixed(72_800_444_321, levels::NANO);
        tp.advance(Duration::new_fixed(1150, levels::MILLI));
        let mut expected = TimePoint::new();
        expected += Duration::new_fixed(73, levels::UNIT);
        expected += Duration::new_fixed(950, levels::MILLI);
        assert_eq!(tp, expected);
    }

    #[test]
    fn ordering_is_total() {
        let a = TimePoint::from_duration(Duration::new_fixed(1, levels::UNIT));
        let b = TimePoint::from_duration(Duration::new_fixed(2, levels::UNIT));
        assert!(a < b);
        assert!(b > a);
        assert_ne!(a, b);
    }

    #[test]
    fn exact_difference_matches_sign_of_order() {
        let a = TimePoint::from_duration(Duration::new_fixed(7, levels::UNIT));
        let b = TimePoint::from_duration(Duration::new_fixed(6, levels::UNIT));
        let d: Duration = &a - &b;
        assert!(d.finite());
        assert_eq!(d.sign(), 1);
    }

    #[test]
    fn gap_approximates_large_precision_spans() {
        let a = TimePoint::from_duration(Duration::new_fixed(7, levels::UNIT));
        let b = TimePoint::new();
        let d = a.gap(&b);
        assert!(d.finite());
    }

    #[test]
    fn time_point_round_trips_through_json() {
        let mut tp = TimePoint::new();
        tp += ns(5_000_388);
        let json = serde_json::to_string(&tp).unwrap();
        let restored: TimePoint = serde_json::from_str(&json).unwrap();
        assert_eq!(tp, restored);
    }

    proptest! {
        /// `tp + dt - dt == tp` for any finite non-negative `dt`.
        #[test]
        fn add_then_subtract_round_trips_for_all_legal_inputs(n in 0i64..10_000_000) {
            let dt = Duration::new_fixed(n, levels::NANO);
            let mut tp = TimePoint::new();
            tp += ns(5_000_388);
            let before = tp.clone();
            tp += dt;
            tp -= dt;
            prop_assert_eq!(tp, before);
        }

        /// Ordering of two time points built from integer-second offsets
        /// from zero matches ordering of the offsets themselves.
        #[test]
        fn ordering_matches_offset_from_zero(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
            let ta = TimePoint::new() + Duration::new_fixed(a, levels::UNIT);
            let tb = TimePoint::new() + Duration::new_fixed(b, levels::UNIT);
            prop_assert_eq!(ta.cmp(&tb), a.cmp(&b));
        }

        /// The exact difference's sign always agrees with the ordering of
        /// the two points it was taken between.
        #[test]
        fn exact_difference_sign_matches_ordering(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
            let ta = TimePoint::new() + Duration::new_fixed(a, levels::UNIT);
            let tb = TimePoint::new() + Duration::new_fixed(b, levels::UNIT);
            let d = ta.diff(&tb);
            prop_assert!(d.finite());
            prop_assert_eq!(d.sign(), (a - b).signum());
        }
    }
}
