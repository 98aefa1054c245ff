//! The base-1000 logarithmic precision level shared by `Quantity` and
//! `TimePoint`.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// A signed base-1000 precision level.
///
/// `Scale(0)` is the unit scale (factor `1000^0 = 1`); `Scale(1)` is the
/// next coarser level (factor 1000), `Scale(-1)` the next finer (factor
/// 1/1000), and so on. [`Scale::NO_SCALE`] is a sentinel meaning "precision
/// is not applicable", used by composite and collection nodes whose
/// `time_precision` is irrelevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scale(i32);

impl Scale {
    /// Sentinel precision meaning "not applicable". Deliberately the
    /// minimum representable level so it never compares as finer than any
    /// real scale by accident.
    pub const NO_SCALE: Scale = Scale(i32::MIN);

    pub const fn new(level: i32) -> Self {
        Scale(level)
    }

    pub const fn level(self) -> i32 {
        self.0
    }

    pub const fn is_no_scale(self) -> bool {
        self.0 == i32::MIN
    }

    /// The number of factor-1000 steps between `self` (coarser) and `rhs`.
    pub fn steps_above(self, rhs: Scale) -> i32 {
        debug_assert!(!self.is_no_scale() && !rhs.is_no_scale());
        self.0 - rhs.0
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_no_scale() {
            write!(f, "no_scale")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Add<i32> for Scale {
    type Output = Scale;
    fn add(self, rhs: i32) -> Scale {
        debug_assert!(!self.is_no_scale());
        Scale(self.0 + rhs)
    }
}

impl Sub<i32> for Scale {
    type Output = Scale;
    fn sub(self, rhs: i32) -> Scale {
        debug_assert!(!self.is_no_scale());
        Scale(self.0 - rhs)
    }
}

/// Named duration scales, mirroring the mandatory literal suffixes in the
/// external interface (`_ys` .. `_Ys`).
pub mod levels {
    use super::Scale;

    pub const YOCTO: Scale = Scale(-8);
    pub const ZEPTO: Scale = Scale(-7);
    pub const ATTO: Scale = Scale(-6);
    pub const FEMTO: Scale = Scale(-5);
    pub const PICO: Scale = Scale(-4);
    pub const NANO: Scale = Scale(-3);
    pub const MICRO: Scale = Scale(-2);
    pub const MILLI: Scale = Scale(-1);
    pub const UNIT: Scale = Scale(0);
    pub const KILO: Scale = Scale(1);
    pub const MEGA: Scale = Scale(2);
    pub const GIGA: Scale = Scale(3);
    pub const TERA: Scale = Scale(4);
    pub const PETA: Scale = Scale(5);
    pub const EXA: Scale = Scale(6);
    pub const ZETTA: Scale = Scale(7);
    pub const YOTTA: Scale = Scale(8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_scale_is_not_a_real_level() {
        assert!(Scale::NO_SCALE.is_no_scale());
        assert!(!Scale::new(0).is_no_scale());
    }

    #[test]
    fn steps_above_counts_factor_1000_hops() {
        assert_eq!(levels::KILO.steps_above(levels::UNIT), 1);
        assert_eq!(levels::UNIT.steps_above(levels::MILLI), 1);
        assert_eq!(levels::MEGA.steps_above(levels::MILLI), 3);
    }

    #[test]
    fn ordering_matches_level() {
        assert!(levels::MILLI < levels::UNIT);
        assert!(levels::UNIT < levels::KILO);
    }
}
