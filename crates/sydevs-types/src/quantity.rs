//! Dimensioned quantities: `multiplier x 1000^precision` in unit `U`.
//!
//! Ported from the arithmetic described in `sydevs::core::quantity` (the
//! upstream C++ kernel stores the multiplier as a `float64` to get cheap
//! infinities in a constexpr-friendly way; this port stores it as an `i64`
//! and uses a sentinel value for "invalid" instead, since Rust has no
//! universal constexpr NaN to lean on).

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scale::{levels, Scale};
use crate::units::{dim_add, dim_sub, Dim7, NoUnits, Unit};

/// Magnitude beyond which a quantity is considered infinite.
pub const QUANTITY_LIMIT: i64 = 1_000_000_000_000_000; // 10^15

/// Sentinel multiplier marking the invalid (non-)value.
const INVALID_MULTIPLIER: i64 = i64::MIN;

/// A dimensioned quantity `multiplier * 1000^precision` in unit `U`.
///
/// The `#[serde(bound = "")]` drops the implied `U: Serialize +
/// Deserialize` bound serde_derive would otherwise add: `U` is a
/// zero-sized marker, never actually serialized.
#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Quantity<U: Unit> {
    multiplier: i64,
    precision: Scale,
    fixed: bool,
    _unit: PhantomData<U>,
}

impl<U: Unit> Quantity<U> {
    /// Constructs an unfixed quantity at exactly the given `(multiplier,
    /// precision)`, clamping to infinity on overflow. This does not
    /// autoscale — autoscaling is something only arithmetic *operators*
    /// do to their result, not something a raw construction performs.
    pub fn new(multiplier: i64, precision: Scale) -> Self {
        Self {
            multiplier: clamp_to_limit(multiplier as i128),
            precision,
            fixed: false,
            _unit: PhantomData,
        }
    }

    /// Constructs a quantity whose precision is frozen at `precision`;
    /// the multiplier is taken as-is (no autoscale), matching the
    /// semantics of a literal like `5_ms`.
    pub fn new_fixed(multiplier: i64, precision: Scale) -> Self {
        Self {
            multiplier: clamp_to_limit(multiplier as i128),
            precision,
            fixed: true,
            _unit: PhantomData,
        }
    }

    /// The unique invalid (non-)value, returned by contract violations.
    pub fn invalid() -> Self {
        Self {
            multiplier: INVALID_MULTIPLIER,
            precision: levels::UNIT,
            fixed: false,
            _unit: PhantomData,
        }
    }

    pub fn zero() -> Self {
        Self {
            multiplier: 0,
            precision: levels::UNIT,
            fixed: false,
            _unit: PhantomData,
        }
    }

    /// Positive infinity: `multiplier == QUANTITY_LIMIT` at unit precision
    /// (per the kernel's locked representation of `duration::inf()`).
    pub fn inf() -> Self {
        Self {
            multiplier: QUANTITY_LIMIT,
            precision: levels::UNIT,
            fixed: false,
            _unit: PhantomData,
        }
    }

    pub fn neg_inf() -> Self {
        Self {
            multiplier: -QUANTITY_LIMIT,
            precision: levels::UNIT,
            fixed: false,
            _unit: PhantomData,
        }
    }

    /// The largest finite quantity representable at the given precision.
    pub fn max(precision: Scale) -> Self {
        Self {
            multiplier: QUANTITY_LIMIT - 1,
            precision,
            fixed: false,
            _unit: PhantomData,
        }
    }

    pub fn multiplier(self) -> i64 {
        self.multiplier
    }

    pub fn precision(self) -> Scale {
        self.precision
    }

    pub fn fixed(self) -> bool {
        self.fixed
    }

    pub fn valid(self) -> bool {
        self.multiplier != INVALID_MULTIPLIER
    }

    pub fn finite(self) -> bool {
        self.valid() && self.multiplier.unsigned_abs() < QUANTITY_LIMIT as u64
    }

    pub fn infinite(self) -> bool {
        self.valid() && !self.finite()
    }

    /// `+1`, `-1`, or `0` (only the zero quantity has sign zero).
    pub fn sign(self) -> i64 {
        if !self.valid() || self.multiplier == 0 {
            0
        } else if self.multiplier > 0 {
            1
        } else {
            -1
        }
    }

    pub fn fixed_at(self, precision: Scale) -> Self {
        let mut q = self.rescaled(precision);
        q.fixed = true;
        q
    }

    pub fn unfixed(self) -> Self {
        let mut q = self;
        q.fixed = false;
        q
    }

    /// Converts to `precision`, rounding (banker's rounding) if coarsening.
    pub fn rescaled(self, precision: Scale) -> Self {
        if !self.valid() {
            return self;
        }
        if self.infinite() {
            return Self {
                multiplier: self.multiplier,
                precision,
                fixed: self.fixed,
                _unit: PhantomData,
            };
        }
        let steps = self.precision.level() - precision.level();
        let converted = convert_multiplier(self.multiplier as i128, steps);
        if converted.unsigned_abs() >= QUANTITY_LIMIT as u128 {
            return if converted >= 0 { Self::inf() } else { Self::neg_inf() };
        }
        Self {
            multiplier: converted as i64,
            precision,
            fixed: self.fixed,
            _unit: PhantomData,
        }
    }

    /// The finest precision at which the multiplier is still exact,
    /// i.e. repeatedly multiplies by 1000 (exact) while the result
    /// would remain under the limit.
    pub fn refined(self) -> Self {
        if !self.finite() {
            return self;
        }
        let (mul, precision) = refine_raw(self.multiplier as i128, self.precision);
        Self {
            multiplier: mul as i64,
            precision,
            fixed: self.fixed,
            _unit: PhantomData,
        }
    }

    /// The coarsest precision at which the multiplier remains an exact
    /// multiple of 1000, i.e. strips trailing factor-of-1000 zeros.
    pub fn coarsened(self) -> Self {
        if !self.finite() {
            return self;
        }
        let (mul, precision) = coarsen_raw(self.multiplier as i128, self.precision);
        Self {
            multiplier: mul as i64,
            precision,
            fixed: self.fixed,
            _unit: PhantomData,
        }
    }

    fn from_raw(raw: i128, precision: Scale, fixed: bool) -> Self {
        let (mul, precision) = autoscale_raw(raw, precision);
        Self {
            multiplier: mul,
            precision,
            fixed,
            _unit: PhantomData,
        }
    }

    /// Adds two quantities per the kernel's fixed/unfixed combination
    /// rules: if both are fixed, precisions must match (else `invalid`);
    /// if one is fixed, the other is rescaled to match first; if
    /// neither is fixed, the raw sum autoscales.
    fn combine(self, rhs: Self, rhs_sign: i64) -> Self {
        if !self.valid() || !rhs.valid() {
            return Self::invalid();
        }
        if self.infinite() || rhs.infinite() {
            let a = self.sign();
            let b = rhs.sign() * rhs_sign;
            return match (self.infinite(), rhs.infinite()) {
                (true, true) => {
                    if a == b {
                        if a >= 0 { Self::inf() } else { Self::neg_inf() }
                    } else {
                        Self::invalid()
                    }
                }
                (true, false) => if a >= 0 { Self::inf() } else { Self::neg_inf() },
                (false, true) => if b >= 0 { Self::inf() } else { Self::neg_inf() },
                (false, false) => unreachable!(),
            };
        }
        match (self.fixed, rhs.fixed) {
            (true, true) => {
                if self.precision != rhs.precision {
                    Self::invalid()
                } else {
                    let sum = self.multiplier as i128 + rhs_sign as i128 * rhs.multiplier as i128;
                    Self::from_raw_fixed(sum, self.precision)
                }
            }
            (true, false) => {
                let rescaled_rhs = rhs.rescaled(self.precision);
                if !rescaled_rhs.valid() {
                    Self::invalid()
                } else {
                    let sum = self.multiplier as i128 + rhs_sign as i128 * rescaled_rhs.multiplier as i128;
                    Self::from_raw_fixed(sum, self.precision)
                }
            }
            (false, true) => {
                let rescaled_self = self.rescaled(rhs.precision);
                if !rescaled_self.valid() {
                    Self::invalid()
                } else {
                    let sum = rescaled_self.multiplier as i128 + rhs_sign as i128 * rhs.multiplier as i128;
                    Self::from_raw_fixed(sum, rhs.precision)
                }
            }
            (false, false) => {
                let precision = self.precision.min(rhs.precision);
                let a = convert_multiplier(self.multiplier as i128, self.precision.level() - precision.level());
                let b = convert_multiplier(rhs.multiplier as i128, rhs.precision.level() - precision.level());
                Self::from_raw(a + rhs_sign as i128 * b, precision, false)
            }
        }
    }

    fn from_raw_fixed(raw: i128, precision: Scale) -> Self {
        if raw.unsigned_abs() >= QUANTITY_LIMIT as u128 {
            return if raw >= 0 { Self::inf() } else { Self::neg_inf() }.fixed_at(precision);
        }
        Self {
            multiplier: raw as i64,
            precision,
            fixed: true,
            _unit: PhantomData,
        }
    }

    pub fn checked_mul_scalar(self, rhs: f64) -> Self {
        if !self.valid() {
            return self;
        }
        if rhs.is_nan() {
            return Self::invalid();
        }
        if self.infinite() || rhs.is_infinite() {
            let sign = self.sign() as f64 * rhs.signum();
            return if sign == 0.0 {
                Self::invalid()
            } else if sign > 0.0 {
                Self::inf()
            } else {
                Self::neg_inf()
            };
        }
        let raw = self.multiplier as f64 * rhs;
        if self.fixed {
            Self::from_raw_fixed(raw.round() as i128, self.precision)
        } else {
            Self::from_raw(raw.round() as i128, self.precision, false)
        }
    }

    pub fn checked_div_scalar(self, rhs: f64) -> Self {
        if rhs == 0.0 {
            return Self::invalid();
        }
        self.checked_mul_scalar(1.0 / rhs)
    }

    /// Multiplies two quantities, composing dimensions at runtime;
    /// the result is always unfixed and autoscales.
    pub fn checked_mul<V: Unit>(self, rhs: Quantity<V>) -> AnyQuantity {
        if !self.valid() || !rhs.valid() {
            return AnyQuantity::invalid();
        }
        if self.infinite() || rhs.infinite() {
            let sign = self.sign() * rhs.sign();
            let dim = dim_add(U::DIM, V::DIM);
            return if sign == 0 {
                AnyQuantity::invalid()
            } else if sign > 0 {
                AnyQuantity::inf(dim)
            } else {
                AnyQuantity::neg_inf(dim)
            };
        }
        let raw = self.multiplier as i128 * rhs.multiplier as i128;
        let precision = self.precision + rhs.precision.level();
        AnyQuantity::from_raw(raw, precision, dim_add(U::DIM, V::DIM))
    }

    /// Divides two quantities, composing dimensions at runtime.
    pub fn checked_div<V: Unit>(self, rhs: Quantity<V>) -> Result<AnyQuantity> {
        if !self.valid() || !rhs.valid() {
            return Err(Error::domain("cannot divide an invalid quantity"));
        }
        if rhs.multiplier == 0 {
            return Err(Error::domain("division by a zero quantity"));
        }
        let dim = dim_sub(U::DIM, V::DIM);
        if self.infinite() || rhs.infinite() {
            if rhs.infinite() && self.infinite() {
                return Ok(AnyQuantity::invalid());
            }
            let sign = self.sign() * rhs.sign();
            return Ok(if rhs.infinite() {
                AnyQuantity::from_raw(0, Scale::new(0), dim)
            } else if sign > 0 {
                AnyQuantity::inf(dim)
            } else {
                AnyQuantity::neg_inf(dim)
            });
        }
        let scaled_num = self.multiplier as i128 * 1_000i128.pow(6);
        let raw = scaled_num / rhs.multiplier as i128;
        let precision = self.precision - rhs.precision.level() - 6;
        Ok(AnyQuantity::from_raw(raw, precision, dim))
    }
}

impl<U: Unit> fmt::Debug for Quantity<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid() {
            write!(f, "invalid {}", U::SYMBOL)
        } else if self.infinite() {
            write!(f, "{}inf {}", if self.sign() < 0 { "-" } else { "" }, U::SYMBOL)
        } else {
            write!(f, "{}e{}{} {}", self.multiplier, self.precision, if self.fixed { "!" } else { "" }, U::SYMBOL)
        }
    }
}

impl<U: Unit> fmt::Display for Quantity<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl<U: Unit> PartialEq for Quantity<U> {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl<U: Unit> PartialOrd for Quantity<U> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if !self.valid() || !other.valid() {
            return None;
        }
        match (self.infinite(), other.infinite()) {
            (true, true) => Some(self.sign().cmp(&other.sign())),
            (true, false) => Some(self.sign().cmp(&0)),
            (false, true) => Some(0i64.cmp(&other.sign())),
            (false, false) => {
                let precision = self.precision.min(other.precision);
                let a = convert_multiplier(self.multiplier as i128, self.precision.level() - precision.level());
                let b = convert_multiplier(other.multiplier as i128, other.precision.level() - precision.level());
                Some(a.cmp(&b))
            }
        }
    }
}

impl<U: Unit> Add for Quantity<U> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.combine(rhs, 1)
    }
}

impl<U: Unit> Sub for Quantity<U> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.combine(rhs, -1)
    }
}

impl<U: Unit> Neg for Quantity<U> {
    type Output = Self;
    fn neg(self) -> Self {
        if !self.valid() {
            return self;
        }
        Self {
            multiplier: -self.multiplier,
            precision: self.precision,
            fixed: self.fixed,
            _unit: PhantomData,
        }
    }
}

impl<U: Unit> Mul<f64> for Quantity<U> {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        self.checked_mul_scalar(rhs)
    }
}

impl<U: Unit> Div<f64> for Quantity<U> {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        self.checked_div_scalar(rhs)
    }
}

/// A quantity whose dimension is only known at runtime, produced by
/// multiplying or dividing two differently-unitted `Quantity` values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnyQuantity {
    multiplier: i64,
    precision: Scale,
    dim: Dim7,
}

impl AnyQuantity {
    pub fn invalid() -> Self {
        Self { multiplier: INVALID_MULTIPLIER, precision: levels::UNIT, dim: crate::units::DIMENSIONLESS }
    }

    pub fn inf(dim: Dim7) -> Self {
        Self { multiplier: QUANTITY_LIMIT, precision: levels::UNIT, dim }
    }

    pub fn neg_inf(dim: Dim7) -> Self {
        Self { multiplier: -QUANTITY_LIMIT, precision: levels::UNIT, dim }
    }

    fn from_raw(raw: i128, precision: Scale, dim: Dim7) -> Self {
        let (mul, precision) = autoscale_raw(raw, precision);
        Self { multiplier: mul, precision, dim }
    }

    pub fn dim(self) -> Dim7 {
        self.dim
    }

    pub fn multiplier(self) -> i64 {
        self.multiplier
    }

    pub fn precision(self) -> Scale {
        self.precision
    }

    /// Recovers a strongly-typed `Quantity<U>` if the runtime dimension
    /// matches `U`'s, failing otherwise.
    pub fn into_typed<U: Unit>(self) -> Result<Quantity<U>> {
        if self.dim != U::DIM {
            return Err(Error::domain("quantity dimension mismatch in unit conversion"));
        }
        Ok(Quantity::new(self.multiplier, self.precision))
    }
}

fn clamp_to_limit(mul: i128) -> i64 {
    if mul >= QUANTITY_LIMIT as i128 {
        QUANTITY_LIMIT
    } else if mul <= -(QUANTITY_LIMIT as i128) {
        -QUANTITY_LIMIT
    } else {
        mul as i64
    }
}

/// Converts a raw multiplier between precisions with banker's rounding
/// when coarsening. `steps` is `from_precision.level() - to_precision.level()`.
fn convert_multiplier(mul: i128, steps: i32) -> i128 {
    if steps == 0 || mul == 0 {
        return mul;
    }
    if steps > 0 {
        mul.saturating_mul(1000i128.saturating_pow(steps as u32))
    } else {
        let divisor = 1000i128.saturating_pow((-steps) as u32);
        round_div_banker(mul, divisor)
    }
}

/// Rounds `x / d` to the nearest integer, ties to even (`d` must be positive).
fn round_div_banker(x: i128, d: i128) -> i128 {
    debug_assert!(d > 0);
    let q = x.div_euclid(d);
    let r = x.rem_euclid(d);
    let twice_r = r * 2;
    match twice_r.cmp(&d) {
        Ordering::Greater => q + 1,
        Ordering::Less => q,
        Ordering::Equal => {
            if q % 2 == 0 {
                q
            } else {
                q + 1
            }
        }
    }
}

fn refine_raw(mut mul: i128, mut precision: Scale) -> (i128, Scale) {
    while mul != 0 && mul.unsigned_abs() * 1000 < QUANTITY_LIMIT as u128 {
        mul *= 1000;
        precision = precision - 1;
    }
    (mul, precision)
}

fn coarsen_raw(mut mul: i128, mut precision: Scale) -> (i128, Scale) {
    while mul != 0 && mul % 1000 == 0 {
        mul /= 1000;
        precision = precision + 1;
    }
    (mul, precision)
}

/// Normalizes a raw (possibly out-of-range) multiplier/precision pair
/// into the canonical unfixed representation: strip exact trailing
/// factor-of-1000 zeros (lossless coarsening) until it fits under
/// `QUANTITY_LIMIT`, then refine (also lossless) to maximal precision.
/// An unfixed result never loses significant digits — if lossless
/// coarsening cannot bring the magnitude under the limit, it escalates
/// to signed infinity rather than round.
fn autoscale_raw(mul: i128, precision: Scale) -> (i64, Scale) {
    if mul == 0 {
        return (0, precision);
    }
    let (mul, precision) = coarsen_raw(mul, precision);
    if mul.unsigned_abs() >= QUANTITY_LIMIT as u128 {
        return if mul >= 0 { (QUANTITY_LIMIT, precision) } else { (-QUANTITY_LIMIT, precision) };
    }
    (mul as i64, precision)
}

/// Aliases for the seven base dimensions plus the common dimensionless
/// quantity, matching the kernel's `duration`, `distance`, etc.
pub type Duration = Quantity<crate::units::Seconds>;
pub type Distance = Quantity<crate::units::Meters>;
pub type Mass = Quantity<crate::units::Grams>;
pub type Current = Quantity<crate::units::Amperes>;
pub type Temperature = Quantity<crate::units::Kelvins>;
pub type Amount = Quantity<crate::units::Moles>;
pub type Luminosity = Quantity<crate::units::Candelas>;
pub type Identity = Quantity<NoUnits>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::levels;
    use proptest::prelude::*;

    #[test]
    fn construction_does_not_autoscale() {
        let q = Duration::new(1_000, levels::MILLI);
        assert_eq!(q.multiplier(), 1_000);
        assert_eq!(q.precision(), levels::MILLI);
    }

    #[test]
    fn arithmetic_autoscales_its_result() {
        let q = Duration::new(1_000, levels::MILLI) + Duration::zero();
        assert_eq!(q.multiplier(), 1);
        assert_eq!(q.precision(), levels::UNIT);
    }

    #[test]
    fn rescale_round_trip() {
        let q = Duration::new(1234, levels::MILLI);
        let back = q.rescaled(levels::MICRO).rescaled(levels::MILLI);
        assert_eq!(back, q);
    }

    #[test]
    fn distance_literal_overflow_saturates_to_infinity() {
        let a = Distance::new_fixed(999_999_999_999_999, levels::UNIT);
        let b = Distance::new_fixed(1, levels::UNIT);
        assert_eq!(a + b, Distance::inf());
    }

    #[test]
    fn mixed_precision_duration_addition() {
        let a = Duration::new(3, levels::UNIT);
        let b = Duration::new(475, levels::MILLI);
        let sum = a + b;
        assert_eq!(sum.rescaled(levels::MILLI).multiplier(), 3475);
    }

    #[test]
    fn fixed_addition_with_mismatched_precision_is_invalid() {
        let a = Duration::new(1, levels::UNIT).fixed_at(levels::MILLI);
        let b = Duration::new(1, levels::UNIT).fixed_at(levels::MICRO);
        let sum = a + b;
        assert!(!sum.valid());
    }

    #[test]
    fn opposite_sign_infinities_are_invalid() {
        let sum = Duration::inf() + Duration::neg_inf();
        assert!(!sum.valid());
    }

    #[test]
    fn same_sign_infinities_stay_infinite() {
        let sum = Duration::inf() + Duration::inf();
        assert_eq!(sum, Duration::inf());
    }

    #[test]
    fn ordering_consistency_with_difference_sign() {
        let a = Duration::new(1, levels::UNIT);
        let b = Duration::new(2, levels::UNIT);
        assert!(a < b);
        assert!((b - a).sign() > 0);
    }

    #[test]
    fn quantity_times_quantity_composes_dimensions() {
        let time = Duration::new(2, levels::UNIT);
        let distance = Distance::new(3, levels::UNIT);
        let product = time.checked_mul(distance);
        assert_eq!(product.dim(), dim_add(crate::units::Seconds::DIM, crate::units::Meters::DIM));
    }

    #[test]
    fn quantity_over_quantity_recovers_typed_dimensionless_result() {
        let a = Duration::new(10, levels::UNIT);
        let b = Duration::new(5, levels::UNIT);
        let ratio = a.checked_div(b).unwrap();
        let typed: Identity = ratio.into_typed().unwrap();
        assert_eq!(typed.multiplier(), 2);
    }

    #[test]
    fn duration_round_trips_through_json() {
        let original = Duration::new_fixed(475, levels::MILLI);
        let json = serde_json::to_string(&original).unwrap();
        let restored: Duration = serde_json::from_str(&json).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn any_quantity_round_trips_through_json() {
        let original = Duration::new(2, levels::UNIT).checked_mul(Distance::new(3, levels::UNIT));
        let json = serde_json::to_string(&original).unwrap();
        let restored: AnyQuantity = serde_json::from_str(&json).unwrap();
        assert_eq!(original.multiplier(), restored.multiplier());
        assert_eq!(original.dim(), restored.dim());
    }

    proptest! {
        /// `q.rescaled(s).rescaled(q.precision) == q` for any finite unfixed
        /// `q` and `s <= q.precision` (refining then coarsening back is exact).
        #[test]
        fn rescale_round_trip_holds_for_all_legal_inputs(mul in -100_000i64..100_000, level in -2i32..2, down_steps in 0i32..3) {
            let precision = levels::UNIT + level;
            let q = Duration::new(mul, precision);
            let finer = precision - down_steps;
            let round_tripped = q.rescaled(finer).rescaled(precision);
            prop_assert_eq!(round_tripped, q);
        }

        /// `a < b` iff `(b - a)` is positive, for any pair of finite
        /// same-precision quantities.
        #[test]
        fn ordering_is_consistent_with_difference_sign(ma in -10_000i64..10_000, mb in -10_000i64..10_000, level in -2i32..2) {
            let precision = levels::UNIT + level;
            let a = Duration::new(ma, precision);
            let b = Duration::new(mb, precision);
            prop_assert_eq!(a < b, (b - a).sign() > 0);
            prop_assert_eq!(a == b, (b - a).sign() == 0);
        }
    }
}
