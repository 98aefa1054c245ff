//! # sydevs-types
//!
//! Dimensioned-quantity and arbitrary-precision time-value primitives
//! underlying the `sydevs` simulation kernel.
//!
//! ## Philosophy
//!
//! This crate has no notion of nodes, events, or a scheduler. It is the
//! "leaf" layer: a base-1000 logarithmic [`Scale`], a checked-arithmetic
//! [`Quantity`] parameterized by a compile-time [`units::Unit`], the
//! arbitrary-precision [`TimePoint`], and the [`qualified::Qualified`]
//! capability that lets arbitrary user value types sit on a port.
//!
//! ## Quick start
//!
//! ```
//! use sydevs_types::{Duration, levels};
//!
//! let a = Duration::new_fixed(3, levels::UNIT);
//! let b = Duration::new_fixed(475, levels::MILLI);
//! let sum = a + b;
//! assert_eq!(sum.rescaled(levels::MILLI).multiplier(), 3475);
//! ```

pub mod error;
pub mod qualified;
pub mod quantity;
pub mod scale;
pub mod time_point;
pub mod units;

pub use error::{Error, Result};
pub use qualified::{Qualified, SortableQualified};
pub use quantity::{
    AnyQuantity, Amount, Current, Distance, Duration, Identity, Luminosity, Mass, Quantity,
    Temperature, QUANTITY_LIMIT,
};
pub use scale::{levels, Scale};
pub use time_point::TimePoint;
pub use units::{Amperes, Candelas, Grams, Kelvins, Meters, Moles, NoUnits, Seconds, Unit};

/// Literal-suffix convenience constructors (`1_s`, `1_ms`, ..., `1_yr`,
/// plus the other six SI base units). These are ordinary extension
/// traits over the primitive numeric types, not a procedural-macro
/// literal syntax — Rust has no user-definable numeric literal suffixes,
/// so `1_s` is a regular integer literal with a conventional suffix-style
/// variable name, resolved via method call in the companion `literals`
/// module in downstream code: `1.s()`, `1.ms()`, etc.
pub mod literals {
    use crate::quantity::{Amount, Current, Distance, Luminosity, Mass, Temperature};
    use crate::scale::levels::*;
    use crate::Duration;

    /// Extension trait adding duration-literal constructors to integers.
    pub trait DurationLiteral {
        fn ys(self) -> Duration;
        fn zs(self) -> Duration;
        fn atos(self) -> Duration;
        fn fs(self) -> Duration;
        fn ps(self) -> Duration;
        fn ns(self) -> Duration;
        fn us(self) -> Duration;
        fn ms(self) -> Duration;
        fn s(self) -> Duration;
        fn ks(self) -> Duration;
        fn megas(self) -> Duration;
        fn gs(self) -> Duration;
        fn ts(self) -> Duration;
        fn petas(self) -> Duration;
        fn exas(self) -> Duration;
        fn zettas(self) -> Duration;
        fn yottas(self) -> Duration;
        fn min(self) -> Duration;
        fn hr(self) -> Duration;
        fn day(self) -> Duration;
        fn yr(self) -> Duration;
    }

    impl DurationLiteral for i64 {
        fn ys(self) -> Duration {
            Duration::new_fixed(self, YOCTO)
        }
        fn zs(self) -> Duration {
            Duration::new_fixed(self, ZEPTO)
        }
        fn atos(self) -> Duration {
            Duration::new_fixed(self, ATTO)
        }
        fn fs(self) -> Duration {
            Duration::new_fixed(self, FEMTO)
        }
        fn ps(self) -> Duration {
            Duration::new_fixed(self, PICO)
        }
        fn ns(self) -> Duration {
            Duration::new_fixed(self, NANO)
        }
        fn us(self) -> Duration {
            Duration::new_fixed(self, MICRO)
        }
        fn ms(self) -> Duration {
            Duration::new_fixed(self, MILLI)
        }
        fn s(self) -> Duration {
            Duration::new_fixed(self, UNIT)
        }
        fn ks(self) -> Duration {
            Duration::new_fixed(self, KILO)
        }
        fn megas(self) -> Duration {
            Duration::new_fixed(self, MEGA)
        }
        fn gs(self) -> Duration {
            Duration::new_fixed(self, GIGA)
        }
        fn ts(self) -> Duration {
            Duration::new_fixed(self, TERA)
        }
        fn petas(self) -> Duration {
            Duration::new_fixed(self, PETA)
        }
        fn exas(self) -> Duration {
            Duration::new_fixed(self, EXA)
        }
        fn zettas(self) -> Duration {
            Duration::new_fixed(self, ZETTA)
        }
        fn yottas(self) -> Duration {
            Duration::new_fixed(self, YOTTA)
        }
        // Non-decimal duration units, expressed as fixed quantities at
        // the finest exact precision (seconds).
        fn min(self) -> Duration {
            Duration::new_fixed(self * 60, UNIT)
        }
        fn hr(self) -> Duration {
            Duration::new_fixed(self * 3600, UNIT)
        }
        fn day(self) -> Duration {
            Duration::new_fixed(self * 86_400, UNIT)
        }
        fn yr(self) -> Duration {
            Duration::new_fixed(self * 31_557_600, UNIT)
        }
    }

    /// Extension trait adding base-unit literal constructors (distance,
    /// mass, current, temperature, amount, luminosity) to integers.
    pub trait BaseUnitLiteral {
        fn m(self) -> Distance;
        fn g(self) -> Mass;
        fn amp(self) -> Current;
        fn k(self) -> Temperature;
        fn mol(self) -> Amount;
        fn cd(self) -> Luminosity;
    }

    impl BaseUnitLiteral for i64 {
        fn m(self) -> Distance {
            Distance::new_fixed(self, UNIT)
        }
        fn g(self) -> Mass {
            Mass::new_fixed(self, UNIT)
        }
        fn amp(self) -> Current {
            Current::new_fixed(self, UNIT)
        }
        fn k(self) -> Temperature {
            Temperature::new_fixed(self, UNIT)
        }
        fn mol(self) -> Amount {
            Amount::new_fixed(self, UNIT)
        }
        fn cd(self) -> Luminosity {
            Luminosity::new_fixed(self, UNIT)
        }
    }

}
