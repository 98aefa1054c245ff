//! Compile-time unit tags for [`crate::Quantity`].
//!
//! A unit is represented by its exponents over the seven SI base
//! dimensions (time, length, mass, current, temperature, amount,
//! luminous intensity). Concrete unit marker types carry their exponents
//! as an associated constant; `Quantity<U> * Quantity<V>` composes
//! dimensions at runtime into a [`Dim7`] carried by [`crate::AnyQuantity`],
//! per the "dispatch at runtime on a boxed exponent tuple" option noted
//! for template-heavy arithmetic.

use std::fmt;

/// Exponents over `(s, m, g, A, K, mol, cd)`.
pub type Dim7 = [i8; 7];

pub const DIMENSIONLESS: Dim7 = [0, 0, 0, 0, 0, 0, 0];

pub fn dim_add(a: Dim7, b: Dim7) -> Dim7 {
    std::array::from_fn(|i| a[i] + b[i])
}

pub fn dim_sub(a: Dim7, b: Dim7) -> Dim7 {
    std::array::from_fn(|i| a[i] - b[i])
}

pub fn dim_neg(a: Dim7) -> Dim7 {
    std::array::from_fn(|i| -a[i])
}

/// A compile-time unit tag usable as `Quantity<U>`'s type parameter.
pub trait Unit: Copy + Clone + fmt::Debug + Send + Sync + 'static {
    const DIM: Dim7;
    const SYMBOL: &'static str;
}

macro_rules! base_unit {
    ($(#[$meta:meta])* $name:ident, $dim:expr, $symbol:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name;

        impl Unit for $name {
            const DIM: Dim7 = $dim;
            const SYMBOL: &'static str = $symbol;
        }
    };
}

base_unit!(
    /// The dimensionless unit, also the result of dividing like quantities.
    NoUnits,
    DIMENSIONLESS,
    ""
);
base_unit!(Seconds, [1, 0, 0, 0, 0, 0, 0], "s");
base_unit!(Meters, [0, 1, 0, 0, 0, 0, 0], "m");
base_unit!(Grams, [0, 0, 1, 0, 0, 0, 0], "g");
base_unit!(Amperes, [0, 0, 0, 1, 0, 0, 0], "A");
base_unit!(Kelvins, [0, 0, 0, 0, 1, 0, 0], "K");
base_unit!(Moles, [0, 0, 0, 0, 0, 1, 0], "mol");
base_unit!(Candelas, [0, 0, 0, 0, 0, 0, 1], "cd");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dim_add_composes_exponents() {
        assert_eq!(dim_add(Meters::DIM, Seconds::DIM), [1, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn dim_sub_is_inverse_of_add() {
        let composed = dim_add(Meters::DIM, Seconds::DIM);
        assert_eq!(dim_sub(composed, Seconds::DIM), Meters::DIM);
    }
}
