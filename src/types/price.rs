//! Monetary amounts quantized to two decimal places.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// A monetary amount, always quantized to a scale of 2 (cents).
///
/// Construction quantizes silently (mirroring the source type's `__new__`
/// override); there is no lossy-truncation error path because rounding to
/// the nearest cent is well-defined for any finite decimal input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

const SCALE: u32 = 2;

impl Price {
    pub const ZERO: Price = Price(Decimal::ZERO);

    /// Construct a price from any decimal-representable value, quantizing
    /// to two decimal places.
    pub fn new(value: Decimal) -> Self {
        Self(value.round_dp(SCALE))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn abs(&self) -> Price {
        Price(self.0.abs())
    }

    /// Round to `places` fractional digits, never below the 2-digit scale
    /// prices are always quantized to.
    pub fn round(&self, places: u32) -> Price {
        Price(self.0.round_dp(places.max(SCALE)))
    }
}

/// Scale by a dimensionless factor (discount multipliers, tax rates):
/// closed under Price.
impl Mul<Decimal> for Price {
    type Output = Price;

    fn mul(self, rhs: Decimal) -> Price {
        Price::new(self.0 * rhs)
    }
}

/// Dividing by a plain scalar stays a Price; dividing two prices yields
/// their dimensionless ratio as a `Decimal`.
impl Div<Decimal> for Price {
    type Output = Price;

    fn div(self, rhs: Decimal) -> Price {
        Price::new(self.0 / rhs)
    }
}

impl Div<Price> for Price {
    type Output = Decimal;

    fn div(self, rhs: Price) -> Decimal {
        self.0 / rhs.0
    }
}

impl TryFrom<f64> for Price {
    type Error = CatalogError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let decimal = Decimal::try_from(value)
            .map_err(|err| CatalogError::validation(format!("invalid price {value}: {err}")))?;
        Ok(Self::new(decimal))
    }
}

/// Numeric coercion from a whole-unit integer amount.
impl From<i64> for Price {
    fn from(value: i64) -> Self {
        Self::new(Decimal::from(value))
    }
}

impl Price {
    /// Lossy float view, for callers that need to interoperate with an
    /// external numeric API; `None` if the value can't be represented.
    pub fn to_f64(&self) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;
        self.0.to_f64()
    }

    /// Whole-cent integer view, truncating any residual fraction (prices
    /// are already quantized to 2 places, so this is exact).
    pub fn to_i64_cents(&self) -> Option<i64> {
        use rust_decimal::prelude::ToPrimitive;
        (self.0 * Decimal::ONE_HUNDRED).to_i64()
    }
}

impl FromStr for Price {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|err| CatalogError::validation(format!("invalid price '{s}': {err}")))?;
        Ok(Self::new(decimal))
    }
}

impl From<Decimal> for Price {
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Price {
    type Output = Price;

    fn add(self, rhs: Price) -> Price {
        Price::new(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Price;

    fn sub(self, rhs: Price) -> Price {
        Price::new(self.0 - rhs.0)
    }
}

impl Neg for Price {
    type Output = Price;

    fn neg(self) -> Price {
        Price::new(-self.0)
    }
}

/// Remainder after scalar division.
impl Rem<Decimal> for Price {
    type Output = Price;

    fn rem(self, rhs: Decimal) -> Price {
        Price::new(self.0 % rhs)
    }
}

impl Price {
    /// Floor (whole-unit) division by a scalar.
    pub fn floor_div(&self, rhs: Decimal) -> Price {
        Price::new((self.0 / rhs).floor())
    }

    /// Raise to a non-negative integer power.
    pub fn powi(&self, exponent: u32) -> Price {
        let mut result = Decimal::ONE;
        for _ in 0..exponent {
            result *= self.0;
        }
        Price::new(result)
    }
}

impl std::iter::Sum for Price {
    fn sum<I: Iterator<Item = Price>>(iter: I) -> Self {
        iter.fold(Price::ZERO, |acc, p| acc + p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quantizes_to_two_decimals() {
        let p = Price::new(dec!(1.005));
        assert_eq!(p.as_decimal(), dec!(1.01));
    }

    #[test]
    fn round_trips_through_string() {
        let p: Price = "3.00".parse().unwrap();
        assert_eq!(p.to_string(), "3.00");
    }

    #[test]
    fn addition_preserves_scale() {
        let a: Price = "5.00".parse().unwrap();
        let b: Price = "2.00".parse().unwrap();
        assert_eq!((a - b).to_string(), "3.00");
    }

    #[test]
    fn negation_is_additive_inverse() {
        let p: Price = "4.25".parse().unwrap();
        assert_eq!(p + (-p), Price::ZERO);
    }

    #[test]
    fn scalar_multiply_and_divide_roundtrip() {
        let p: Price = "2.00".parse().unwrap();
        assert_eq!((p * dec!(3)).to_string(), "6.00");
        assert_eq!((p * dec!(3)) / dec!(3), p);
    }

    #[test]
    fn dividing_two_prices_yields_decimal_ratio() {
        let a: Price = "6.00".parse().unwrap();
        let b: Price = "3.00".parse().unwrap();
        assert_eq!(a / b, dec!(2));
    }

    #[test]
    fn abs_discards_sign() {
        let discount: Price = "-2.00".parse().unwrap();
        assert_eq!(discount.abs().to_string(), "2.00");
    }

    #[test]
    fn remainder_and_floor_division_by_scalar() {
        let p: Price = "7.00".parse().unwrap();
        assert_eq!((p % dec!(3)).to_string(), "1.00");
        assert_eq!(p.floor_div(dec!(3)).to_string(), "2.00");
    }

    #[test]
    fn powi_squares_the_amount() {
        let p: Price = "2.00".parse().unwrap();
        assert_eq!(p.powi(2).to_string(), "4.00");
    }

    #[test]
    fn integer_and_float_coercion() {
        let p = Price::from(5_i64);
        assert_eq!(p.to_string(), "5.00");
        assert_eq!(p.to_f64(), Some(5.0));
        assert_eq!(p.to_i64_cents(), Some(500));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// `Price(str(x)) == x` for every valid Price.
        #[test]
        fn string_roundtrip_is_identity(cents in -1_000_000_i64..=1_000_000) {
            let price = Price::new(Decimal::new(cents, 2));
            let roundtripped: Price = price.to_string().parse().unwrap();
            prop_assert_eq!(roundtripped, price);
        }

        #[test]
        fn addition_then_subtraction_is_identity(a_cents in -1_000_000_i64..=1_000_000, b_cents in -1_000_000_i64..=1_000_000) {
            let a = Price::new(Decimal::new(a_cents, 2));
            let b = Price::new(Decimal::new(b_cents, 2));
            prop_assert_eq!((a + b) - b, a);
        }
    }
}
