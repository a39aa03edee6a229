//! Dimension-aware quantities (`"1kg"`, `"500ml"`, plain counts).
//!
//! A [`Quantity`] keeps the literal text it was parsed from (`original`)
//! purely for display purposes; every comparison, hash and arithmetic
//! operation works off `amount` and `unit`, normalized to each dimension's
//! base magnitude so `1000g` and `1kg` are the same quantity even though
//! their original text differs.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CatalogError, CatalogResult};
use crate::types::unit::Unit;

#[derive(Debug, Clone)]
pub struct Quantity {
    amount: Decimal,
    unit: Option<Unit>,
    original: Option<String>,
}

impl Quantity {
    /// A dimensionless zero, the additive identity.
    pub fn zero() -> Self {
        Self { amount: Decimal::ZERO, unit: None, original: None }
    }

    /// Construct a dimensionless quantity from a raw amount, with no
    /// preserved original text (used internally by arithmetic results).
    pub fn from_amount(amount: Decimal) -> Self {
        Self { amount, unit: None, original: None }
    }

    pub fn with_unit(amount: Decimal, unit: Unit) -> Self {
        Self { amount, unit: Some(unit), original: None }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }

    fn base_amount(&self) -> Decimal {
        match &self.unit {
            Some(unit) => self.amount * unit.base_factor(),
            None => self.amount,
        }
    }

    fn signature(&self) -> std::collections::BTreeMap<crate::types::unit::Dimension, i32> {
        match &self.unit {
            Some(unit) => unit.signature(),
            None => std::collections::BTreeMap::new(),
        }
    }

    fn compatible_with(&self, other: &Quantity) -> bool {
        self.signature() == other.signature()
    }

    fn require_compatible(&self, other: &Quantity) -> CatalogResult<()> {
        if self.compatible_with(other) {
            Ok(())
        } else {
            Err(CatalogError::incompatible_units(format!(
                "cannot combine {self} with {other}: incompatible dimensions"
            )))
        }
    }

    pub fn checked_add(&self, other: &Quantity) -> CatalogResult<Quantity> {
        self.require_compatible(other)?;
        // Result is expressed in self's unit; normalize other's base amount
        // back down through self's scale so mixed symbols of one dimension
        // (grams + kilograms) add correctly.
        let self_scale = self.unit.as_ref().map(Unit::base_factor).unwrap_or(Decimal::ONE);
        let other_in_self_scale = if self_scale.is_zero() {
            other.amount
        } else {
            other.base_amount() / self_scale
        };
        Ok(Quantity { amount: self.amount + other_in_self_scale, unit: self.unit.clone(), original: None })
    }

    pub fn checked_sub(&self, other: &Quantity) -> CatalogResult<Quantity> {
        self.checked_add(&-other.clone())
    }

    /// Multiply by a plain scalar, preserving the unit.
    pub fn scale(&self, factor: Decimal) -> Quantity {
        Quantity { amount: self.amount * factor, unit: self.unit.clone(), original: None }
    }

    /// Multiply two quantities, composing their dimensions (used to
    /// recover a unit-priced matcher's per-item price: `price_per_unit *
    /// item_amount`).
    pub fn checked_mul(&self, other: &Quantity) -> Quantity {
        let unit = match (&self.unit, &other.unit) {
            (Some(a), Some(b)) => a.multiply(b),
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        };
        Quantity { amount: self.amount * other.amount, unit, original: None }
    }

    pub fn checked_div(&self, other: &Quantity) -> CatalogResult<Quantity> {
        if other.amount.is_zero() {
            return Err(CatalogError::validation("division by zero quantity"));
        }
        let inv_unit = other.unit.as_ref().map(Unit::invert);
        let unit = match (&self.unit, inv_unit) {
            (Some(a), Some(b)) => a.multiply(&b),
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        Ok(Quantity { amount: self.amount / other.amount, unit, original: None })
    }

    pub fn abs(&self) -> Quantity {
        Quantity { amount: self.amount.abs(), unit: self.unit.clone(), original: None }
    }

    pub fn round(&self, places: u32) -> Quantity {
        Quantity { amount: self.amount.round_dp(places), unit: self.unit.clone(), original: None }
    }

    /// True iff this quantity carries no unit, i.e. it may be compared
    /// directly against a plain number.
    pub fn is_dimensionless(&self) -> bool {
        self.unit.is_none()
    }

    /// Parse a literal like `"1kg"`, `"0.50"`, `"2"`, preserving the
    /// original text for display.
    pub fn parse(text: &str) -> CatalogResult<Quantity> {
        let trimmed = text.trim();
        let split_at = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
            .unwrap_or(trimmed.len());
        let (amount_part, unit_part) = trimmed.split_at(split_at);
        let amount = Decimal::from_str(amount_part)
            .map_err(|err| CatalogError::validation(format!("invalid quantity '{text}': {err}")))?;
        let unit_part = unit_part.trim();
        let unit = if unit_part.is_empty() { None } else { Some(Unit::parse(unit_part)?) };
        Ok(Quantity { amount, unit, original: Some(trimmed.to_string()) })
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.signature() == other.signature() && self.base_amount() == other.base_amount()
    }
}

impl Eq for Quantity {}

/// Defined only between quantities sharing a dimension signature;
/// comparing mismatched dimensions is not a total order, so this is a
/// partial one.
impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if !self.compatible_with(other) {
            return None;
        }
        self.base_amount().partial_cmp(&other.base_amount())
    }
}

/// A dimensionless quantity compares equal to a plain decimal with the
/// same magnitude.
impl PartialEq<Decimal> for Quantity {
    fn eq(&self, other: &Decimal) -> bool {
        self.is_dimensionless() && self.amount == *other
    }
}

impl Hash for Quantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (dim, exp) in self.signature() {
            dim.hash(state);
            exp.hash(state);
        }
        self.base_amount().normalize().hash(state);
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(original) = &self.original {
            return write!(f, "{original}");
        }
        match &self.unit {
            Some(unit) => write!(f, "{} {}", self.amount, unit),
            None => write!(f, "{}", self.amount),
        }
    }
}

impl FromStr for Quantity {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quantity::parse(s)
    }
}

impl From<Decimal> for Quantity {
    fn from(amount: Decimal) -> Self {
        Quantity::from_amount(amount)
    }
}

/// Numeric coercion from a dimensionless integer.
impl From<i64> for Quantity {
    fn from(amount: i64) -> Self {
        Quantity::from_amount(Decimal::from(amount))
    }
}

impl Quantity {
    /// Lossy float view of the raw amount (unit dropped), for callers that
    /// need to interoperate with an external numeric API.
    pub fn to_f64(&self) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;
        self.amount.to_f64()
    }
}

/// Serializes through the same textual form the `Display`/`parse` pair
/// round-trips on, preserving the original spelling across a write and
/// read back.
impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Quantity::parse(&text).map_err(serde::de::Error::custom)
    }
}

impl Neg for Quantity {
    type Output = Quantity;

    fn neg(self) -> Quantity {
        Quantity { amount: -self.amount, unit: self.unit, original: None }
    }
}

impl Add for Quantity {
    type Output = CatalogResult<Quantity>;

    fn add(self, rhs: Quantity) -> CatalogResult<Quantity> {
        self.checked_add(&rhs)
    }
}

impl Sub for Quantity {
    type Output = CatalogResult<Quantity>;

    fn sub(self, rhs: Quantity) -> CatalogResult<Quantity> {
        self.checked_sub(&rhs)
    }
}

impl Mul for Quantity {
    type Output = Quantity;

    fn mul(self, rhs: Quantity) -> Quantity {
        self.checked_mul(&rhs)
    }
}

impl Div for Quantity {
    type Output = CatalogResult<Quantity>;

    fn div(self, rhs: Quantity) -> CatalogResult<Quantity> {
        self.checked_div(&rhs)
    }
}

impl Quantity {
    /// Remainder after dividing by another quantity of the same dimension,
    /// expressed in self's unit.
    pub fn checked_rem(&self, other: &Quantity) -> CatalogResult<Quantity> {
        self.require_compatible(other)?;
        let self_scale = self.unit.as_ref().map(Unit::base_factor).unwrap_or(Decimal::ONE);
        let other_in_self_scale = if self_scale.is_zero() { other.amount } else { other.base_amount() / self_scale };
        Ok(Quantity { amount: self.amount % other_in_self_scale, unit: self.unit.clone(), original: None })
    }

    /// Floor (whole-unit) division by a dimensionless scalar.
    pub fn floor_div(&self, factor: Decimal) -> Quantity {
        Quantity { amount: (self.amount / factor).floor(), unit: self.unit.clone(), original: None }
    }

    /// Raise the amount to a non-negative integer power, composing the
    /// unit's dimensions the same number of times.
    pub fn powi(&self, exponent: u32) -> Quantity {
        let mut result = Quantity::from_amount(Decimal::ONE);
        for _ in 0..exponent {
            result = result.checked_mul(self);
        }
        result
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// `q + (-q) == Quantity::zero()` of the same unit.
        #[test]
        fn negation_is_additive_inverse(amount in -1_000_000_i64..=1_000_000) {
            let q = Quantity::from_amount(Decimal::new(amount, 2));
            let sum = q.clone().checked_add(&-q).unwrap();
            prop_assert_eq!(sum, Quantity::zero());
        }

        /// `(q * k) / k == q` for non-zero scalar k.
        #[test]
        fn scale_then_unscale_recovers_original(amount in -10_000_i64..=10_000, factor in 1_i64..=1000) {
            let q = Quantity::from_amount(Decimal::new(amount, 2));
            let k = Quantity::from_amount(Decimal::from(factor));
            let recovered = q.clone().checked_mul(&k).checked_div(&k).unwrap();
            prop_assert_eq!(recovered, q);
        }
    }
}
