//! Physical dimension handling for [`Quantity`](super::quantity::Quantity).
//!
//! A [`Unit`] is a composition of base dimensions (mass, volume, count),
//! each carrying the symbol it was parsed from and an exponent, plus the
//! scale needed to convert one instance of that symbol into its
//! dimension's base magnitude (grams, milliliters, pieces). Two units
//! compare equal for matching purposes when their dimension/exponent
//! signature matches, regardless of which symbol produced them. That is
//! what lets `1000 g == 1 kg` hold in [`Quantity`] equality.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{CatalogError, CatalogResult};

/// A base physical dimension recognized by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    Mass,
    Volume,
    Count,
}

#[derive(Debug, Clone, PartialEq)]
struct UnitComponent {
    symbol: String,
    scale: Decimal,
    exponent: i32,
}

/// A normalized physical unit, possibly compound (e.g. the inverse of a
/// mass unit used by unit-priced matchers, or the square of a unit
/// produced by multiplying two quantities of the same dimension).
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    components: BTreeMap<Dimension, UnitComponent>,
}

fn known_unit(symbol: &str) -> Option<(Dimension, Decimal, &'static str)> {
    match symbol.to_ascii_lowercase().as_str() {
        "g" | "gram" | "grams" => Some((Dimension::Mass, Decimal::ONE, "gram")),
        "kg" | "kilogram" | "kilograms" => Some((Dimension::Mass, dec!(1000), "kilogram")),
        "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => {
            Some((Dimension::Volume, Decimal::ONE, "milliliter"))
        }
        "l" | "liter" | "liters" | "litre" | "litres" => {
            Some((Dimension::Volume, dec!(1000), "liter"))
        }
        "piece" | "pieces" | "x" | "count" => Some((Dimension::Count, Decimal::ONE, "piece")),
        _ => None,
    }
}

fn pow_decimal(base: Decimal, exponent: i32) -> Decimal {
    if exponent == 0 {
        return Decimal::ONE;
    }
    let mut result = Decimal::ONE;
    for _ in 0..exponent.unsigned_abs() {
        result *= base;
    }
    if exponent < 0 {
        Decimal::ONE / result
    } else {
        result
    }
}

impl Unit {
    /// Parse a single unit symbol (e.g. `"kg"`, `"kilogram"`) into its
    /// normalized single-dimension representation.
    pub fn parse(symbol: &str) -> CatalogResult<Self> {
        let (dimension, scale, canonical) = known_unit(symbol)
            .ok_or_else(|| CatalogError::validation(format!("unrecognized unit '{symbol}'")))?;
        let mut components = BTreeMap::new();
        components.insert(
            dimension,
            UnitComponent { symbol: canonical.to_string(), scale, exponent: 1 },
        );
        Ok(Self { components })
    }

    /// The dimension/exponent signature used to decide whether two
    /// quantities are dimensionally compatible.
    pub fn signature(&self) -> BTreeMap<Dimension, i32> {
        self.components.iter().map(|(dim, c)| (*dim, c.exponent)).collect()
    }

    /// Cumulative factor to convert one instance of this (possibly
    /// compound) unit into the base magnitude of its dimension(s).
    pub fn base_factor(&self) -> Decimal {
        self.components
            .values()
            .map(|c| pow_decimal(c.scale, c.exponent))
            .fold(Decimal::ONE, |acc, f| acc * f)
    }

    /// The canonical base unit for a single dimension (used when
    /// arithmetic must normalize across differing symbols of the same
    /// dimension, e.g. adding grams to kilograms).
    pub fn base_unit_for(dimension: Dimension) -> Self {
        let (symbol, scale) = match dimension {
            Dimension::Mass => ("gram", Decimal::ONE),
            Dimension::Volume => ("milliliter", Decimal::ONE),
            Dimension::Count => ("piece", Decimal::ONE),
        };
        let mut components = BTreeMap::new();
        components.insert(dimension, UnitComponent { symbol: symbol.to_string(), scale, exponent: 1 });
        Self { components }
    }

    /// Multiply two units, composing dimensions (exponents add).
    /// Components whose exponent cancels to zero are dropped, matching
    /// the dimensionless result of e.g. `kilogram * (1/kilogram)`.
    pub fn multiply(&self, other: &Unit) -> Option<Unit> {
        let mut components = self.components.clone();
        for (dim, comp) in &other.components {
            components
                .entry(*dim)
                .and_modify(|existing| existing.exponent += comp.exponent)
                .or_insert_with(|| comp.clone());
        }
        components.retain(|_, c| c.exponent != 0);
        if components.is_empty() {
            None
        } else {
            Some(Self { components })
        }
    }

    /// Invert every exponent, e.g. `kilogram` -> `1/kilogram`. Used to
    /// express a unit-priced matcher's "price per unit" as a Quantity.
    pub fn invert(&self) -> Unit {
        let mut components = self.components.clone();
        for c in components.values_mut() {
            c.exponent = -c.exponent;
        }
        Self { components }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = self.components.values().peekable();
        while let Some(c) = parts.next() {
            if c.exponent == 1 {
                write!(f, "{}", c.symbol)?;
            } else {
                write!(f, "{}**{}", c.symbol, c.exponent)?;
            }
            if parts.peek().is_some() {
                write!(f, " * ")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kilogram_and_gram_share_dimension_not_scale() {
        let kg = Unit::parse("kg").unwrap();
        let g = Unit::parse("gram").unwrap();
        assert_eq!(kg.signature(), g.signature());
        assert_eq!(kg.base_factor(), dec!(1000));
        assert_eq!(g.base_factor(), Decimal::ONE);
    }

    #[test]
    fn invert_then_multiply_cancels() {
        let kg = Unit::parse("kg").unwrap();
        let inv = kg.invert();
        assert!(kg.multiply(&inv).is_none());
    }

    #[test]
    fn multiply_same_dimension_sums_exponents() {
        let kg = Unit::parse("kg").unwrap();
        let squared = kg.multiply(&kg).unwrap();
        assert_eq!(squared.signature().get(&Dimension::Mass), Some(&2));
    }
}
