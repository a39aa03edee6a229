//! Global Trade Item Number identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// A GTIN, stored as its full numeric value (no check-digit validation;
/// the source model treats it as an opaque big integer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gtin(i64);

impl Gtin {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Gtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Gtin {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Gtin)
            .map_err(|err| CatalogError::validation(format!("invalid gtin '{s}': {err}")))
    }
}

impl From<i64> for Gtin {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_string() {
        let gtin: Gtin = "8710398503968".parse().unwrap();
        assert_eq!(gtin.to_string(), "8710398503968");
    }
}
