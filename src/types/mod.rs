//! Measurable value types: dimension-aware units, quantities, prices and
//! trade item identifiers. These are plain values with no entity identity
//! of their own; [`crate::models`] builds the catalog's entities on top of
//! them.

pub mod gtin;
pub mod price;
pub mod quantity;
pub mod unit;

pub use gtin::Gtin;
pub use price::Price;
pub use quantity::Quantity;
pub use unit::{Dimension, Unit};
