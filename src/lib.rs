//! # rechu-core
//!
//! Core matching and inventory-reconciliation engine for a receipt and
//! product-metadata cataloging system.
//!
//! Two tightly coupled subsystems do the hard work:
//!
//! - **The Product Matcher** ([`matcher`]) decides which product metadata
//!   record a receipt line item refers to, respecting per-matcher
//!   semantics (unit-scaled prices, year-indexed price history, min/max
//!   bands, multi-label disjunction, discount-label conjunction) and
//!   maintaining an in-memory uniqueness index to detect duplicate
//!   metadata.
//! - **The Inventory Engine** ([`inventory`]) reconciles products and
//!   shops between a relational store and a sharded set of human-edited
//!   files, via a three-way merge that can add, update, split, or delete
//!   records while keeping receipt-to-product references valid.
//!
//! [`types`] and [`models`] provide the value types and entities these
//! two subsystems operate on; [`io`] and [`store`] are the Reader/Writer
//! and Store ports external collaborators plug into; [`settings`] is the
//! configuration port.
//!
//! Out of scope, per the design this crate follows: the invocation
//! surface (subcommands, flags), the relational schema and migrations,
//! YAML serialization syntax beyond the reference [`io::yaml`] backend,
//! the interactive receipt-creation menu, and editor/subprocess plumbing.

pub mod builders;
pub mod error;
pub mod inventory;
pub mod io;
pub mod matcher;
pub mod models;
pub mod settings;
pub mod store;
pub mod types;

pub use error::{CatalogError, CatalogResult};

/// Convenience module for common imports.
pub mod prelude {
    pub use crate::builders::{ProductBuilder, ReceiptBuilder, ShopBuilder};
    pub use crate::error::{CatalogError, CatalogResult, ReaderError, SettingsError, StoreError, WriterError};
    pub use crate::inventory::Inventory;
    pub use crate::matcher::product::{MapKeyKind, MatchItem, ProductMatcher};
    pub use crate::matcher::Matcher;
    pub use crate::models::{
        Discount, DiscountIndicator, DiscountMatcher, LabelMatcher, PriceIndicatorKind, PriceMatcher, Product,
        ProductItem, Receipt, Shop,
    };
    pub use crate::settings::{Settings, SettingsBuilder};
    pub use crate::store::{ObservedField, ProductFilters, Store};
    pub use crate::types::{Dimension, Gtin, Price, Quantity, Unit};
}
