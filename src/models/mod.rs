//! Domain entities: shops, products (with label/price/discount matchers
//! and generic/range hierarchy) and receipts (with owned items and
//! discounts).

pub mod product;
pub mod receipt;
pub mod shop;

pub use product::{DiscountMatcher, LabelMatcher, PriceIndicatorKind, PriceMatcher, Product};
pub use receipt::{Discount, ProductItem, Receipt};
pub use shop::{DiscountIndicator, Shop};
