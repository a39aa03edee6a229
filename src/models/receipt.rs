//! Receipt and its owned line items and discounts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Price, Quantity};

/// A single receipt line item.
///
/// Receipts exclusively own their items (cascade on delete); `product_id`
/// is a weak reference to a [`crate::models::Product`] that is nulled if
/// the product disappears, never cascaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductItem {
    pub id: Option<i64>,
    pub quantity: Quantity,
    pub label: String,
    pub price: Price,
    pub discount_indicator: Option<String>,
    pub product_id: Option<i64>,
    pub position: usize,
    /// Substrings produced by matching the owning shop's discount
    /// indicator patterns against `discount_indicator`. Derived, not
    /// stored on the wire; populated by the reader once a shop is known.
    #[serde(skip)]
    pub discount_indicators: Vec<String>,
}

impl ProductItem {
    pub fn new(quantity: Quantity, label: impl Into<String>, price: Price, position: usize) -> Self {
        Self {
            id: None,
            quantity,
            label: label.into(),
            price,
            discount_indicator: None,
            product_id: None,
            position,
            discount_indicators: Vec::new(),
        }
    }

    /// The numeric magnitude of `quantity`.
    pub fn amount(&self) -> rust_decimal::Decimal {
        self.quantity.amount()
    }

    /// The normalized unit of `quantity`, if any.
    pub fn unit(&self) -> Option<&crate::types::Unit> {
        self.quantity.unit()
    }
}

/// A receipt-level discount, linked many-to-many to the [`ProductItem`]s
/// it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    pub id: Option<i64>,
    pub label: String,
    /// Always non-positive: the amount subtracted from the receipt total.
    pub price_decrease: Price,
    pub position: usize,
    #[serde(default)]
    pub item_positions: Vec<usize>,
}

impl Discount {
    pub fn new(label: impl Into<String>, price_decrease: Price, position: usize) -> Self {
        Self { id: None, label: label.into(), price_decrease, position, item_positions: Vec::new() }
    }
}

/// A receipt: filename-identified, shop-scoped, owning an ordered list of
/// items and discounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub filename: String,
    pub updated: Option<chrono::DateTime<chrono::Utc>>,
    pub date: NaiveDate,
    pub shop: String,
    #[serde(default)]
    pub products: Vec<ProductItem>,
    #[serde(default)]
    pub discounts: Vec<Discount>,
}

impl Receipt {
    pub fn new(filename: impl Into<String>, date: NaiveDate, shop: impl Into<String>) -> Self {
        Self { filename: filename.into(), updated: None, date, shop: shop.into(), products: Vec::new(), discounts: Vec::new() }
    }

    /// Sum of item prices plus the (negative) sum of discount decreases.
    pub fn total_price(&self) -> Price {
        let items_total: Price = self.products.iter().map(|item| item.price).sum();
        let discounts_total: Price = self.discounts.iter().map(|discount| discount.price_decrease).sum();
        items_total + discounts_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Quantity;
    use std::str::FromStr;

    #[test]
    fn total_price_subtracts_discounts() {
        let mut receipt = Receipt::new("2024-11-01-aldi.yml", NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(), "aldi");
        receipt.products.push(ProductItem::new(
            Quantity::parse("2").unwrap(),
            "bulk",
            Price::from_str("5.00").unwrap(),
            0,
        ));
        receipt.discounts.push(Discount::new("disco", Price::from_str("-2.00").unwrap(), 0));
        assert_eq!(receipt.total_price(), Price::from_str("3.00").unwrap());
    }

    #[test]
    fn positions_are_stable_and_zero_based() {
        let mut receipt = Receipt::new("r.yml", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), "aldi");
        receipt.products.push(ProductItem::new(Quantity::parse("1").unwrap(), "a", Price::ZERO, 0));
        receipt.products.push(ProductItem::new(Quantity::parse("1").unwrap(), "b", Price::ZERO, 1));
        assert_eq!(receipt.products[0].position, 0);
        assert_eq!(receipt.products[1].position, 1);
    }
}
