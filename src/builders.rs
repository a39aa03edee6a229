//! Fluent builders for the three owned entities: products, shops and
//! receipts. Each follows the same shape as the rest of this crate's
//! constructors: required fields up front in `new`, optional fields set
//! through consuming setters, validation deferred to `build`.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{Discount, DiscountIndicator, DiscountMatcher, LabelMatcher, PriceMatcher, Product, ProductItem, Receipt, Shop};
use crate::types::{Gtin, Price, Quantity};

/// Builder for [`Product`].
#[derive(Debug, Clone)]
pub struct ProductBuilder {
    shop: String,
    brand: Option<String>,
    description: Option<String>,
    category: Option<String>,
    kind: Option<String>,
    portions: Option<i32>,
    weight: Option<Quantity>,
    volume: Option<Quantity>,
    alcohol: Option<Decimal>,
    sku: Option<String>,
    gtin: Option<Gtin>,
    labels: Vec<LabelMatcher>,
    prices: Vec<PriceMatcher>,
    discounts: Vec<DiscountMatcher>,
}

impl ProductBuilder {
    pub fn new(shop: impl Into<String>) -> Self {
        Self {
            shop: shop.into(),
            brand: None,
            description: None,
            category: None,
            kind: None,
            portions: None,
            weight: None,
            volume: None,
            alcohol: None,
            sku: None,
            gtin: None,
            labels: Vec::new(),
            prices: Vec::new(),
            discounts: Vec::new(),
        }
    }

    pub fn brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn portions(mut self, portions: i32) -> Self {
        self.portions = Some(portions);
        self
    }

    pub fn weight(mut self, weight: Quantity) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn volume(mut self, volume: Quantity) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn alcohol(mut self, percentage: Decimal) -> Self {
        self.alcohol = Some(percentage);
        self
    }

    pub fn sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn gtin(mut self, gtin: Gtin) -> Self {
        self.gtin = Some(gtin);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(LabelMatcher::new(label));
        self
    }

    pub fn price(mut self, value: Decimal, indicator: Option<impl Into<String>>) -> Self {
        self.prices.push(PriceMatcher::new(value, indicator));
        self
    }

    pub fn discount(mut self, label: impl Into<String>) -> Self {
        self.discounts.push(DiscountMatcher::new(label));
        self
    }

    /// Construct the product, validating every price matcher added (year
    /// not in the future, minimum not exceeding maximum) the same way
    /// [`Product::merge`] would on a subsequent merge.
    pub fn build(self) -> CatalogResult<Product> {
        let mut product = Product::new(self.shop);
        product.brand = self.brand;
        product.description = self.description;
        product.category = self.category;
        product.kind = self.kind;
        product.portions = self.portions;
        product.weight = self.weight;
        product.volume = self.volume;
        product.alcohol = self.alcohol;
        product.sku = self.sku;
        product.gtin = self.gtin;
        product.discounts = self.discounts;

        for label in self.labels {
            product.labels.push(label);
        }
        // Route prices through the same one-bare-price and year/band
        // validation a merge would apply, by merging them into an
        // otherwise-empty clone.
        let mut with_prices = Product::new(product.shop.clone());
        with_prices.merge_prices_for_build(&self.prices)?;
        product.prices = with_prices.prices;

        Ok(product)
    }
}

/// Builder for [`Shop`].
#[derive(Debug, Clone)]
pub struct ShopBuilder {
    key: String,
    name: Option<String>,
    website: Option<String>,
    products: Option<String>,
    wikidata: Option<String>,
    discount_indicator_patterns: Vec<String>,
}

impl ShopBuilder {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
            website: None,
            products: None,
            wikidata: None,
            discount_indicator_patterns: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn products_template(mut self, template: impl Into<String>) -> Self {
        self.products = Some(template.into());
        self
    }

    pub fn wikidata(mut self, id: impl Into<String>) -> Self {
        self.wikidata = Some(id.into());
        self
    }

    pub fn discount_indicator(mut self, pattern: impl Into<String>) -> Self {
        self.discount_indicator_patterns.push(pattern.into());
        self
    }

    /// Construct the shop, validating the key length and compiling every
    /// discount-indicator pattern.
    pub fn build(self) -> CatalogResult<Shop> {
        let mut shop = Shop::new(self.key)?;
        shop.name = self.name;
        shop.wikidata = self.wikidata;
        shop.products = self.products;
        if let Some(website) = self.website {
            shop.website = Some(
                url::Url::parse(&website)
                    .map_err(|err| CatalogError::validation(format!("invalid shop website '{website}': {err}")))?,
            );
        }
        for pattern in self.discount_indicator_patterns {
            shop.discount_indicators.push(DiscountIndicator::new(pattern)?);
        }
        Ok(shop)
    }
}

/// Builder for [`Receipt`], tracking item/discount position assignment so
/// callers never have to compute it themselves.
#[derive(Debug, Clone)]
pub struct ReceiptBuilder {
    filename: String,
    date: NaiveDate,
    shop: String,
    products: Vec<ProductItem>,
    discounts: Vec<Discount>,
}

impl ReceiptBuilder {
    pub fn new(filename: impl Into<String>, date: NaiveDate, shop: impl Into<String>) -> Self {
        Self { filename: filename.into(), date, shop: shop.into(), products: Vec::new(), discounts: Vec::new() }
    }

    /// Append a line item, assigning it the next position.
    pub fn item(mut self, quantity: Quantity, label: impl Into<String>, price: Price) -> Self {
        let position = self.products.len();
        self.products.push(ProductItem::new(quantity, label, price, position));
        self
    }

    /// Append a discount, assigning it the next position and recording
    /// which already-added items it applies to (by their position).
    pub fn discount(mut self, label: impl Into<String>, price_decrease: Price, item_positions: Vec<usize>) -> Self {
        let position = self.discounts.len();
        let mut discount = Discount::new(label, price_decrease, position);
        discount.item_positions = item_positions;
        self.discounts.push(discount);
        self
    }

    pub fn build(self) -> CatalogResult<Receipt> {
        for discount in &self.discounts {
            for &item_position in &discount.item_positions {
                if item_position >= self.products.len() {
                    return Err(CatalogError::validation(format!(
                        "discount '{}' references item position {item_position} but the receipt has {} items",
                        discount.label,
                        self.products.len()
                    )));
                }
            }
        }
        let mut receipt = Receipt::new(self.filename, self.date, self.shop);
        receipt.products = self.products;
        receipt.discounts = self.discounts;
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn product_builder_assembles_every_field() {
        let product = ProductBuilder::new("aldi")
            .brand("acme")
            .category("pantry")
            .sku("sku-1")
            .label("bulk")
            .price(dec!(1.50), None::<String>)
            .build()
            .unwrap();
        assert_eq!(product.brand, Some("acme".into()));
        assert_eq!(product.labels, vec![LabelMatcher::new("bulk")]);
        assert_eq!(product.prices.len(), 1);
    }

    #[test]
    fn product_builder_rejects_future_year_indicator() {
        let err = ProductBuilder::new("aldi").price(dec!(1.00), Some("2999")).build().unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));
    }

    #[test]
    fn shop_builder_compiles_discount_indicators() {
        let mut shop = ShopBuilder::new("aldi").discount_indicator(r"^bonus-(\d+)$").build().unwrap();
        let pieces = shop.split_discount_indicator("bonus-7").unwrap();
        assert_eq!(pieces, vec!["7".to_string()]);
    }

    #[test]
    fn shop_builder_rejects_invalid_website() {
        let err = ShopBuilder::new("aldi").website("not a url").build().unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));
    }

    #[test]
    fn receipt_builder_assigns_sequential_positions() {
        let receipt = ReceiptBuilder::new(
            "2024-11-01-aldi.yml",
            NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
            "aldi",
        )
        .item(Quantity::parse("1").unwrap(), "a", Price::from_str("1.00").unwrap())
        .item(Quantity::parse("2").unwrap(), "b", Price::from_str("2.00").unwrap())
        .discount("disco", Price::from_str("-1.00").unwrap(), vec![1])
        .build()
        .unwrap();
        assert_eq!(receipt.products[0].position, 0);
        assert_eq!(receipt.products[1].position, 1);
        assert_eq!(receipt.discounts[0].item_positions, vec![1]);
    }

    #[test]
    fn receipt_builder_rejects_discount_referencing_unknown_item() {
        let err = ReceiptBuilder::new(
            "2024-11-01-aldi.yml",
            NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
            "aldi",
        )
        .discount("disco", Price::from_str("-1.00").unwrap(), vec![0])
        .build()
        .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));
    }
}
