//! Reference Reader/Writer backend, shaped after the original system's
//! YAML files (`products: [...]`, `bonuses: [...]`, price lists vs.
//! indicator-keyed maps) without chasing its exact byte layout, which is
//! explicitly out of scope.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{FormatError, ReaderError, ReaderResult, WriterError, WriterResult};
use crate::io::{Reader, Writer};
use crate::models::{Discount, DiscountIndicator, DiscountMatcher, LabelMatcher, PriceMatcher, Product, ProductItem, Receipt, Shop};
use crate::types::{Gtin, Price, Quantity};

#[derive(Debug, Deserialize)]
struct ProductsDocument {
    shop: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    products: Vec<ProductEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ProductEntry {
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    portions: Option<i32>,
    #[serde(default)]
    weight: Option<String>,
    #[serde(default)]
    volume: Option<String>,
    #[serde(default)]
    alcohol: Option<Decimal>,
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    gtin: Option<i64>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    prices: PriceList,
    #[serde(default)]
    bonuses: Vec<String>,
}

/// The original writes `prices` as a plain list when no matcher carries
/// an indicator, or as an indicator-keyed map otherwise; never both.
#[derive(Debug, Default)]
enum PriceList {
    #[default]
    Empty,
    Plain(Vec<Decimal>),
    Indicated(HashMap<String, Decimal>),
}

impl<'de> Deserialize<'de> for PriceList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            List(Vec<Decimal>),
            Map(HashMap<String, Decimal>),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::List(list) if list.is_empty() => PriceList::Empty,
            Repr::List(list) => PriceList::Plain(list),
            Repr::Map(map) if map.is_empty() => PriceList::Empty,
            Repr::Map(map) => PriceList::Indicated(map),
        })
    }
}

impl Serialize for PriceList {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            PriceList::Empty => serializer.collect_seq(std::iter::empty::<Decimal>()),
            PriceList::Plain(list) => list.serialize(serializer),
            PriceList::Indicated(map) => map.serialize(serializer),
        }
    }
}

/// Reads a products shard file into [`Product`] entities, all scoped to
/// the single shop named at the top of the document.
pub struct ProductsReader {
    path: PathBuf,
}

impl ProductsReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Reader<Product> for ProductsReader {
    fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, source: &mut dyn BufRead) -> ReaderResult<Vec<Product>> {
        let path_str = self.path.display().to_string();
        let doc: ProductsDocument = serde_yaml::from_reader(source).map_err(|err| ReaderError::Format {
            path: path_str.clone(),
            source: FormatError::from(err),
        })?;

        let mut products = Vec::with_capacity(doc.products.len());
        for entry in doc.products {
            let mut product = Product::new(doc.shop.clone());
            product.brand = entry.brand;
            product.description = entry.description;
            product.category = entry.category.or_else(|| doc.category.clone());
            product.kind = entry.kind.or_else(|| doc.kind.clone());
            product.portions = entry.portions;
            product.weight = entry
                .weight
                .as_deref()
                .map(Quantity::parse)
                .transpose()
                .map_err(|err| type_conversion(&path_str, "weight", err))?;
            product.volume = entry
                .volume
                .as_deref()
                .map(Quantity::parse)
                .transpose()
                .map_err(|err| type_conversion(&path_str, "volume", err))?;
            product.alcohol = entry.alcohol;
            product.sku = entry.sku;
            product.gtin = entry.gtin.map(Gtin::new);
            product.labels = entry.labels.into_iter().map(LabelMatcher::new).collect();
            product.prices = match entry.prices {
                PriceList::Empty => Vec::new(),
                PriceList::Plain(values) => values.into_iter().map(|value| PriceMatcher::new(value, None::<String>)).collect(),
                PriceList::Indicated(map) => map.into_iter().map(|(indicator, value)| PriceMatcher::new(value, Some(indicator))).collect(),
            };
            product.discounts = entry.bonuses.into_iter().map(DiscountMatcher::new).collect();
            products.push(product);
        }
        Ok(products)
    }
}

fn type_conversion(path: &str, field: &str, err: crate::error::CatalogError) -> ReaderError {
    ReaderError::TypeConversion { path: path.to_string(), field: field.to_string(), message: err.to_string() }
}

/// Writes a batch of products sharing a shop, hoisting shared `category`
/// and `type` into the document header when every product agrees on
/// them, per the original's header-hoisting behavior.
pub struct ProductsWriter {
    path: PathBuf,
    products: Vec<Product>,
    updated: Option<DateTime<Utc>>,
}

impl ProductsWriter {
    pub fn new(path: impl Into<PathBuf>, products: Vec<Product>) -> Self {
        Self { path: path.into(), products, updated: None }
    }

    pub fn with_updated(mut self, updated: DateTime<Utc>) -> Self {
        self.updated = Some(updated);
        self
    }

    fn prices_for(product: &Product) -> WriterResult<PriceList> {
        let mut plain = Vec::new();
        let mut indicated = HashMap::new();
        for price in &product.prices {
            match &price.indicator {
                Some(indicator) => {
                    indicated.insert(indicator.clone(), price.value);
                }
                None => plain.push(price.value),
            }
        }
        if !indicated.is_empty() {
            if !plain.is_empty() {
                return Err(WriterError::Heterogeneous { message: "not all price matchers have indicators".to_string() });
            }
            return Ok(PriceList::Indicated(indicated));
        }
        Ok(PriceList::Plain(plain))
    }
}

impl Writer<Product> for ProductsWriter {
    fn path(&self) -> &Path {
        &self.path
    }

    fn updated(&self) -> Option<DateTime<Utc>> {
        self.updated
    }

    fn serialize(&self, sink: &mut dyn Write) -> WriterResult<()> {
        let shop = match self.products.first() {
            Some(product) => product.shop.clone(),
            None => return Err(WriterError::Heterogeneous { message: "no products to serialize".to_string() }),
        };
        if self.products.iter().any(|p| p.shop != shop) {
            return Err(WriterError::Heterogeneous { message: "not all products are from the same shop".to_string() });
        }

        let shared_category = hoist(&self.products, |p| p.category.clone());
        let shared_kind = hoist(&self.products, |p| p.kind.clone());

        let mut entries = Vec::with_capacity(self.products.len());
        for product in &self.products {
            let prices = Self::prices_for(product)?;
            entries.push(ProductEntry {
                brand: product.brand.clone(),
                description: product.description.clone(),
                category: if shared_category.is_some() { None } else { product.category.clone() },
                kind: if shared_kind.is_some() { None } else { product.kind.clone() },
                portions: product.portions,
                weight: product.weight.as_ref().map(|q| q.to_string()),
                volume: product.volume.as_ref().map(|q| q.to_string()),
                alcohol: product.alcohol,
                sku: product.sku.clone(),
                gtin: product.gtin.map(|g| g.value()),
                labels: product.labels.iter().map(|l| l.0.clone()).collect(),
                prices,
                bonuses: product.discounts.iter().map(|d| d.0.clone()).collect(),
            });
        }

        let doc = ProductsDocument {
            shop,
            category: shared_category,
            kind: shared_kind,
            products: entries,
        };
        serde_yaml::to_writer(sink, &SerializableDocument::from(doc)).map_err(|err| WriterError::Format {
            path: self.path.display().to_string(),
            source: FormatError::from(err),
        })
    }
}

/// `ProductsDocument` only derives `Deserialize`; writing needs the
/// symmetric shape with `Serialize` too, kept as a thin mirror so the
/// read side stays decoupled from field-skipping/hoisting concerns.
#[derive(Debug, Serialize)]
struct SerializableDocument {
    shop: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    kind: Option<String>,
    products: Vec<ProductEntry>,
}

impl From<ProductsDocument> for SerializableDocument {
    fn from(doc: ProductsDocument) -> Self {
        Self { shop: doc.shop, category: doc.category, kind: doc.kind, products: doc.products }
    }
}

fn hoist(products: &[Product], select: impl Fn(&Product) -> Option<String>) -> Option<String> {
    let mut values: Vec<Option<String>> = products.iter().map(select).collect();
    let first = values.pop()?;
    if values.iter().all(|v| *v == first) {
        first
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
struct ShopEntry {
    key: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    products: Option<String>,
    #[serde(default)]
    wikidata: Option<String>,
    #[serde(default)]
    discount_indicators: Vec<String>,
}

/// Reads the single shops shard: a top-level list (not a mapping) of
/// shop entries.
pub struct ShopsReader {
    path: PathBuf,
}

impl ShopsReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Reader<Shop> for ShopsReader {
    fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, source: &mut dyn BufRead) -> ReaderResult<Vec<Shop>> {
        let path_str = self.path.display().to_string();
        let entries: Vec<ShopEntry> = serde_yaml::from_reader(source).map_err(|err| ReaderError::Format {
            path: path_str.clone(),
            source: FormatError::from(err),
        })?;

        entries
            .into_iter()
            .map(|entry| {
                let mut shop = Shop::new(entry.key).map_err(|err| ReaderError::TypeConversion {
                    path: path_str.clone(),
                    field: "key".to_string(),
                    message: err.to_string(),
                })?;
                shop.name = entry.name;
                shop.website = entry
                    .website
                    .as_deref()
                    .map(url::Url::parse)
                    .transpose()
                    .map_err(|err| ReaderError::TypeConversion {
                        path: path_str.clone(),
                        field: "website".to_string(),
                        message: err.to_string(),
                    })?;
                shop.products = entry.products;
                shop.wikidata = entry.wikidata;
                shop.discount_indicators = entry
                    .discount_indicators
                    .into_iter()
                    .map(DiscountIndicator::new)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|err| ReaderError::TypeConversion {
                        path: path_str.clone(),
                        field: "discount_indicators".to_string(),
                        message: err.to_string(),
                    })?;
                Ok(shop)
            })
            .collect()
    }
}

/// Writes the shops shard back out as a list, only including optional
/// fields that are actually present.
pub struct ShopsWriter {
    path: PathBuf,
    shops: Vec<Shop>,
    updated: Option<DateTime<Utc>>,
}

impl ShopsWriter {
    pub fn new(path: impl Into<PathBuf>, shops: Vec<Shop>) -> Self {
        Self { path: path.into(), shops, updated: None }
    }
}

impl Writer<Shop> for ShopsWriter {
    fn path(&self) -> &Path {
        &self.path
    }

    fn updated(&self) -> Option<DateTime<Utc>> {
        self.updated
    }

    fn serialize(&self, sink: &mut dyn Write) -> WriterResult<()> {
        let entries: Vec<ShopEntry> = self
            .shops
            .iter()
            .map(|shop| ShopEntry {
                key: shop.key.clone(),
                name: shop.name.clone(),
                website: shop.website.as_ref().map(|u| u.to_string()),
                products: shop.products.clone(),
                wikidata: shop.wikidata.clone(),
                discount_indicators: shop.discount_indicators.iter().map(|d| d.pattern.clone()).collect(),
            })
            .collect();
        serde_yaml::to_writer(sink, &entries).map_err(|err| WriterError::Format {
            path: self.path.display().to_string(),
            source: FormatError::from(err),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ReceiptDocument {
    date: NaiveDate,
    shop: String,
    #[serde(default)]
    products: Vec<(String, String, Decimal, Option<String>)>,
    #[serde(default)]
    bonus: Vec<(String, Decimal)>,
}

/// Reads a single receipt file: a dated, shop-scoped ordered list of
/// items and a `bonus` list of discounts whose item links are resolved
/// by sequential label-matching against unclaimed items carrying a
/// discount indicator.
pub struct ReceiptReader {
    path: PathBuf,
}

impl ReceiptReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn filename(&self) -> String {
        self.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }
}

impl Reader<Receipt> for ReceiptReader {
    fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, source: &mut dyn BufRead) -> ReaderResult<Vec<Receipt>> {
        let path_str = self.path.display().to_string();
        let doc: ReceiptDocument = serde_yaml::from_reader(source).map_err(|err| ReaderError::Format {
            path: path_str.clone(),
            source: FormatError::from(err),
        })?;

        let mut receipt = Receipt::new(self.filename(), doc.date, doc.shop);
        for (position, (quantity, label, price, discount_indicator)) in doc.products.into_iter().enumerate() {
            let quantity = Quantity::parse(&quantity).map_err(|err| type_conversion(&path_str, "quantity", err))?;
            let mut item = ProductItem::new(quantity, label, Price::new(price), position);
            item.discount_indicator = discount_indicator;
            receipt.products.push(item);
        }

        // Sequential consumption: each bonus label claims the earliest
        // unclaimed item whose discount indicator is set and whose label
        // matches, mirroring the original's forward scan with a `seen`
        // high-water mark rather than a fresh full scan per bonus.
        let mut seen = 0usize;
        for (position, (label, price_decrease)) in doc.bonus.into_iter().enumerate() {
            let mut discount = Discount::new(label.clone(), Price::new(price_decrease), position);
            for (index, item) in receipt.products.iter().enumerate().skip(seen) {
                if item.discount_indicator.is_some() && item.label == label {
                    discount.item_positions.push(item.position);
                    seen = index + 1;
                    break;
                }
            }
            receipt.discounts.push(discount);
        }

        Ok(vec![receipt])
    }
}

/// Writes a single receipt file.
pub struct ReceiptWriter {
    path: PathBuf,
    receipt: Receipt,
    updated: Option<DateTime<Utc>>,
}

impl ReceiptWriter {
    pub fn new(path: impl Into<PathBuf>, receipt: Receipt) -> Self {
        Self { path: path.into(), receipt, updated: None }
    }
}

impl Writer<Receipt> for ReceiptWriter {
    fn path(&self) -> &Path {
        &self.path
    }

    fn updated(&self) -> Option<DateTime<Utc>> {
        self.updated
    }

    fn serialize(&self, sink: &mut dyn Write) -> WriterResult<()> {
        let products: Vec<(String, String, Decimal, Option<String>)> = self
            .receipt
            .products
            .iter()
            .map(|item| (item.quantity.to_string(), item.label.clone(), item.price.as_decimal(), item.discount_indicator.clone()))
            .collect();
        let bonus: Vec<(String, Decimal)> =
            self.receipt.discounts.iter().map(|d| (d.label.clone(), d.price_decrease.as_decimal())).collect();
        let doc = ReceiptDocument { date: self.receipt.date, shop: self.receipt.shop.clone(), products, bonus };
        serde_yaml::to_writer(sink, &SerializableReceipt::from(doc)).map_err(|err| WriterError::Format {
            path: self.path.display().to_string(),
            source: FormatError::from(err),
        })
    }
}

#[derive(Debug, Serialize)]
struct SerializableReceipt {
    date: NaiveDate,
    shop: String,
    products: Vec<(String, String, Decimal, Option<String>)>,
    bonus: Vec<(String, Decimal)>,
}

impl From<ReceiptDocument> for SerializableReceipt {
    fn from(doc: ReceiptDocument) -> Self {
        Self { date: doc.date, shop: doc.shop, products: doc.products, bonus: doc.bonus }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn products_round_trip_plain_prices() {
        let yaml = "shop: aldi\nproducts:\n  - labels: [bulk]\n    prices: [2.50]\n    bonuses: [disco]\n";
        let reader = ProductsReader::new("products-aldi.yml");
        let products = reader.parse(&mut yaml.as_bytes()).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].shop, "aldi");
        assert_eq!(products[0].prices[0].value.to_string(), "2.50");

        let mut sink = Vec::new();
        let writer = ProductsWriter::new("products-aldi.yml", products.clone());
        writer.serialize(&mut sink).unwrap();
        let reparsed = reader.parse(&mut sink.as_slice()).unwrap();
        assert_eq!(reparsed[0].labels, products[0].labels);
    }

    #[test]
    fn mixing_indicator_and_bare_prices_is_rejected_on_write() {
        let mut product = Product::new("aldi");
        product.prices.push(PriceMatcher::new(Decimal::new(100, 2), None::<String>));
        product.prices.push(PriceMatcher::new(Decimal::new(200, 2), Some("minimum")));
        let writer = ProductsWriter::new("products-aldi.yml", vec![product]);
        let mut sink = Vec::new();
        assert!(writer.serialize(&mut sink).is_err());
    }

    #[test]
    fn receipt_bonus_claims_earliest_unclaimed_matching_item() {
        let yaml = "date: 2024-11-01\nshop: aldi\nproducts:\n  - [\"2\", \"bulk\", 5.0, \"bonus\"]\n  - [\"1\", \"bulk\", 5.0, \"bonus\"]\nbonus:\n  - [\"bulk\", -2.0]\n";
        let reader = ReceiptReader::new("2024-11-01-aldi.yml");
        let receipts = reader.parse(&mut yaml.as_bytes()).unwrap();
        let receipt = &receipts[0];
        assert_eq!(receipt.discounts[0].item_positions, vec![0]);
        assert_eq!(receipt.total_price().to_string(), "8.00");
    }

    #[test]
    fn shops_top_level_is_a_list() {
        let yaml = "- key: aldi\n  name: Aldi\n";
        let reader = ShopsReader::new("shops.yml");
        let shops = reader.parse(&mut yaml.as_bytes()).unwrap();
        assert_eq!(shops[0].key, "aldi");
        assert_eq!(shops[0].name, Some("Aldi".to_string()));
    }
}
