//! Product metadata: the canonical record a receipt's line items are
//! matched against.
//!
//! Matcher families are modeled as a closed tagged variant per family
//! (label/price/discount) rather than the three-subclasses-discovered-
//! by-name scheme of the system this crate descends from: one closed
//! match expression per operation (match, merge-key, serialize-key)
//! instead of registration machinery.

use chrono::Datelike;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};
use crate::types::{Gtin, Quantity};

fn looks_like_pattern(value: &str) -> bool {
    value.starts_with('^') || value.contains(['*', '+', '[', '(', '\\'])
}

/// A label matcher: a literal string, or (if it looks like a regular
/// expression) a pattern matched against `item.label`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMatcher(pub String);

impl LabelMatcher {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_pattern(&self) -> bool {
        looks_like_pattern(&self.0)
    }

    pub fn matches(&self, label: &str) -> CatalogResult<bool> {
        if self.is_pattern() {
            let re = Regex::new(&self.0)
                .map_err(|err| CatalogError::validation(format!("invalid label pattern '{}': {err}", self.0)))?;
            Ok(re.is_match(label))
        } else {
            Ok(self.0 == label)
        }
    }
}

/// A discount matcher: a literal string, or pattern, matched against a
/// receipt-level discount's label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscountMatcher(pub String);

impl DiscountMatcher {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_pattern(&self) -> bool {
        looks_like_pattern(&self.0)
    }

    pub fn matches(&self, label: &str) -> CatalogResult<bool> {
        if self.is_pattern() {
            let re = Regex::new(&self.0)
                .map_err(|err| CatalogError::validation(format!("invalid discount pattern '{}': {err}", self.0)))?;
            Ok(re.is_match(label))
        } else {
            Ok(self.0 == label)
        }
    }
}

/// Classification of a price matcher's loose `indicator` string, computed
/// on demand rather than stored, so the wire representation stays a plain
/// optional string (`None`, `"minimum"`, `"maximum"`, a 4-digit year, or a
/// unit name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceIndicatorKind {
    None,
    Minimum,
    Maximum,
    Year(i32),
    Unit(String),
}

/// A price matcher: `(value, indicator?)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PriceMatcher {
    pub value: Decimal,
    pub indicator: Option<String>,
}

impl PriceMatcher {
    pub fn new(value: Decimal, indicator: Option<impl Into<String>>) -> Self {
        Self { value, indicator: indicator.map(Into::into) }
    }

    pub fn kind(&self) -> PriceIndicatorKind {
        match self.indicator.as_deref() {
            None => PriceIndicatorKind::None,
            Some("minimum") => PriceIndicatorKind::Minimum,
            Some("maximum") => PriceIndicatorKind::Maximum,
            Some(s) if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) => {
                PriceIndicatorKind::Year(s.parse().expect("validated 4 ascii digits"))
            }
            Some(s) => PriceIndicatorKind::Unit(s.to_string()),
        }
    }

    /// Merge key used when unioning a product's price matcher list: the
    /// indicator alone, with `None` treated as distinct from any named
    /// indicator.
    fn merge_key(&self) -> Option<&str> {
        self.indicator.as_deref()
    }
}

/// Product metadata, shop-scoped, optionally owning a range of
/// sub-products (see [`Product::range`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Option<i64>,
    pub shop: String,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub portions: Option<i32>,
    pub weight: Option<Quantity>,
    pub volume: Option<Quantity>,
    pub alcohol: Option<Decimal>,
    pub sku: Option<String>,
    pub gtin: Option<Gtin>,
    #[serde(default)]
    pub labels: Vec<LabelMatcher>,
    #[serde(default)]
    pub prices: Vec<PriceMatcher>,
    #[serde(default)]
    pub discounts: Vec<DiscountMatcher>,
    /// Back-reference to the generic this product is a range member of,
    /// if any. Range depth is exactly one: a product with `generic_id`
    /// set never itself carries a non-empty `range`.
    pub generic_id: Option<i64>,
    /// Sub-products owned by this (generic) product. Empty for range
    /// members and for products with no range.
    #[serde(default)]
    pub range: Vec<Product>,
}

impl Product {
    pub fn new(shop: impl Into<String>) -> Self {
        Self {
            id: None,
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
            generic_id: None,
            range: Vec::new(),
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.range.is_empty()
    }

    /// True iff any label or discount matcher is a regular expression
    /// rather than a literal. Used by callers deciding whether literal-
    /// equality shortcuts apply.
    pub fn has_patterns(&self) -> bool {
        self.labels.iter().any(LabelMatcher::is_pattern) || self.discounts.iter().any(DiscountMatcher::is_pattern)
    }

    /// The matcher-identity tuple used by the uniqueness index: present
    /// only when at least one matcher is populated.
    pub fn matcher_identity(&self) -> Option<(String, Vec<LabelMatcher>, Vec<PriceMatcher>, Vec<DiscountMatcher>)> {
        if self.labels.is_empty() && self.prices.is_empty() && self.discounts.is_empty() {
            return None;
        }
        let mut labels = self.labels.clone();
        labels.sort();
        let mut prices = self.prices.clone();
        prices.sort();
        let mut discounts = self.discounts.clone();
        discounts.sort();
        Some((self.shop.clone(), labels, prices, discounts))
    }

    /// Reset every attribute except identity (`id`) and `shop`. Range
    /// members are untouched; clearing a generic does not recursively
    /// clear its range.
    pub fn clear(&mut self) {
        self.brand = None;
        self.description = None;
        self.category = None;
        self.kind = None;
        self.portions = None;
        self.weight = None;
        self.volume = None;
        self.alcohol = None;
        self.sku = None;
        self.gtin = None;
        self.labels.clear();
        self.prices.clear();
        self.discounts.clear();
    }

    /// Clear, then merge `other` into self with `override` forced true.
    pub fn replace(&mut self, other: &Product) -> CatalogResult<bool> {
        self.clear();
        self.merge(other, true)
    }

    /// A detached duplicate, suitable for the merge-idempotence check
    /// `product.copy().merge(product) == false`.
    pub fn copy(&self) -> Product {
        self.clone()
    }

    /// Validate that `other` may be merged into self, without mutating
    /// either side. Currently the only cross-entity invariant enforced
    /// here is that shop keys must match.
    pub fn check_merge(&self, other: &Product) -> CatalogResult<()> {
        if self.shop != other.shop {
            return Err(CatalogError::validation(format!(
                "cannot merge product from shop '{}' into product from shop '{}'",
                other.shop, self.shop
            )));
        }
        Ok(())
    }

    /// Merge `other` into `self`. Returns true iff anything changed.
    /// With `override_`, any non-null field on `other` overwrites self's;
    /// without it, fields are only filled where self is currently null.
    pub fn merge(&mut self, other: &Product, override_: bool) -> CatalogResult<bool> {
        self.check_merge(other)?;

        let mut changed = false;

        if self.id.is_none() && other.id.is_some() {
            self.id = other.id;
            changed = true;
        }

        macro_rules! merge_field {
            ($field:ident) => {
                if let Some(value) = &other.$field {
                    if override_ || self.$field.is_none() {
                        if self.$field.as_ref() != Some(value) {
                            self.$field = Some(value.clone());
                            changed = true;
                        }
                    }
                }
            };
        }

        merge_field!(brand);
        merge_field!(description);
        merge_field!(category);
        merge_field!(kind);
        merge_field!(portions);
        merge_field!(weight);
        merge_field!(volume);
        merge_field!(alcohol);
        merge_field!(sku);
        merge_field!(gtin);

        if self.merge_labels(&other.labels) {
            changed = true;
        }
        if self.merge_prices(&other.prices)? {
            changed = true;
        }
        if self.merge_discounts(&other.discounts) {
            changed = true;
        }
        if self.merge_range(&other.range)? {
            changed = true;
        }

        Ok(changed)
    }

    fn merge_labels(&mut self, incoming: &[LabelMatcher]) -> bool {
        let mut changed = false;
        for label in incoming {
            if !self.labels.contains(label) {
                self.labels.push(label.clone());
                changed = true;
            }
        }
        changed
    }

    fn merge_discounts(&mut self, incoming: &[DiscountMatcher]) -> bool {
        let mut changed = false;
        for discount in incoming {
            if !self.discounts.contains(discount) {
                self.discounts.push(discount.clone());
                changed = true;
            }
        }
        changed
    }

    /// Run the same one-bare-price-only and year/band validation
    /// [`Product::merge`] applies, for a builder assembling a product's
    /// price matchers from scratch rather than merging into an existing
    /// one.
    pub(crate) fn merge_prices_for_build(&mut self, prices: &[PriceMatcher]) -> CatalogResult<bool> {
        self.merge_prices(prices)
    }

    fn merge_prices(&mut self, incoming: &[PriceMatcher]) -> CatalogResult<bool> {
        let mut changed = false;
        for price in incoming {
            if price.merge_key().is_none() {
                // A price without an indicator is only admitted if no
                // indicator-bearing price exists yet.
                let has_indicator_bearing = self.prices.iter().any(|p| p.merge_key().is_some());
                let has_bare_already = self.prices.iter().any(|p| p.merge_key().is_none());
                if has_indicator_bearing || has_bare_already {
                    continue;
                }
            } else if self.prices.iter().any(|p| p.merge_key() == price.merge_key()) {
                continue;
            }
            self.validate_price_matcher(price)?;
            self.prices.push(price.clone());
            changed = true;
        }
        self.validate_price_band()?;
        Ok(changed)
    }

    fn validate_price_matcher(&self, price: &PriceMatcher) -> CatalogResult<()> {
        if let PriceIndicatorKind::Year(year) = price.kind() {
            let current_year = chrono::Utc::now().year();
            if year > current_year {
                return Err(CatalogError::validation(format!(
                    "price matcher year {year} is later than the current year {current_year}"
                )));
            }
        }
        Ok(())
    }

    fn validate_price_band(&self) -> CatalogResult<()> {
        let minimum = self.prices.iter().find(|p| matches!(p.kind(), PriceIndicatorKind::Minimum));
        let maximum = self.prices.iter().find(|p| matches!(p.kind(), PriceIndicatorKind::Maximum));
        if let (Some(min), Some(max)) = (minimum, maximum) {
            if min.value > max.value {
                return Err(CatalogError::validation(format!(
                    "price band minimum {} exceeds maximum {}",
                    min.value, max.value
                )));
            }
        }
        Ok(())
    }

    fn merge_range(&mut self, incoming: &[Product]) -> CatalogResult<bool> {
        let mut changed = false;
        for member in incoming {
            let existing = self.range.iter_mut().find(|candidate| {
                (candidate.sku.is_some() && candidate.sku == member.sku)
                    || (candidate.gtin.is_some() && candidate.gtin == member.gtin)
                    || (candidate.matcher_identity().is_some()
                        && candidate.matcher_identity() == member.matcher_identity())
            });
            match existing {
                Some(existing) => {
                    if existing.merge(member, false)? {
                        changed = true;
                    }
                }
                None => {
                    self.range.push(member.clone());
                    changed = true;
                }
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(shop: &str) -> Product {
        Product::new(shop)
    }

    #[test]
    fn copy_then_merge_self_is_idempotent() {
        let mut p = product("aldi");
        p.labels.push(LabelMatcher::new("bulk"));
        p.sku = Some("sku-1".into());
        let copy = p.copy();
        let mut copy = copy;
        assert!(!copy.merge(&p, true).unwrap());
    }

    #[test]
    fn check_merge_rejects_mismatched_shop() {
        let a = product("aldi");
        let b = product("lidl");
        let err = a.check_merge(&b).unwrap_err();
        assert!(err.to_string().contains("shop"));
    }

    #[test]
    fn merge_and_check_merge_agree_on_failure() {
        let mut a = product("aldi");
        let b = product("lidl");
        assert!(a.check_merge(&b).is_err());
        assert!(a.merge(&b, true).is_err());
    }

    #[test]
    fn merge_takes_id_without_changing_shop() {
        let mut a = product("aldi");
        let mut b = product("aldi");
        b.id = Some(42);
        assert!(a.merge(&b, true).unwrap());
        assert_eq!(a.id, Some(42));
        assert_eq!(a.shop, "aldi");
    }

    #[test]
    fn merge_labels_preserves_incoming_order_and_skips_duplicates() {
        let mut a = product("aldi");
        a.labels.push(LabelMatcher::new("bulk"));
        let mut b = product("aldi");
        b.labels.push(LabelMatcher::new("bulk"));
        b.labels.push(LabelMatcher::new("family"));
        assert!(a.merge(&b, true).unwrap());
        assert_eq!(a.labels, vec![LabelMatcher::new("bulk"), LabelMatcher::new("family")]);
    }

    #[test]
    fn merge_prices_allows_one_bare_price_only_without_indicator_bearing() {
        let mut a = product("aldi");
        let mut b = product("aldi");
        b.prices.push(PriceMatcher::new(dec!(0.48), None::<String>));
        assert!(a.merge(&b, true).unwrap());
        assert_eq!(a.prices.len(), 1);

        let mut c = product("aldi");
        c.prices.push(PriceMatcher::new(dec!(0.60), None::<String>));
        assert!(!a.merge(&c, true).unwrap());
        assert_eq!(a.prices.len(), 1);
    }

    #[test]
    fn merge_rejects_future_year_indicator() {
        let mut a = product("aldi");
        let mut b = product("aldi");
        b.prices.push(PriceMatcher::new(dec!(1.00), Some("2999")));
        assert!(a.merge(&b, true).is_err());
    }

    #[test]
    fn merge_without_override_only_fills_null_fields() {
        let mut a = product("aldi");
        a.brand = Some("existing".into());
        let mut b = product("aldi");
        b.brand = Some("incoming".into());
        b.description = Some("desc".into());
        assert!(a.merge(&b, false).unwrap());
        assert_eq!(a.brand, Some("existing".into()));
        assert_eq!(a.description, Some("desc".into()));
    }

    #[test]
    fn has_patterns_detects_regex_looking_labels() {
        let mut p = product("aldi");
        assert!(!p.has_patterns());
        p.labels.push(LabelMatcher::new("^bulk-.*"));
        assert!(p.has_patterns());
    }

    #[test]
    fn replace_clears_then_merges_with_override() {
        let mut a = product("aldi");
        a.brand = Some("old".into());
        a.labels.push(LabelMatcher::new("old-label"));
        let mut b = product("aldi");
        b.brand = Some("new".into());
        assert!(a.replace(&b).unwrap());
        assert_eq!(a.brand, Some("new".into()));
        assert!(a.labels.is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arbitrary_product() -> impl Strategy<Value = Product> {
        (
            proptest::option::of("[a-z]{2,8}"),
            proptest::option::of("[a-z]{2,8}"),
            prop::collection::vec("[a-z]{2,6}", 0..3),
        )
            .prop_map(|(brand, sku, label_strings)| {
                let mut p = Product::new("aldi");
                p.brand = brand;
                p.sku = sku;
                p.labels = label_strings.into_iter().map(LabelMatcher::new).collect();
                p
            })
    }

    proptest! {
        /// `p.copy().merge(p) == false`.
        #[test]
        fn copy_then_merge_self_is_always_idempotent(p in arbitrary_product()) {
            let mut copy = p.copy();
            prop_assert!(!copy.merge(&p, true).unwrap());
        }
    }
}
