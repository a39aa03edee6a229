//! Matches receipt line items to product metadata.
//!
//! Grounded on the original matcher's shop/label/price/discount gate and
//! its specificity-ranked duplicate resolution between a generic product
//! and its range members. The original resolves a generic-vs-generic tie
//! by returning the shared parent object, reached by walking the ORM
//! relationship; this crate's [`crate::models::Product`] owns its range
//! as a flat `Vec` with a `generic_id` back-reference rather than a
//! bidirectional object graph (see the inventory engine's design notes),
//! so two range siblings of the *same* generic that both tie can't be
//! resolved to "the generic" from the pair alone. That case is treated
//! as ambiguous and dropped, a deliberate narrowing of the original rule.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;

use crate::error::CatalogResult;
use crate::models::{Product, ProductItem};
use crate::matcher::Matcher;
use crate::store::{ProductFilters, Store};
use crate::types::Unit;

/// Which uniqueness-index keys are active for a given [`ProductMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapKeyKind {
    Match,
    Sku,
    Gtin,
}

const ALL_MAP_KEYS: [MapKeyKind; 3] = [MapKeyKind::Match, MapKeyKind::Sku, MapKeyKind::Gtin];

/// A uniqueness-index key. `Match` carries the product's full matcher
/// identity (shop, sorted labels, sorted prices, sorted discounts); `Sku`
/// and `Gtin` carry the shop alongside the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Match(String, Vec<String>, Vec<(Option<String>, Decimal)>, Vec<String>),
    Sku(String, String),
    Gtin(String, i64),
}

/// The context a receipt line item is matched within: the fields the
/// original reaches through an ORM relationship (the owning receipt's
/// shop and date, and the bonus labels already linked to this item).
#[derive(Debug, Clone)]
pub struct MatchItem<'a> {
    pub item: &'a ProductItem,
    pub shop: &'a str,
    pub year: i32,
    pub discount_labels: &'a [String],
}

impl PartialEq for MatchItem<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.item, other.item)
    }
}

pub struct ProductMatcher {
    /// Whether discount matching is in effect; disabling it treats every
    /// candidate's discount matchers as automatically satisfied.
    pub discounts: bool,
    map_keys: HashSet<MapKeyKind>,
    map: Option<HashMap<IndexKey, Product>>,
}

impl Default for ProductMatcher {
    fn default() -> Self {
        Self { discounts: true, map_keys: ALL_MAP_KEYS.into_iter().collect(), map: None }
    }
}

impl ProductMatcher {
    pub fn new(map_keys: impl IntoIterator<Item = MapKeyKind>) -> Self {
        Self { discounts: true, map_keys: map_keys.into_iter().collect(), map: None }
    }

    /// Matchers present, and how many individual fields they span: more
    /// matcher families wins; a tie prefers fewer individual fields.
    fn specificity(&self, product: &Product) -> (usize, i64) {
        let mut families = (!product.labels.is_empty()) as usize + (!product.prices.is_empty()) as usize;
        let mut fields = product.labels.len() as i64 + product.prices.len() as i64;
        if self.discounts {
            families += (!product.discounts.is_empty()) as usize;
            fields += product.discounts.len() as i64;
        }
        (families, -fields)
    }

    fn select_generic<'a>(&self, generic: &'a Product, sub_range: &'a Product) -> &'a Product {
        if self.specificity(generic) >= self.specificity(sub_range) {
            generic
        } else {
            sub_range
        }
    }

    fn match_price(&self, price: &crate::models::PriceMatcher, ctx: &MatchItem<'_>) -> CatalogResult<i32> {
        use crate::models::PriceIndicatorKind;

        // Only a unit-named indicator needs item.quantity's unit; every
        // other indicator kind works off the plain numeric amount
        // regardless of whether the item itself carries a unit.
        if let PriceIndicatorKind::Unit(indicator) = price.kind() {
            if let Some(item_unit) = ctx.item.unit() {
                if let Ok(indicator_unit) = Unit::parse(&indicator) {
                    if indicator_unit.signature() == item_unit.signature() {
                        let item_amount_in_indicator_units =
                            ctx.item.amount() * item_unit.base_factor() / indicator_unit.base_factor();
                        let computed = price.value * item_amount_in_indicator_units;
                        if computed == ctx.item.price.as_decimal() {
                            return Ok(2);
                        }
                    }
                }
            }
            return Ok(0);
        }

        let match_price = price.value * ctx.item.amount();
        let item_price = ctx.item.price.as_decimal();
        match price.kind() {
            PriceIndicatorKind::Minimum if match_price <= item_price => Ok(1),
            PriceIndicatorKind::Maximum if match_price >= item_price => Ok(1),
            PriceIndicatorKind::None if match_price == item_price => Ok(2),
            PriceIndicatorKind::Year(year) if year == ctx.year && match_price == item_price => Ok(2),
            _ => Ok(0),
        }
    }

    fn get_product_match(&self, product: &Product) -> Option<IndexKey> {
        if product.labels.is_empty() && product.prices.is_empty() && product.discounts.is_empty() {
            return None;
        }
        let mut labels: Vec<String> = product.labels.iter().map(|l| l.0.clone()).collect();
        labels.sort();
        let mut prices: Vec<(Option<String>, Decimal)> =
            product.prices.iter().map(|p| (p.indicator.clone(), p.value)).collect();
        prices.sort();
        let mut discounts: Vec<String> = product.discounts.iter().map(|d| d.0.clone()).collect();
        discounts.sort();
        Some(IndexKey::Match(product.shop.clone(), labels, prices, discounts))
    }
}

impl<'a> Matcher<MatchItem<'a>, Product, IndexKey> for ProductMatcher {
    fn is_match(&self, candidate: &Product, ctx: &MatchItem<'a>) -> CatalogResult<bool> {
        if candidate.shop != ctx.shop
            || (candidate.labels.is_empty() && candidate.prices.is_empty() && candidate.discounts.is_empty())
        {
            return Ok(false);
        }

        if !candidate.labels.is_empty() {
            let mut any_label_matches = false;
            for label in &candidate.labels {
                if label.matches(&ctx.item.label)? {
                    any_label_matches = true;
                    break;
                }
            }
            if !any_label_matches {
                return Ok(false);
            }
        }

        let mut seen_price = 0;
        for price in &candidate.prices {
            seen_price += self.match_price(price, ctx)?;
        }
        if !candidate.prices.is_empty() && seen_price < 2 {
            return Ok(false);
        }

        let discount_context_active = self.discounts || !ctx.discount_labels.is_empty();
        if candidate.discounts.is_empty() || !discount_context_active {
            return Ok(true);
        }
        for discount in &candidate.discounts {
            for label in ctx.discount_labels {
                if discount.matches(label)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn get_keys(&self, candidate: &Product) -> Vec<IndexKey> {
        let mut keys = Vec::new();
        if self.map_keys.contains(&MapKeyKind::Match) {
            if let Some(key) = self.get_product_match(candidate) {
                keys.push(key);
            }
        }
        if self.map_keys.contains(&MapKeyKind::Sku) {
            if let Some(sku) = &candidate.sku {
                keys.push(IndexKey::Sku(candidate.shop.clone(), sku.clone()));
            }
        }
        if self.map_keys.contains(&MapKeyKind::Gtin) {
            if let Some(gtin) = candidate.gtin {
                keys.push(IndexKey::Gtin(candidate.shop.clone(), gtin.value()));
            }
        }
        keys
    }

    fn select_candidates(&self, all: &[Product], exclude: &[Product]) -> Vec<Product> {
        let mut result: Vec<Product> = all.iter().filter(|c| !exclude.contains(c)).cloned().collect();
        result.sort_by_key(|p| (p.generic_id, p.id));
        result
    }

    fn select_duplicate(&self, candidate: &Product, duplicate: Option<&Product>) -> Option<Product> {
        if let Some(duplicate) = duplicate {
            if candidate.id.is_some() && candidate.id == duplicate.id {
                return Some(candidate.clone());
            }
            if candidate.generic_id.is_some() && candidate.generic_id == duplicate.id {
                return Some(self.select_generic(duplicate, candidate).clone());
            }
            if duplicate.generic_id.is_some() && duplicate.generic_id == candidate.id {
                return Some(self.select_generic(candidate, duplicate).clone());
            }
            // Two siblings under the same generic: the original returns the
            // shared parent object here. This crate has no reachable parent
            // from a flat range member, so the tie is ambiguous instead.
        }
        match duplicate {
            Some(d) if d == candidate => Some(candidate.clone()),
            _ => None,
        }
    }

    fn map(&self) -> Option<&HashMap<IndexKey, Product>> {
        self.map.as_ref()
    }

    fn map_mut(&mut self) -> &mut Option<HashMap<IndexKey, Product>> {
        &mut self.map
    }

    fn add_map(&mut self, candidate: Product) -> bool {
        let keys = self.get_keys(&candidate);
        let mut added = if keys.is_empty() {
            false
        } else {
            match self.map.as_mut() {
                None => false,
                Some(map) => {
                    if keys.iter().any(|key| map.contains_key(key)) {
                        false
                    } else {
                        for key in keys {
                            map.insert(key, candidate.clone());
                        }
                        true
                    }
                }
            }
        };
        for member in &candidate.range {
            added = self.add_map(member.clone()) || added;
        }
        added
    }

    fn discard_map(&mut self, candidate: &Product) -> bool {
        let keys = self.get_keys(candidate);
        let mut removed = match self.map.as_mut() {
            None => false,
            Some(map) => {
                let mut removed_any = false;
                for key in keys {
                    if map.remove(&key).is_some() {
                        removed_any = true;
                    }
                }
                removed_any
            }
        };
        for member in &candidate.range {
            removed = self.discard_map(member) || removed;
        }
        removed
    }

    /// `check_map` of a generic with no direct matchers of its own falls
    /// back to checking its range members' keys; a hit there still
    /// reports the generic as the duplicate, not the range member.
    fn check_map(&self, candidate: &Product) -> Option<Product> {
        let map = self.map.as_ref()?;
        if let Some(hit) = self.get_keys(candidate).into_iter().find_map(|key| map.get(&key).cloned()) {
            return Some(hit);
        }
        if candidate.is_generic() {
            for member in &candidate.range {
                if <Self as Matcher<MatchItem<'_>, Product, IndexKey>>::check_map(self, member).is_some() {
                    return Some(candidate.clone());
                }
            }
        }
        None
    }
}

impl ProductMatcher {
    /// Enumerate candidate `(product, item)` pairs matching `items` plus
    /// any in-flight `extra` products (and their range members), and any
    /// generic/range candidates already fetched from `store`.
    ///
    /// Mirrors the original's two paths: items with no id yet (freshly
    /// parsed, unflushed) or explicitly passed as dirty fall back to
    /// enumerating every stored candidate in memory; fully flushed items
    /// go through a candidate query against the store. The original's
    /// query path is a single multi-join SQL statement this crate doesn't
    /// reproduce; here it is a store query filtered by shop, logged the
    /// same way, with the per-item gate still evaluated in Rust.
    pub fn find_candidates(
        &self,
        store: &dyn Store,
        items: &[MatchItem<'_>],
        extra: &[Product],
        only_unmatched: bool,
    ) -> CatalogResult<Vec<(Product, ProductItem)>> {
        let any_dirty = items.iter().any(|ctx| ctx.item.id.is_none());
        if any_dirty {
            return self.find_dirty_candidates(store, items, extra, only_unmatched);
        }
        self.find_flushed_candidates(store, items, extra, only_unmatched)
    }

    fn propose<'a>(
        &self,
        product: &Product,
        ctx: &MatchItem<'a>,
    ) -> CatalogResult<Option<(Product, ProductItem)>> {
        if <Self as Matcher<MatchItem<'a>, Product, IndexKey>>::is_match(self, product, ctx)? {
            Ok(Some((product.clone(), ctx.item.clone())))
        } else {
            Ok(None)
        }
    }

    fn propose_extra<'a>(
        &self,
        ctx: &MatchItem<'a>,
        extra: &[Product],
        out: &mut Vec<(Product, ProductItem)>,
    ) -> CatalogResult<()> {
        for product in extra {
            if let Some(pair) = self.propose(product, ctx)? {
                out.push(pair);
            }
            for range_member in &product.range {
                if let Some(pair) = self.propose(range_member, ctx)? {
                    out.push(pair);
                }
            }
        }
        Ok(())
    }

    fn find_dirty_candidates<'a>(
        &self,
        store: &dyn Store,
        items: &[MatchItem<'a>],
        extra: &[Product],
        only_unmatched: bool,
    ) -> CatalogResult<Vec<(Product, ProductItem)>> {
        let mut out = Vec::new();
        for ctx in items {
            if only_unmatched && ctx.item.product_id.is_some() {
                continue;
            }
            let filters = ProductFilters { shop: Some(ctx.shop.to_string()), ..Default::default() };
            let stored = store
                .find_products(&filters)
                .map_err(|err| crate::error::CatalogError::validation(err.to_string()))?;
            let candidates = <Self as Matcher<MatchItem<'a>, Product, IndexKey>>::select_candidates(
                self, &stored, extra,
            );
            for product in &candidates {
                if let Some(pair) = self.propose(product, ctx)? {
                    out.push(pair);
                }
            }
            self.propose_extra(ctx, extra, &mut out)?;
        }
        Ok(out)
    }

    fn find_flushed_candidates<'a>(
        &self,
        store: &dyn Store,
        items: &[MatchItem<'a>],
        extra: &[Product],
        only_unmatched: bool,
    ) -> CatalogResult<Vec<(Product, ProductItem)>> {
        let shops: HashSet<&str> = items.iter().map(|ctx| ctx.shop).collect();
        let extra_ids: HashSet<i64> = extra.iter().filter_map(|p| p.id).collect();

        let mut out = Vec::new();
        let mut proposed_extra_for: HashSet<i64> = HashSet::new();

        for shop in shops {
            let filters = ProductFilters { shop: Some(shop.to_string()), ..Default::default() };
            tracing::debug!(shop, "candidate query: products where shop = ? and id not in (extra)");
            let stored = store
                .find_products(&filters)
                .map_err(|err| crate::error::CatalogError::validation(err.to_string()))?;

            for ctx in items.iter().filter(|ctx| ctx.shop == shop) {
                if only_unmatched && ctx.item.product_id.is_some() {
                    continue;
                }
                for product in &stored {
                    if product.id.is_some_and(|id| extra_ids.contains(&id)) {
                        continue;
                    }
                    if let Some(pair) = self.propose(product, ctx)? {
                        out.push(pair);
                    }
                }
                if let Some(id) = ctx.item.id {
                    if proposed_extra_for.insert(id) {
                        self.propose_extra(ctx, extra, &mut out)?;
                    }
                } else {
                    self.propose_extra(ctx, extra, &mut out)?;
                }
            }
        }
        out.sort_by_key(|(product, item)| (item.id, product.generic_id, product.id));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiscountMatcher, LabelMatcher, PriceMatcher};
    use crate::types::{Price, Quantity};
    use std::str::FromStr;

    fn item(label: &str, price: &str, quantity: &str) -> ProductItem {
        ProductItem::new(Quantity::parse(quantity).unwrap(), label, Price::from_str(price).unwrap(), 0)
    }

    #[test]
    fn rejects_candidate_from_different_shop() {
        let matcher = ProductMatcher::default();
        let mut candidate = Product::new("lidl");
        candidate.labels.push(LabelMatcher::new("bulk"));
        let it = item("bulk", "1.00", "1");
        let ctx = MatchItem { item: &it, shop: "aldi", year: 2024, discount_labels: &[] };
        assert!(!matcher.is_match(&candidate, &ctx).unwrap());
    }

    #[test]
    fn matches_on_label_and_exact_price() {
        let matcher = ProductMatcher::default();
        let mut candidate = Product::new("aldi");
        candidate.labels.push(LabelMatcher::new("bulk"));
        candidate.prices.push(PriceMatcher::new(rust_decimal_macros::dec!(1.00), None::<String>));
        let it = item("bulk", "2.00", "2");
        let ctx = MatchItem { item: &it, shop: "aldi", year: 2024, discount_labels: &[] };
        assert!(matcher.is_match(&candidate, &ctx).unwrap());
    }

    #[test]
    fn rejects_mismatched_label() {
        let matcher = ProductMatcher::default();
        let mut candidate = Product::new("aldi");
        candidate.labels.push(LabelMatcher::new("bulk"));
        let it = item("other", "1.00", "1");
        let ctx = MatchItem { item: &it, shop: "aldi", year: 2024, discount_labels: &[] };
        assert!(!matcher.is_match(&candidate, &ctx).unwrap());
    }

    #[test]
    fn discount_gate_requires_matching_bonus_label() {
        let matcher = ProductMatcher::default();
        let mut candidate = Product::new("aldi");
        candidate.labels.push(LabelMatcher::new("bulk"));
        candidate.discounts.push(DiscountMatcher::new("loyalty"));
        let it = item("bulk", "1.00", "1");
        let ctx_no_discount =
            MatchItem { item: &it, shop: "aldi", year: 2024, discount_labels: &["other".to_string()] };
        assert!(!matcher.is_match(&candidate, &ctx_no_discount).unwrap());
        let ctx_matching =
            MatchItem { item: &it, shop: "aldi", year: 2024, discount_labels: &["loyalty".to_string()] };
        assert!(matcher.is_match(&candidate, &ctx_matching).unwrap());
    }

    #[test]
    fn select_duplicate_prefers_more_specific_generic_or_range_member() {
        let matcher = ProductMatcher::default();
        let mut generic = Product::new("aldi");
        generic.id = Some(1);
        generic.labels.push(LabelMatcher::new("bulk"));

        let mut member = Product::new("aldi");
        member.id = Some(2);
        member.generic_id = Some(1);
        member.labels.push(LabelMatcher::new("bulk"));
        member.prices.push(PriceMatcher::new(rust_decimal_macros::dec!(1.00), None::<String>));

        let resolved = matcher.select_duplicate(&member, Some(&generic)).unwrap();
        assert_eq!(resolved.id, Some(2));
    }

    #[test]
    fn select_duplicate_is_ambiguous_for_unrelated_candidates() {
        let matcher = ProductMatcher::default();
        let mut a = Product::new("aldi");
        a.id = Some(1);
        let mut b = Product::new("aldi");
        b.id = Some(2);
        assert!(matcher.select_duplicate(&a, Some(&b)).is_none());
    }

    #[test]
    fn get_keys_includes_sku_and_gtin_when_present() {
        let matcher = ProductMatcher::default();
        let mut product = Product::new("aldi");
        product.sku = Some("sku-1".into());
        product.gtin = Some(crate::types::Gtin::new(123));
        let keys = matcher.get_keys(&product);
        assert!(keys.contains(&IndexKey::Sku("aldi".into(), "sku-1".into())));
        assert!(keys.contains(&IndexKey::Gtin("aldi".into(), 123)));
    }

    #[test]
    fn add_map_then_check_map_recurses_into_range_members() {
        let mut matcher = ProductMatcher::default();
        matcher.clear_map();
        let mut member = Product::new("aldi");
        member.sku = Some("member-sku".into());
        let mut generic = Product::new("aldi");
        generic.sku = Some("generic-sku".into());
        generic.range.push(member.clone());

        matcher.add_map(generic);
        assert!(matcher.check_map(&member).is_some());
    }
}
