//! In-memory reference `Store` implementation, `HashMap`-backed like the
//! source system's `repository/memory.rs`, sufficient to exercise every
//! inventory and matcher operation without a real schema or migrations.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

use crate::error::StoreResult;
use crate::models::{Product, Shop};
use crate::store::{ObservedField, ProductFilters, SessionGuard, Store};

#[derive(Debug, Default)]
pub struct MemoryStore {
    products: HashMap<i64, Product>,
    shops: HashMap<String, Shop>,
    next_id: i64,
    session_open: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn find_match(&self, product: &Product) -> Option<i64> {
        self.products.iter().find_map(|(id, existing)| {
            let sku_match = product.sku.is_some() && existing.sku == product.sku;
            let gtin_match = product.gtin.is_some() && existing.gtin == product.gtin;
            let identity_match =
                product.matcher_identity().is_some() && existing.matcher_identity() == product.matcher_identity();
            (sku_match || gtin_match || identity_match).then_some(*id)
        })
    }
}

impl Store for MemoryStore {
    fn open_session(&mut self) -> StoreResult<SessionGuard<'_>> {
        SessionGuard::acquire(&self.session_open)
    }

    fn find_products(&self, filters: &ProductFilters) -> StoreResult<Vec<Product>> {
        Ok(self
            .products
            .values()
            .filter(|p| filters.shop.as_ref().map_or(true, |shop| &p.shop == shop))
            .filter(|p| filters.sku.as_ref().map_or(true, |sku| p.sku.as_ref() == Some(sku)))
            .filter(|p| filters.gtin.map_or(true, |gtin| p.gtin.map(|g| g.value()) == Some(gtin)))
            .cloned()
            .collect())
    }

    fn find_shops(&self) -> StoreResult<Vec<Shop>> {
        Ok(self.shops.values().cloned().collect())
    }

    fn add_product(&mut self, mut product: Product) -> StoreResult<i64> {
        let id = self.allocate_id();
        product.id = Some(id);
        self.products.insert(id, product);
        Ok(id)
    }

    fn add_shop(&mut self, shop: Shop) -> StoreResult<()> {
        self.shops.insert(shop.key.clone(), shop);
        Ok(())
    }

    fn merge_product(&mut self, product: Product) -> StoreResult<i64> {
        match self.find_match(&product) {
            Some(id) => {
                let existing = self.products.get_mut(&id).expect("id came from this map");
                existing
                    .merge(&product, false)
                    .map_err(|err| crate::error::StoreError::Backend { message: err.to_string() })?;
                Ok(id)
            }
            None => self.add_product(product),
        }
    }

    fn delete_product(&mut self, id: i64) -> StoreResult<bool> {
        Ok(self.products.remove(&id).is_some())
    }

    fn flush(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn observed_values(&self, shop: &str, field: ObservedField) -> StoreResult<Vec<String>> {
        let mut values: Vec<String> = self
            .products
            .values()
            .filter(|p| p.shop == shop)
            .flat_map(|p| match field {
                ObservedField::Label => p.labels.iter().map(|l| l.0.clone()).collect::<Vec<_>>(),
                ObservedField::Price => p.prices.iter().map(|price| price.value.to_string()).collect(),
                ObservedField::Discount => p.discounts.iter().map(|d| d.0.clone()).collect(),
            })
            .collect();
        values.sort();
        values.dedup();
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Product;

    #[test]
    fn add_then_find_by_shop() {
        let mut store = MemoryStore::new();
        store.add_product(Product::new("aldi")).unwrap();
        store.add_product(Product::new("lidl")).unwrap();
        let found = store.find_products(&ProductFilters { shop: Some("aldi".into()), ..Default::default() }).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].shop, "aldi");
    }

    #[test]
    fn merge_product_unifies_by_sku() {
        let mut store = MemoryStore::new();
        let mut first = Product::new("aldi");
        first.sku = Some("sku-1".into());
        first.brand = Some("old".into());
        store.add_product(first).unwrap();

        let mut incoming = Product::new("aldi");
        incoming.sku = Some("sku-1".into());
        incoming.description = Some("new description".into());
        store.merge_product(incoming).unwrap();

        let found = store.find_products(&ProductFilters { sku: Some("sku-1".into()), ..Default::default() }).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].brand, Some("old".into()));
        assert_eq!(found[0].description, Some("new description".into()));
    }

    #[test]
    fn sessions_are_not_reentrant() {
        let mut store = MemoryStore::new();
        let session = store.open_session().unwrap();
        session.commit();
        let _second = store.open_session().unwrap();
    }

    #[test]
    fn observed_values_are_distinct_ordered_and_shop_scoped() {
        let mut store = MemoryStore::new();
        let mut bulk = Product::new("aldi");
        bulk.labels.push(crate::models::LabelMatcher::new("bulk"));
        let mut family = Product::new("aldi");
        family.labels.push(crate::models::LabelMatcher::new("family"));
        family.labels.push(crate::models::LabelMatcher::new("bulk"));
        let mut other_shop = Product::new("lidl");
        other_shop.labels.push(crate::models::LabelMatcher::new("zzz"));
        store.add_product(bulk).unwrap();
        store.add_product(family).unwrap();
        store.add_product(other_shop).unwrap();

        let labels = store.observed_values("aldi", ObservedField::Label).unwrap();
        assert_eq!(labels, vec!["bulk".to_string(), "family".to_string()]);
    }
}
