//! Inventory Engine: groups entities by file shard, materializes a shard
//! from store or disk, and reconciles three-way between an incoming and
//! a baseline inventory.

pub mod products;
pub mod shops;

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{CatalogResult, WriterResult};
use crate::store::Store;

/// A shard selector: the ordered values of a filename template's field
/// placeholders for a given entity. The degenerate (zero-field template)
/// case yields an empty tuple, which is what collapses every entity into
/// a single shard.
pub type Selector = Vec<String>;

/// Shared shard-grouping and three-way-merge machinery, parameterized by
/// how a concrete inventory (`products`, `shops`) derives a shard
/// selector from an entity and reads/writes that entity's shard file.
pub trait Inventory<T: Clone> {
    /// The filename template this inventory shards by, e.g.
    /// `"products-{shop}.yml"`.
    fn template(&self) -> &str;

    /// The selector tuple for one entity: the values of the fields the
    /// template references, in the template's field order.
    fn selector_of(&self, model: &T) -> Selector;

    /// Resolve a selector to its absolute shard path.
    fn path_for(&self, selector: &Selector) -> PathBuf;

    /// The identity key used to detect "this incoming entity already
    /// exists" during merge (sku, gtin, or matcher-identity, see
    /// `matcher::product`). Two entities with no identity in common are
    /// always treated as distinct (the incoming one is new).
    fn identity_matches(&self, existing: &T, incoming: &T) -> bool;

    /// Merge `incoming` into `existing`, returning true iff anything
    /// changed.
    fn merge_entity(&self, existing: &mut T, incoming: &T, override_: bool) -> CatalogResult<bool>;

    /// Read every shard file matching this inventory's template glob
    /// under `root`. A file that fails to parse is logged at `warn!` and
    /// skipped; it never aborts the read.
    fn read(&self, root: &std::path::Path) -> HashMap<PathBuf, Vec<T>>;

    /// Persist every shard in `shards` via this inventory's writer.
    fn write(&self, shards: &HashMap<PathBuf, Vec<T>>) -> WriterResult<()>;

    /// Group a flat collection of models by shard key.
    fn spread(&self, models: Vec<T>) -> HashMap<PathBuf, Vec<T>> {
        let mut shards: HashMap<PathBuf, Vec<T>> = HashMap::new();
        for model in models {
            let selector = self.selector_of(&model);
            let path = self.path_for(&selector);
            shards.entry(path).or_default().push(model);
        }
        shards
    }

    /// Load all entities from the store matching any of `selectors`;
    /// when `selectors` is empty, first enumerate the distinct selector
    /// tuples present in `all_entities` (as if queried from the store)
    /// and group by those.
    fn select(&self, all_entities: Vec<T>, selectors: &[Selector]) -> HashMap<PathBuf, Vec<T>> {
        if selectors.is_empty() {
            return self.spread(all_entities);
        }
        let mut shards: HashMap<PathBuf, Vec<T>> = HashMap::new();
        for model in all_entities {
            let selector = self.selector_of(&model);
            if selectors.contains(&selector) {
                let path = self.path_for(&selector);
                shards.entry(path).or_default().push(model);
            }
        }
        shards
    }

    /// Look up an entity across every shard by a caller-supplied identity
    /// predicate (matcher identity, SKU, GTIN, shop key, whichever this
    /// inventory's entities are keyed by); create and insert `stub` if
    /// nothing matches. `update_map`, when given, receives the stub under
    /// its resolved shard path so a caller that wants the miss persisted
    /// doesn't have to re-derive the path itself.
    fn find(
        &self,
        shards: &HashMap<PathBuf, Vec<T>>,
        matches_key: impl Fn(&T) -> bool,
        stub: T,
        update_map: Option<&mut HashMap<PathBuf, Vec<T>>>,
    ) -> T {
        for models in shards.values() {
            if let Some(found) = models.iter().find(|model| matches_key(model)) {
                return found.clone();
            }
        }
        if let Some(map) = update_map {
            let selector = self.selector_of(&stub);
            let path = self.path_for(&selector);
            map.entry(path).or_default().push(stub.clone());
        }
        stub
    }

    /// Three-way merge: for every shard in `other`, match each incoming
    /// entity against `self`'s corresponding shard by identity. Unmatched
    /// incoming entities are new (appended when `update` is true).
    /// Matched entities are merged in place. Returns only the shards that
    /// actually changed, with their full current content.
    ///
    /// When `update` is true (the default), `self_shards` is mutated in
    /// place to reflect the merge result; when false it is left
    /// untouched and the returned map stands alone.
    fn merge_update(
        &self,
        self_shards: &mut HashMap<PathBuf, Vec<T>>,
        other: &HashMap<PathBuf, Vec<T>>,
        update: bool,
        only_new: bool,
    ) -> CatalogResult<HashMap<PathBuf, Vec<T>>> {
        let mut changed_shards = HashMap::new();

        for (path, incoming_models) in other {
            let mut working = self_shards.get(path).cloned().unwrap_or_default();
            let mut shard_changed = false;

            for incoming in incoming_models {
                let existing_index = working.iter().position(|existing| self.identity_matches(existing, incoming));
                match existing_index {
                    None => {
                        working.push(incoming.clone());
                        shard_changed = true;
                    }
                    Some(index) => {
                        if only_new {
                            continue;
                        }
                        if self.merge_entity(&mut working[index], incoming, false)? {
                            shard_changed = true;
                        }
                    }
                }
            }

            if shard_changed {
                changed_shards.insert(path.clone(), working.clone());
                if update {
                    self_shards.insert(path.clone(), working);
                }
            }
        }

        Ok(changed_shards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        shop: String,
        sku: String,
        tag: String,
    }

    struct ItemInventory;

    impl Inventory<Item> for ItemInventory {
        fn template(&self) -> &str {
            "items-{shop}.yml"
        }

        fn selector_of(&self, model: &Item) -> Selector {
            vec![model.shop.clone()]
        }

        fn path_for(&self, selector: &Selector) -> PathBuf {
            PathBuf::from(format!("items-{}.yml", selector[0]))
        }

        fn identity_matches(&self, existing: &Item, incoming: &Item) -> bool {
            existing.sku == incoming.sku
        }

        fn merge_entity(&self, existing: &mut Item, incoming: &Item, _override_: bool) -> CatalogResult<bool> {
            if existing.tag != incoming.tag {
                existing.tag = incoming.tag.clone();
                Ok(true)
            } else {
                Ok(false)
            }
        }

        fn read(&self, _root: &std::path::Path) -> HashMap<PathBuf, Vec<Item>> {
            HashMap::new()
        }

        fn write(&self, _shards: &HashMap<PathBuf, Vec<Item>>) -> WriterResult<()> {
            Ok(())
        }
    }

    #[test]
    fn spread_groups_by_shard_selector() {
        let inventory = ItemInventory;
        let shards = inventory.spread(vec![
            Item { shop: "a".into(), sku: "1".into(), tag: "x".into() },
            Item { shop: "b".into(), sku: "2".into(), tag: "y".into() },
            Item { shop: "a".into(), sku: "3".into(), tag: "z".into() },
        ]);
        assert_eq!(shards.len(), 2);
        assert_eq!(shards[&PathBuf::from("items-a.yml")].len(), 2);
    }

    #[test]
    fn merge_update_returns_only_changed_shards() {
        let inventory = ItemInventory;
        let mut baseline: HashMap<PathBuf, Vec<Item>> = HashMap::new();
        baseline.insert(
            PathBuf::from("items-a.yml"),
            vec![Item { shop: "a".into(), sku: "1".into(), tag: "old".into() }],
        );
        baseline.insert(
            PathBuf::from("items-b.yml"),
            vec![Item { shop: "b".into(), sku: "2".into(), tag: "same".into() }],
        );

        let mut incoming: HashMap<PathBuf, Vec<Item>> = HashMap::new();
        incoming.insert(
            PathBuf::from("items-a.yml"),
            vec![Item { shop: "a".into(), sku: "1".into(), tag: "new".into() }],
        );
        incoming.insert(
            PathBuf::from("items-b.yml"),
            vec![Item { shop: "b".into(), sku: "2".into(), tag: "same".into() }],
        );

        let changed = inventory.merge_update(&mut baseline, &incoming, true, false).unwrap();
        assert_eq!(changed.len(), 1);
        assert!(changed.contains_key(&PathBuf::from("items-a.yml")));
        assert_eq!(baseline[&PathBuf::from("items-a.yml")][0].tag, "new");
    }

    #[test]
    fn find_returns_existing_match_without_touching_update_map() {
        let inventory = ItemInventory;
        let mut shards: HashMap<PathBuf, Vec<Item>> = HashMap::new();
        shards.insert(
            PathBuf::from("items-a.yml"),
            vec![Item { shop: "a".into(), sku: "1".into(), tag: "x".into() }],
        );
        let mut update_map = shards.clone();

        let found = inventory.find(&shards, |item| item.sku == "1", Item { shop: "a".into(), sku: "1".into(), tag: String::new() }, Some(&mut update_map));

        assert_eq!(found.tag, "x");
        assert_eq!(update_map[&PathBuf::from("items-a.yml")].len(), 1);
    }

    #[test]
    fn find_creates_and_inserts_stub_on_miss() {
        let inventory = ItemInventory;
        let shards: HashMap<PathBuf, Vec<Item>> = HashMap::new();
        let mut update_map: HashMap<PathBuf, Vec<Item>> = HashMap::new();
        let stub = Item { shop: "a".into(), sku: "missing".into(), tag: String::new() };

        let found = inventory.find(&shards, |item| item.sku == "missing", stub.clone(), Some(&mut update_map));

        assert_eq!(found, stub);
        assert_eq!(update_map[&PathBuf::from("items-a.yml")], vec![stub]);
    }

    #[test]
    fn merge_update_with_self_is_empty_and_leaves_self_unchanged() {
        let inventory = ItemInventory;
        let mut baseline: HashMap<PathBuf, Vec<Item>> = HashMap::new();
        baseline.insert(
            PathBuf::from("items-a.yml"),
            vec![Item { shop: "a".into(), sku: "1".into(), tag: "x".into() }],
        );
        let other = baseline.clone();
        let before = baseline.clone();
        let changed = inventory.merge_update(&mut baseline, &other, true, false).unwrap();
        assert!(changed.is_empty());
        assert_eq!(baseline, before);
    }
}
