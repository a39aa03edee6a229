//! Generic matcher trait: candidate enumeration, a semantic match
//! predicate, specificity-ranked duplicate resolution, and a lazily
//! initialized uniqueness index. [`product`] is the one concrete matcher
//! this crate ships; the trait boundary is kept generic because it is
//! part of the original architecture worth preserving for extension, not
//! because a second concrete matcher is in scope.

pub mod product;

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::CatalogResult;

/// A generic matcher over candidates of type `C` against items of type
/// `I`, keyed for its uniqueness index by `K`. The map itself is owned by
/// the implementer (see [`Matcher::map`]/[`Matcher::map_mut`]) so that a
/// concrete matcher can add behaviour around it (range-member recursion,
/// for instance) without the trait dictating its storage.
pub trait Matcher<I: Clone, C: Clone + PartialEq, K: Eq + Hash + Clone> {
    /// Produce every `(candidate, item)` pair satisfying [`Matcher::is_match`].
    fn find_candidates(&self, candidates: &[C], items: &[I]) -> CatalogResult<Vec<(C, I)>> {
        let mut pairs = Vec::new();
        for item in items {
            for candidate in candidates {
                if self.is_match(candidate, item)? {
                    pairs.push((candidate.clone(), item.clone()));
                }
            }
        }
        Ok(pairs)
    }

    /// The match predicate itself.
    fn is_match(&self, candidate: &C, item: &I) -> CatalogResult<bool>;

    /// The uniqueness-index keys a candidate is registered (or looked
    /// up) under. Absent keys (e.g. no sku) are simply omitted.
    fn get_keys(&self, candidate: &C) -> Vec<K>;

    /// `all` minus `exclude`, by value equality. A concrete matcher
    /// typically overrides this to add a deterministic order.
    fn select_candidates(&self, all: &[C], exclude: &[C]) -> Vec<C> {
        all.iter().filter(|c| !exclude.contains(c)).cloned().collect()
    }

    /// Decide which of two candidates matched against the same item
    /// should be kept, given `duplicate` is the candidate already chosen
    /// for that item (or `None` if `candidate` is the first one seen).
    /// The default only resolves the trivial case where both sides are
    /// literally equal; anything else is ambiguous (`None`).
    fn select_duplicate(&self, candidate: &C, duplicate: Option<&C>) -> Option<C> {
        match duplicate {
            Some(d) if d == candidate => Some(candidate.clone()),
            _ => None,
        }
    }

    /// Collapse a candidate stream down to at most one candidate per
    /// item. An item with two candidates [`Matcher::select_duplicate`]
    /// cannot resolve is dropped from the result entirely rather than
    /// guessing.
    fn filter_duplicate_candidates(&self, pairs: Vec<(C, I)>) -> Vec<(C, I)>
    where
        I: PartialEq,
    {
        let mut matches: Vec<(I, C)> = Vec::new();
        for (candidate, item) in pairs {
            if let Some(pos) = matches.iter().position(|(existing_item, _)| existing_item == &item) {
                let existing = matches[pos].1.clone();
                match self.select_duplicate(&candidate, Some(&existing)) {
                    Some(resolved) => matches[pos].1 = resolved,
                    None => {
                        matches.remove(pos);
                    }
                }
            } else {
                matches.push((item, candidate));
            }
        }
        matches.into_iter().map(|(item, candidate)| (candidate, item)).collect()
    }

    /// The uniqueness index, once [`Matcher::load_map`]/[`Matcher::clear_map`]
    /// has been called; `None` means the map has never been initialized.
    fn map(&self) -> Option<&HashMap<K, C>>;

    fn map_mut(&mut self) -> &mut Option<HashMap<K, C>>;

    /// Reset the map to empty and repopulate it from `candidates`.
    fn load_map(&mut self, candidates: &[C]) {
        self.clear_map();
        self.fill_map(candidates);
    }

    fn clear_map(&mut self) {
        *self.map_mut() = Some(HashMap::new());
    }

    fn fill_map(&mut self, candidates: &[C]) {
        for candidate in candidates {
            self.add_map(candidate.clone());
        }
    }

    /// Register `candidate` under every key [`Matcher::get_keys`] returns.
    /// No-op (returns false) if the map has not been initialized, if the
    /// candidate has no keys, or if any key already names a different
    /// entry: collisions are refused rather than overwritten.
    fn add_map(&mut self, candidate: C) -> bool {
        let keys = self.get_keys(&candidate);
        if keys.is_empty() {
            return false;
        }
        match self.map_mut() {
            None => false,
            Some(map) => {
                if keys.iter().any(|key| map.contains_key(key)) {
                    return false;
                }
                for key in keys {
                    map.insert(key, candidate.clone());
                }
                true
            }
        }
    }

    fn discard_map(&mut self, candidate: &C) -> bool {
        let keys = self.get_keys(candidate);
        match self.map_mut() {
            None => false,
            Some(map) => {
                let mut removed = false;
                for key in keys {
                    if map.remove(&key).is_some() {
                        removed = true;
                    }
                }
                removed
            }
        }
    }

    /// The candidate already registered under any of `candidate`'s keys,
    /// if one exists.
    fn check_map(&self, candidate: &C) -> Option<C> {
        let map = self.map()?;
        self.get_keys(candidate).into_iter().find_map(|key| map.get(&key).cloned())
    }

    fn find_map(&self, key: &K) -> Option<C> {
        self.map().and_then(|map| map.get(key)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Obj {
        id: u32,
        keys: Vec<u32>,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Item(u32);

    struct ObjMatcher {
        map: Option<HashMap<u32, Obj>>,
    }

    impl Matcher<Item, Obj, u32> for ObjMatcher {
        fn is_match(&self, _candidate: &Obj, _item: &Item) -> CatalogResult<bool> {
            Ok(true)
        }

        fn get_keys(&self, candidate: &Obj) -> Vec<u32> {
            candidate.keys.clone()
        }

        fn map(&self) -> Option<&HashMap<u32, Obj>> {
            self.map.as_ref()
        }

        fn map_mut(&mut self) -> &mut Option<HashMap<u32, Obj>> {
            &mut self.map
        }
    }

    #[test]
    fn add_map_rejects_before_initialization() {
        let mut matcher = ObjMatcher { map: None };
        let obj = Obj { id: 1, keys: vec![10] };
        assert!(!matcher.add_map(obj));
    }

    #[test]
    fn load_map_then_check_map_finds_registered_candidate() {
        let mut matcher = ObjMatcher { map: None };
        let one = Obj { id: 1, keys: vec![10] };
        matcher.load_map(&[one.clone()]);
        assert_eq!(matcher.check_map(&one), Some(one));
    }

    #[test]
    fn discard_map_removes_every_key() {
        let mut matcher = ObjMatcher { map: None };
        let obj = Obj { id: 1, keys: vec![1, 2] };
        matcher.clear_map();
        matcher.add_map(obj.clone());
        matcher.discard_map(&obj);
        assert!(matcher.check_map(&obj).is_none());
    }

    #[test]
    fn filter_duplicate_candidates_drops_ambiguous_items() {
        let matcher = ObjMatcher { map: None };
        let two = Obj { id: 2, keys: vec![] };
        let three = Obj { id: 3, keys: vec![] };
        let four = Obj { id: 4, keys: vec![] };
        let one_item = Item(1);
        let two_item = Item(2);
        let pairs =
            vec![(two, one_item.clone()), (three, one_item), (four.clone(), two_item.clone())];
        let filtered = matcher.filter_duplicate_candidates(pairs);
        assert_eq!(filtered, vec![(four, two_item)]);
    }
}
