//! Store port: session-scoped access to products and shops.
//!
//! The source system models this through an async-capable repository
//! layer; per the core's synchronous scheduling model this is
//! generalized to plain (non-`async fn`) trait methods, and session
//! reentrancy is modeled with an explicit guard rather than task-local
//! state.

pub mod memory;
#[cfg(feature = "sql-store")]
pub mod sql;

use crate::error::{StoreError, StoreResult};
use crate::models::{Product, Shop};

/// Filters accepted by [`Store::find_products`]. `None` means "don't
/// filter on this field".
#[derive(Debug, Clone, Default)]
pub struct ProductFilters {
    pub shop: Option<String>,
    pub sku: Option<String>,
    pub gtin: Option<i64>,
}

/// Which matcher family [`Store::observed_values`] draws its distinct
/// value set from. External to the core's own use (the interactive
/// receipt-creation menu this feeds is out of scope), but the contract
/// itself belongs to the Store port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservedField {
    Label,
    Price,
    Discount,
}

/// A generic repository operation for a single entity type, kept
/// synchronous per the core's scheduling model (see module docs).
pub trait Repository<T> {
    fn get(&self, id: i64) -> StoreResult<Option<T>>;
    fn add(&mut self, entity: T) -> StoreResult<i64>;
    fn delete(&mut self, id: i64) -> StoreResult<bool>;
    fn all(&self) -> StoreResult<Vec<T>>;
}

/// The store port: open a session, query/add/merge/delete entities, and
/// flush without committing to obtain generated ids.
pub trait Store {
    /// Open a session. Sessions are not reentrant: calling this while a
    /// session from the same store is outstanding must fail loudly.
    fn open_session(&mut self) -> StoreResult<SessionGuard<'_>>;

    fn find_products(&self, filters: &ProductFilters) -> StoreResult<Vec<Product>>;
    fn find_shops(&self) -> StoreResult<Vec<Shop>>;

    fn add_product(&mut self, product: Product) -> StoreResult<i64>;
    fn add_shop(&mut self, shop: Shop) -> StoreResult<()>;

    /// Merge `product` into whichever existing product matches it by
    /// identity (sku/gtin/matcher-identity), or add it as new. Returns
    /// the merged-or-added product's id.
    fn merge_product(&mut self, product: Product) -> StoreResult<i64>;

    fn delete_product(&mut self, id: i64) -> StoreResult<bool>;

    /// Persist any pending adds without committing the session, so
    /// generated ids become available to the caller mid-operation.
    fn flush(&mut self) -> StoreResult<()>;

    /// The distinct label/price/discount values observed across a shop's
    /// products, ordered for completion (interactive callers use this
    /// for readline-style suggestion, which is itself out of scope; only
    /// the set-and-order contract belongs here).
    fn observed_values(&self, shop: &str, field: ObservedField) -> StoreResult<Vec<String>>;
}

/// A non-reentrant session handle. Dropping it without an explicit
/// [`SessionGuard::commit`] leaves the session open for rollback
/// semantics to decide; the in-memory reference store always commits
/// implicitly since it has no external transaction to roll back.
pub struct SessionGuard<'a> {
    open: &'a std::sync::atomic::AtomicBool,
}

impl<'a> SessionGuard<'a> {
    /// Acquire a session guard, failing if one is already outstanding.
    pub fn acquire(open: &'a std::sync::atomic::AtomicBool) -> StoreResult<Self> {
        if open.swap(true, std::sync::atomic::Ordering::AcqRel) {
            return Err(StoreError::SessionReentry);
        }
        Ok(Self { open })
    }

    pub fn commit(self) {
        drop(self);
    }
}

impl<'a> Drop for SessionGuard<'a> {
    fn drop(&mut self) {
        self.open.store(false, std::sync::atomic::Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn second_session_fails_while_first_outstanding() {
        let open = AtomicBool::new(false);
        let first = SessionGuard::acquire(&open).unwrap();
        assert!(SessionGuard::acquire(&open).is_err());
        drop(first);
        assert!(SessionGuard::acquire(&open).is_ok());
    }
}
