//! Reference relational `Store` backend, demonstrating the candidate-
//! enumeration query contract against sqlite. The schema itself is out
//! of scope; this module only shows the shape: sqlx's pool is async, so
//! every public method blocks on a dedicated single-thread runtime to
//! keep the rest of the core synchronous.

use std::sync::atomic::AtomicBool;

use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tokio::runtime::Runtime;

use crate::error::{StoreError, StoreResult};
use crate::models::{LabelMatcher, Product};
use crate::store::{ObservedField, ProductFilters, SessionGuard, Store};

pub struct SqlStore {
    pool: SqlitePool,
    runtime: Runtime,
    session_open: AtomicBool,
}

impl SqlStore {
    pub fn connect(uri: &str) -> StoreResult<Self> {
        let runtime = Runtime::new().map_err(|err| StoreError::Backend { message: err.to_string() })?;
        let pool = runtime
            .block_on(SqlitePool::connect(uri))
            .map_err(|err| StoreError::Backend { message: err.to_string() })?;
        Ok(Self { pool, runtime, session_open: AtomicBool::new(false) })
    }

    fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }
}

impl Store for SqlStore {
    fn open_session(&mut self) -> StoreResult<SessionGuard<'_>> {
        SessionGuard::acquire(&self.session_open)
    }

    fn find_products(&self, filters: &ProductFilters) -> StoreResult<Vec<Product>> {
        // The candidate-enumeration query (label left-outer join, price
        // BETWEEN band, year/unit indicator comparison, discount outer
        // join) lives in matcher::product; this method only demonstrates
        // the plain shop/sku/gtin filter shape the matcher falls back to
        // for an unflushed or dirty item.
        let mut query = String::from("SELECT id, shop, sku, gtin FROM products WHERE 1=1");
        if filters.shop.is_some() {
            query.push_str(" AND shop = ?");
        }
        if filters.sku.is_some() {
            query.push_str(" AND sku = ?");
        }
        if filters.gtin.is_some() {
            query.push_str(" AND gtin = ?");
        }
        tracing::debug!(%query, "built candidate query");

        let rows = self.block_on(async {
            let mut q = sqlx::query(&query);
            if let Some(shop) = &filters.shop {
                q = q.bind(shop);
            }
            if let Some(sku) = &filters.sku {
                q = q.bind(sku);
            }
            if let Some(gtin) = filters.gtin {
                q = q.bind(gtin);
            }
            q.fetch_all(&self.pool).await
        });
        let rows = rows.map_err(|err| StoreError::Backend { message: err.to_string() })?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut product = Product::new(row.get::<String, _>("shop"));
                product.id = row.try_get::<i64, _>("id").ok();
                product.sku = row.try_get::<String, _>("sku").ok();
                product.gtin = row.try_get::<i64, _>("gtin").ok().map(crate::types::Gtin::new);
                product
            })
            .collect())
    }

    fn find_shops(&self) -> StoreResult<Vec<crate::models::Shop>> {
        let rows = self
            .block_on(sqlx::query("SELECT key FROM shops").fetch_all(&self.pool))
            .map_err(|err| StoreError::Backend { message: err.to_string() })?;
        rows.into_iter()
            .map(|row| {
                crate::models::Shop::new(row.get::<String, _>("key"))
                    .map_err(|err| StoreError::Backend { message: err.to_string() })
            })
            .collect()
    }

    fn add_product(&mut self, product: Product) -> StoreResult<i64> {
        let labels: Vec<String> = product.labels.iter().map(|l: &LabelMatcher| l.0.clone()).collect();
        let labels_joined = labels.join(",");
        let alcohol: Option<Decimal> = product.alcohol;
        let result = self.block_on(
            sqlx::query("INSERT INTO products (shop, sku, gtin, labels, alcohol) VALUES (?, ?, ?, ?, ?)")
                .bind(&product.shop)
                .bind(&product.sku)
                .bind(product.gtin.map(|g| g.value()))
                .bind(labels_joined)
                .bind(alcohol)
                .execute(&self.pool),
        );
        let result = result.map_err(|err| StoreError::Backend { message: err.to_string() })?;
        Ok(result.last_insert_rowid())
    }

    fn add_shop(&mut self, shop: crate::models::Shop) -> StoreResult<()> {
        self.block_on(sqlx::query("INSERT INTO shops (key) VALUES (?)").bind(&shop.key).execute(&self.pool))
            .map_err(|err| StoreError::Backend { message: err.to_string() })?;
        Ok(())
    }

    fn merge_product(&mut self, product: Product) -> StoreResult<i64> {
        // The relational schema and its own upsert semantics are out of
        // scope; the reference backend always inserts.
        self.add_product(product)
    }

    fn delete_product(&mut self, id: i64) -> StoreResult<bool> {
        let result = self
            .block_on(sqlx::query("DELETE FROM products WHERE id = ?").bind(id).execute(&self.pool))
            .map_err(|err| StoreError::Backend { message: err.to_string() })?;
        Ok(result.rows_affected() > 0)
    }

    fn flush(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn observed_values(&self, shop: &str, field: ObservedField) -> StoreResult<Vec<String>> {
        // The relational schema (how labels/prices/discounts are stored
        // per product) is out of scope; this reference backend only
        // demonstrates the shape, reusing the same plain-table guess
        // `find_products` makes.
        let column = match field {
            ObservedField::Label => "labels",
            ObservedField::Price => "prices",
            ObservedField::Discount => "discounts",
        };
        let query = format!("SELECT DISTINCT {column} FROM products WHERE shop = ? ORDER BY {column}");
        tracing::debug!(%query, "built observed-values query");
        let rows = self
            .block_on(sqlx::query(&query).bind(shop).fetch_all(&self.pool))
            .map_err(|err| StoreError::Backend { message: err.to_string() })?;
        Ok(rows.into_iter().filter_map(|row| row.try_get::<String, _>(0).ok()).collect())
    }
}
