//! Concrete `Inventory` for products, sharded by the fields a products
//! filename template references (typically just `{shop}`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{CatalogResult, WriterResult};
use crate::inventory::{Inventory, Selector};
use crate::io::{template_fields, Reader, Writer};
use crate::models::Product;

pub struct Products {
    template: String,
    root: PathBuf,
}

impl Products {
    pub fn new(template: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self { template: template.into(), root: root.into() }
    }

    fn field_value(product: &Product, field: &str) -> String {
        match field {
            "shop" => product.shop.clone(),
            "category" => product.category.clone().unwrap_or_default(),
            "type" => product.kind.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }
}

impl Inventory<Product> for Products {
    fn template(&self) -> &str {
        &self.template
    }

    fn selector_of(&self, model: &Product) -> Selector {
        template_fields(&self.template).iter().map(|field| Self::field_value(model, field)).collect()
    }

    fn path_for(&self, selector: &Selector) -> PathBuf {
        let fields = template_fields(&self.template);
        let mut values = HashMap::new();
        for (field, value) in fields.iter().zip(selector.iter()) {
            values.insert(field.clone(), value.clone());
        }
        self.root.join(crate::io::resolve_template(&self.template, &values))
    }

    fn identity_matches(&self, existing: &Product, incoming: &Product) -> bool {
        (incoming.sku.is_some() && existing.sku == incoming.sku)
            || (incoming.gtin.is_some() && existing.gtin == incoming.gtin)
            || (incoming.matcher_identity().is_some() && existing.matcher_identity() == incoming.matcher_identity())
    }

    fn merge_entity(&self, existing: &mut Product, incoming: &Product, override_: bool) -> CatalogResult<bool> {
        existing.merge(incoming, override_)
    }

    fn read(&self, root: &Path) -> HashMap<PathBuf, Vec<Product>> {
        let glob_pattern = template_glob(&self.template);
        let mut shards = HashMap::new();
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %err, "failed to scan products directory");
                return shards;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read directory entry while scanning product shards");
                    continue;
                }
            };
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if !glob_match(&glob_pattern, name) {
                continue;
            }
            let reader = crate::io::yaml::ProductsReader::new(path.clone());
            match reader.read() {
                Ok(products) => {
                    shards.insert(path, products);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping malformed products shard");
                }
            }
        }
        shards
    }

    fn write(&self, shards: &HashMap<PathBuf, Vec<Product>>) -> WriterResult<()> {
        for (path, products) in shards {
            let writer = crate::io::yaml::ProductsWriter::new(path.clone(), products.clone());
            writer.write()?;
        }
        Ok(())
    }
}

/// Match a filename against a single-`*`-wildcard glob derived from a
/// template (good enough for the one-field shard templates this engine
/// deals with: `products-{shop}.yml` -> `products-*.yml`).
fn glob_match(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == name,
        Some((prefix, suffix)) => {
            name.len() >= prefix.len() + suffix.len() && name.starts_with(prefix) && name.ends_with(suffix)
        }
    }
}

fn template_glob(template: &str) -> String {
    let mut glob_pattern = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
            }
            glob_pattern.push('*');
        } else {
            glob_pattern.push(c);
        }
    }
    glob_pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_glob_replaces_placeholders_with_wildcards() {
        assert_eq!(template_glob("products-{shop}.yml"), "products-*.yml");
    }

    #[test]
    fn glob_match_accepts_any_middle_segment() {
        assert!(glob_match("products-*.yml", "products-aldi.yml"));
        assert!(!glob_match("products-*.yml", "shops.yml"));
    }

    #[test]
    fn selector_of_extracts_shop_field() {
        let products = Products::new("products-{shop}.yml", "/data");
        let product = Product::new("aldi");
        assert_eq!(products.selector_of(&product), vec!["aldi".to_string()]);
    }

    #[test]
    fn path_for_resolves_template() {
        let products = Products::new("products-{shop}.yml", "/data");
        let path = products.path_for(&vec!["aldi".to_string()]);
        assert_eq!(path, PathBuf::from("/data/products-aldi.yml"));
    }

    /// A malformed file during `read()` is logged and skipped; it never
    /// aborts the whole read. A well-formed sibling shard in the same
    /// directory must still come back.
    #[test]
    fn malformed_shard_is_logged_and_skipped_not_fatal() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("products-aldi.yml"), "shop: aldi\nproducts:\n  - labels: [bulk]\n").unwrap();
        std::fs::write(dir.path().join("products-lidl.yml"), "not: [valid, products, shape").unwrap();

        let products = Products::new("products-{shop}.yml", dir.path());
        let shards = products.read(dir.path());

        assert_eq!(shards.len(), 1);
        let (_, entries) = shards.into_iter().next().unwrap();
        assert_eq!(entries[0].shop, "aldi");
    }
}
