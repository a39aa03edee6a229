//! Concrete `Inventory` for shops: the degenerate single-shard case,
//! since the shops filename template references no fields.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{CatalogResult, WriterResult};
use crate::inventory::{Inventory, Selector};
use crate::io::{Reader, Writer};
use crate::models::Shop;

pub struct Shops {
    filename: String,
    root: PathBuf,
}

impl Shops {
    pub fn new(filename: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self { filename: filename.into(), root: root.into() }
    }
}

impl Inventory<Shop> for Shops {
    fn template(&self) -> &str {
        &self.filename
    }

    fn selector_of(&self, _model: &Shop) -> Selector {
        Vec::new()
    }

    fn path_for(&self, _selector: &Selector) -> PathBuf {
        self.root.join(&self.filename)
    }

    fn identity_matches(&self, existing: &Shop, incoming: &Shop) -> bool {
        existing.key == incoming.key
    }

    fn merge_entity(&self, existing: &mut Shop, incoming: &Shop, override_: bool) -> CatalogResult<bool> {
        if existing.key != incoming.key {
            return Err(crate::error::CatalogError::validation(format!(
                "cannot merge shop '{}' into shop '{}'",
                incoming.key, existing.key
            )));
        }
        let mut changed = false;
        macro_rules! merge_field {
            ($field:ident) => {
                if let Some(value) = &incoming.$field {
                    if override_ || existing.$field.is_none() {
                        if existing.$field.as_ref() != Some(value) {
                            existing.$field = Some(value.clone());
                            changed = true;
                        }
                    }
                }
            };
        }
        merge_field!(name);
        merge_field!(website);
        merge_field!(products);
        merge_field!(wikidata);
        for indicator in &incoming.discount_indicators {
            if !existing.discount_indicators.iter().any(|i| i.pattern == indicator.pattern) {
                existing.discount_indicators.push(indicator.clone());
                changed = true;
            }
        }
        Ok(changed)
    }

    fn read(&self, root: &Path) -> HashMap<PathBuf, Vec<Shop>> {
        let path = root.join(&self.filename);
        let mut shards = HashMap::new();
        if !path.exists() {
            return shards;
        }
        let reader = crate::io::yaml::ShopsReader::new(path.clone());
        match reader.read() {
            Ok(shops) => {
                shards.insert(path, shops);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping malformed shops shard");
            }
        }
        shards
    }

    fn write(&self, shards: &HashMap<PathBuf, Vec<Shop>>) -> WriterResult<()> {
        for (path, shops) in shards {
            let writer = crate::io::yaml::ShopsWriter::new(path.clone(), shops.clone());
            writer.write()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_field_template_collapses_to_single_shard() {
        let shops = Shops::new("shops.yml", "/data");
        let a = Shop::new("aldi").unwrap();
        let b = Shop::new("lidl").unwrap();
        assert_eq!(shops.selector_of(&a), shops.selector_of(&b));
        assert_eq!(shops.path_for(&shops.selector_of(&a)), PathBuf::from("/data/shops.yml"));
    }
}
