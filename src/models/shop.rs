//! Shop entity: the scoping root for products, receipts and discount
//! indicator parsing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CatalogError, CatalogResult};

/// A single discount-indicator pattern: a compiled regular expression used
/// to split a receipt item's opaque discount marker into semantic pieces.
/// Compiled once per shop and reused across every item of every receipt
/// from that shop rather than recompiled per item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountIndicator {
    pub pattern: String,
    #[serde(skip, default)]
    compiled: Option<RegexCell>,
}

/// `Regex` has no `PartialEq`/`Serialize`; wrap it so `DiscountIndicator`
/// can derive what it needs while still caching the compiled form.
#[derive(Debug, Clone)]
struct RegexCell(Regex);

impl DiscountIndicator {
    pub fn new(pattern: impl Into<String>) -> CatalogResult<Self> {
        let pattern = pattern.into();
        let compiled = Regex::new(&pattern)
            .map_err(|err| CatalogError::validation(format!("invalid discount pattern '{pattern}': {err}")))?;
        Ok(Self { pattern, compiled: Some(RegexCell(compiled)) })
    }

    fn regex(&mut self) -> CatalogResult<&Regex> {
        if self.compiled.is_none() {
            let compiled = Regex::new(&self.pattern)
                .map_err(|err| CatalogError::validation(format!("invalid discount pattern '{}': {err}", self.pattern)))?;
            self.compiled = Some(RegexCell(compiled));
        }
        Ok(&self.compiled.as_ref().unwrap().0)
    }

    /// Split a raw discount marker into the semantic pieces this pattern
    /// captures, recompiling lazily if this instance arrived via
    /// deserialization with no cached regex.
    pub fn split<'a>(&'a mut self, marker: &'a str) -> CatalogResult<Vec<&'a str>> {
        let regex = self.regex()?;
        Ok(regex
            .captures(marker)
            .map(|caps| {
                caps.iter()
                    .skip(1)
                    .filter_map(|m| m.map(|m| m.as_str()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl PartialEq for DiscountIndicator {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

/// A shop: the identity root every `Product` and `Receipt` is scoped under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    /// Short token identity, at most 32 characters.
    pub key: String,
    pub name: Option<String>,
    pub website: Option<Url>,
    /// Template producing a product's public URL, e.g. containing `{sku}`.
    pub products: Option<String>,
    pub wikidata: Option<String>,
    #[serde(default)]
    pub discount_indicators: Vec<DiscountIndicator>,
}

impl Shop {
    pub fn new(key: impl Into<String>) -> CatalogResult<Self> {
        let key = key.into();
        if key.is_empty() || key.len() > 32 {
            return Err(CatalogError::validation(format!(
                "shop key '{key}' must be 1..=32 characters"
            )));
        }
        Ok(Self {
            key,
            name: None,
            website: None,
            products: None,
            wikidata: None,
            discount_indicators: Vec::new(),
        })
    }

    /// Run every discount-indicator pattern against a raw marker, in
    /// declaration order, returning the first match's captured pieces.
    pub fn split_discount_indicator(&mut self, marker: &str) -> CatalogResult<Vec<String>> {
        for indicator in &mut self.discount_indicators {
            let pieces = indicator.split(marker)?;
            if !pieces.is_empty() {
                return Ok(pieces.into_iter().map(str::to_string).collect());
            }
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlong_key() {
        let key = "x".repeat(33);
        assert!(Shop::new(key).is_err());
    }

    #[test]
    fn splits_marker_on_first_matching_pattern() {
        let mut shop = Shop::new("aldi").unwrap();
        shop.discount_indicators.push(DiscountIndicator::new(r"^bonus-(\d+)$").unwrap());
        let pieces = shop.split_discount_indicator("bonus-3").unwrap();
        assert_eq!(pieces, vec!["3".to_string()]);
    }

    #[test]
    fn no_pattern_matches_returns_empty() {
        let mut shop = Shop::new("aldi").unwrap();
        shop.discount_indicators.push(DiscountIndicator::new(r"^bonus-(\d+)$").unwrap());
        assert!(shop.split_discount_indicator("unrelated").unwrap().is_empty());
    }
}
