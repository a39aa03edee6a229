//! Settings port: a deterministic fallback chain of TOML files plus
//! environment-variable overrides, with an explicit, clearable
//! process-global cache.
//!
//! Unlike the source system's implicit class-level singleton, `Settings`
//! here is a constructible value: call [`SettingsBuilder::build`] to get
//! one directly, or use [`global`]/[`clear_global`] when a process-wide
//! cache is actually wanted (tests that swap environments call
//! `clear_global` to force the next `global()` to re-read).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::error::{SettingsError, SettingsResult};

/// One entry in the fallback chain: a path to try, whether environment
/// overrides apply to keys resolved from it, and an optional TOML table
/// prefix to look under (used for e.g. `pyproject.toml`'s `[tool.rechu]`).
#[derive(Debug, Clone)]
struct FallbackFile {
    path: PathBuf,
    environment: bool,
    prefix: &'static [&'static str],
}

const DEFAULT_FALLBACK_CHAIN: &[(&str, bool, &[&str])] = &[
    ("settings.toml", true, &[]),
    ("pyproject.toml", false, &["tool", "rechu"]),
    ("rechu/settings.toml", false, &[]),
];

/// Resolved settings, built by applying the fallback chain once.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    tables: Vec<(toml::Table, bool)>,
}

impl Settings {
    /// Look up `(section, key)`, consulting (per fallback entry, in
    /// order) the environment override first if that entry allows it,
    /// then the entry's own TOML table, before moving to the next entry.
    pub fn get(&self, section: &str, key: &str) -> SettingsResult<String> {
        for (table, environment) in &self.tables {
            if *environment {
                if let Ok(value) = std::env::var(env_var_name(section, key)) {
                    return Ok(value);
                }
            }
            if let Some(value) = table.get(section).and_then(|s| s.get(key)).and_then(|v| v.as_str()) {
                return Ok(value.to_string());
            }
        }
        Err(SettingsError::MissingKey { section: section.to_string(), key: key.to_string() })
    }

    pub fn data_path(&self) -> SettingsResult<String> {
        self.get("data", "path")
    }

    pub fn data_format(&self) -> SettingsResult<String> {
        self.get("data", "format")
    }

    pub fn data_pattern(&self) -> SettingsResult<String> {
        self.get("data", "pattern")
    }

    pub fn data_products(&self) -> SettingsResult<String> {
        self.get("data", "products")
    }

    pub fn data_shops(&self) -> SettingsResult<String> {
        self.get("data", "shops")
    }

    pub fn database_uri(&self) -> SettingsResult<String> {
        self.get("database", "uri")
    }
}

fn env_var_name(section: &str, key: &str) -> String {
    format!("RECHU_{}_{}", section.to_ascii_uppercase(), key.to_ascii_uppercase().replace('-', "_"))
}

/// Builds a [`Settings`] by applying the documented fallback chain of
/// files rooted at a chosen base directory (defaults to the current
/// directory).
#[derive(Debug, Clone)]
pub struct SettingsBuilder {
    root: PathBuf,
    chain: Vec<FallbackFile>,
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsBuilder {
    pub fn new() -> Self {
        let chain = DEFAULT_FALLBACK_CHAIN
            .iter()
            .map(|(path, environment, prefix)| FallbackFile { path: PathBuf::from(path), environment: *environment, prefix })
            .collect();
        Self { root: PathBuf::from("."), chain }
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Read every fallback file that exists, in order; a missing file is
    /// treated as an empty document and the chain continues rather than
    /// failing.
    pub fn build(self) -> Settings {
        let mut tables = Vec::new();
        for entry in &self.chain {
            let full_path = self.root.join(&entry.path);
            let table = read_toml_table(&full_path, entry.prefix);
            tables.push((table, entry.environment));
        }
        Settings { tables }
    }
}

fn read_toml_table(path: &Path, prefix: &[&str]) -> toml::Table {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => return toml::Table::new(),
    };
    let mut value: toml::Value = match contents.parse() {
        Ok(value) => value,
        Err(_) => return toml::Table::new(),
    };
    for segment in prefix {
        value = match value.get(segment) {
            Some(next) => next.clone(),
            None => return toml::Table::new(),
        };
    }
    match value {
        toml::Value::Table(table) => table,
        _ => toml::Table::new(),
    }
}

static GLOBAL: OnceLock<Mutex<Option<Settings>>> = OnceLock::new();

fn global_cell() -> &'static Mutex<Option<Settings>> {
    GLOBAL.get_or_init(|| Mutex::new(None))
}

/// The process-global settings cache, built on first access from the
/// current directory's fallback chain. Call [`clear_global`] to force a
/// fresh read (tests that swap `RECHU_*` environment variables must do
/// this between cases).
pub fn global() -> Settings {
    let mut cell = global_cell().lock();
    if cell.is_none() {
        *cell = Some(SettingsBuilder::new().build());
    }
    cell.clone().expect("just initialized")
}

/// Clear the process-global settings cache so the next [`global()`] call
/// re-reads the fallback chain from disk and environment.
pub fn clear_global() {
    *global_cell().lock() = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_falls_through_chain() {
        let dir = tempdir().unwrap();
        let settings = SettingsBuilder::new().root(dir.path()).build();
        assert!(settings.get("data", "path").is_err());
    }

    #[test]
    fn reads_value_from_settings_toml() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("settings.toml"), "[data]\npath = \"./receipts\"\n").unwrap();
        let settings = SettingsBuilder::new().root(dir.path()).build();
        assert_eq!(settings.data_path().unwrap(), "./receipts");
    }

    #[test]
    fn environment_override_takes_precedence() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("settings.toml"), "[data]\npath = \"./receipts\"\n").unwrap();
        std::env::set_var("RECHU_DATA_PATH", "/override");
        let settings = SettingsBuilder::new().root(dir.path()).build();
        assert_eq!(settings.data_path().unwrap(), "/override");
        std::env::remove_var("RECHU_DATA_PATH");
    }

    #[test]
    fn clear_global_forces_reread() {
        clear_global();
        let _ = global();
        clear_global();
    }
}
