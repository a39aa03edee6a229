//! Reader/Writer port: bidirectional mapping between entities and
//! serialized files. The on-disk format is treated as opaque by the core;
//! only the port contract (read/parse, write/serialize, and the
//! round-trip-equal guarantee) is specified here. [`yaml`] ships one
//! reference implementation matching the shape (not byte layout) the
//! original system's files take.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{ReaderResult, WriterResult};

#[cfg(feature = "yaml-io")]
pub mod yaml;

/// Reads a sequence of entities of type `T` from a path or an
/// already-open byte source.
pub trait Reader<T> {
    fn path(&self) -> &Path;

    /// Read the file at `path()` and parse it. The default forwards to
    /// [`Reader::parse`] the way the source reader opens the file then
    /// delegates.
    fn read(&self) -> ReaderResult<Vec<T>> {
        let file = std::fs::File::open(self.path()).map_err(|err| crate::error::ReaderError::Io {
            path: self.path().display().to_string(),
            source: err,
        })?;
        self.parse(&mut std::io::BufReader::new(file))
    }

    /// Parse an already-open byte source into a sequence of entities.
    fn parse(&self, source: &mut dyn BufRead) -> ReaderResult<Vec<T>>;
}

/// Writes a batch of entities of type `T` to a path or an already-open
/// byte sink, honoring an optional "updated" timestamp applied to the
/// file's mtime on success.
pub trait Writer<T> {
    fn path(&self) -> &Path;
    fn updated(&self) -> Option<DateTime<Utc>>;

    fn write(&self) -> WriterResult<()> {
        let file = std::fs::File::create(self.path()).map_err(|err| crate::error::WriterError::Io {
            path: self.path().display().to_string(),
            source: err,
        })?;
        self.serialize(&mut std::io::BufWriter::new(file))?;
        if let Some(updated) = self.updated() {
            set_mtime(self.path(), updated).map_err(|err| crate::error::WriterError::Io {
                path: self.path().display().to_string(),
                source: err,
            })?;
        }
        Ok(())
    }

    fn serialize(&self, sink: &mut dyn Write) -> WriterResult<()>;
}

fn set_mtime(path: &Path, updated: DateTime<Utc>) -> std::io::Result<()> {
    let system_time: std::time::SystemTime = updated.into();
    std::fs::File::options().write(true).open(path)?.set_modified(system_time)
}

/// Resolve a filename template's field placeholders (`{field}`) against a
/// map of field name to value, producing the concrete path. Used by the
/// inventory engine's shard key derivation as well as Reader/Writer path
/// resolution.
pub fn resolve_template(template: &str, fields: &std::collections::HashMap<String, String>) -> PathBuf {
    let mut resolved = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if let Some(value) = fields.get(&name) {
                resolved.push_str(value);
            }
        } else {
            resolved.push(c);
        }
    }
    PathBuf::from(resolved)
}

/// The field names a filename template references, in order of
/// appearance, without duplicates.
pub fn template_fields(template: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_single_field_template() {
        let mut fields = std::collections::HashMap::new();
        fields.insert("shop".to_string(), "aldi".to_string());
        let path = resolve_template("products-{shop}.yml", &fields);
        assert_eq!(path, PathBuf::from("products-aldi.yml"));
    }

    #[test]
    fn zero_field_template_is_degenerate_single_shard() {
        assert!(template_fields("shops.yml").is_empty());
    }

    #[test]
    fn extracts_fields_in_order_without_duplicates() {
        let fields = template_fields("{year}/{shop}-{shop}.yml");
        assert_eq!(fields, vec!["year".to_string(), "shop".to_string()]);
    }
}
