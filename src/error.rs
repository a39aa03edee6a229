//! Error types for the catalog core.
//!
//! Each error family from the design corresponds to one variant group here:
//! domain validation, unit/dimension mismatches, duplicate-identity
//! conflicts, reader/writer failures, session reentrancy, and settings
//! fallback exhaustion.

use thiserror::Error;

/// Errors raised by the domain model and matcher (validation, arithmetic,
/// duplicate detection).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    /// A constructor or setter received a value outside its domain, or a
    /// merge/check violated a cross-entity invariant (e.g. mismatched shop).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Quantity or Price arithmetic was attempted across incompatible
    /// dimensions.
    #[error("incompatible units: {message}")]
    IncompatibleUnits { message: String },

    /// An explicit add to the uniqueness index collided with an existing
    /// entry (only surfaced on explicit add paths, never during merge).
    #[error("duplicate identity for product (shop={shop:?})")]
    DuplicateIdentity { shop: String },
}

impl CatalogError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn incompatible_units(message: impl Into<String>) -> Self {
        Self::IncompatibleUnits { message: message.into() }
    }
}

/// Result type alias for catalog-domain operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised while reading a serialized shard or receipt file.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// The top-level shape of the parsed document did not match what the
    /// reader expects (e.g. a mapping where a sequence was required).
    #[error("malformed container in '{path}': {message}")]
    MalformedContainer { path: String, message: String },

    /// A required key was absent from an otherwise well-shaped document.
    #[error("missing field '{field}' in '{path}'")]
    MissingField { path: String, field: String },

    /// A value was present but failed to convert to its target numeric or
    /// decimal type.
    #[error("type conversion failed for '{field}' in '{path}': {message}")]
    TypeConversion { path: String, field: String, message: String },

    /// The underlying format layer (YAML, etc.) failed outright.
    #[error("format error reading '{path}': {source}")]
    Format {
        path: String,
        #[source]
        source: FormatError,
    },

    #[error("i/o error reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ReaderResult<T> = Result<T, ReaderError>;

/// Errors raised while writing a serialized shard or receipt file.
#[derive(Error, Debug)]
pub enum WriterError {
    /// The writer was asked to serialize a heterogeneous batch it cannot
    /// represent under a single shared header (e.g. products from more
    /// than one shop).
    #[error("heterogeneous batch cannot share a header: {message}")]
    Heterogeneous { message: String },

    #[error("format error writing '{path}': {source}")]
    Format {
        path: String,
        #[source]
        source: FormatError,
    },

    #[error("i/o error writing '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type WriterResult<T> = Result<T, WriterError>;

/// Opaque wrapper around whatever serialization format backs a Reader/Writer
/// implementation (YAML by default). Kept distinct from `ReaderError`'s own
/// variants so that format failures are identifiable without coupling this
/// crate's public error type to a particular format crate's error type.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct FormatError(pub String);

#[cfg(feature = "yaml-io")]
impl From<serde_yaml::Error> for FormatError {
    fn from(err: serde_yaml::Error) -> Self {
        Self(err.to_string())
    }
}

/// Errors raised by the store port.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A second session was requested while one was already outstanding.
    /// Sessions are not reentrant; this is fatal to the calling operation.
    #[error("a store session is already open")]
    SessionReentry,

    /// The store backend itself failed (connection, query, constraint).
    #[error("store backend error: {message}")]
    Backend { message: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the settings port.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    /// None of the fallback files defined the requested `(section, key)`.
    #[error("no settings file in the fallback chain defines {section}.{key}")]
    MissingKey { section: String, key: String },
}

pub type SettingsResult<T> = Result<T, SettingsError>;
