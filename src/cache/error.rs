//! Error types for cache operations

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the cache engine
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while reading, writing or scanning the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache directory could not be created
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A bucket file exists but could not be opened or read
    #[error("failed to read cache file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A bucket file could not be created or written
    #[error("failed to write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A bucket file could not be removed
    #[error("failed to remove cache file {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cache directory could not be walked
    #[error("failed to walk cache directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// A bucket file does not contain a valid cache document
    #[error("failed to decode cache file {path}: {source}")]
    DecodeFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory bucket could not be encoded to its file
    #[error("failed to encode cache file {path}: {source}")]
    EncodeFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be turned into a generic payload
    #[error("failed to encode value for key '{key}': {source}")]
    EncodeValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stored payload does not have the shape of the requested type
    #[error("failed to decode value for key '{key}': {source}")]
    DecodeValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The TTL pushes the expiration past what a timestamp can hold
    #[error("TTL of {0:?} is out of range")]
    TtlOutOfRange(Duration),
}

impl CacheError {
    /// Returns true for errors caused by a payload whose shape does not match
    /// the requested type
    pub fn is_decode_value(&self) -> bool {
        matches!(self, CacheError::DecodeValue { .. })
    }
}
