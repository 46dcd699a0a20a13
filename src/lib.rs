//! filecache library
//!
//! A process-local key/value cache persisted to one file per bucket, with
//! lazy TTL expiration. The `cli` module backs the `filecache` admin binary.

pub mod cache;
pub mod cli;

pub use cache::{Bucket, CacheError, Cacher, CacherConfig, Result};
