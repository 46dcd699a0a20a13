//! File-persisted key/value cache organized into buckets
//!
//! Each bucket lives in memory as a `CacheStore` and on disk as one JSON file
//! (`<dir>/<bucket><ext>`) that is rewritten after every change. Entries carry
//! an optional expiration; expired entries are removed lazily, when a read,
//! range or clean operation comes across them.

mod bucket;
mod cacher;
mod config;
mod entry;
mod error;
mod finite;
mod lock;
mod persist;
mod scan;
mod store;

pub use bucket::Bucket;
pub use cacher::Cacher;
pub use config::{CacherConfig, DEFAULT_EXT};
pub use entry::CacheEntry;
pub use error::{CacheError, Result};
pub use store::CacheStore;
