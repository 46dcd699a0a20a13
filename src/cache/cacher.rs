//! The bucket registry and the public cache API
//!
//! A `Cacher` owns a directory and lazily opens one `CacheStore` per bucket
//! name. Two lock domains are involved: the registry mutex guards the
//! name -> store map (and the bulk directory operations), each store's own
//! mutex guards that bucket's entries and file. Bucket-scoped calls hold the
//! registry lock only long enough to resolve their store, so operations on
//! different buckets never wait on each other's I/O.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::bucket::Bucket;
use super::config::CacherConfig;
use super::error::{CacheError, Result};
use super::lock::mutex_lock;
use super::scan;
use super::store::CacheStore;

/// A file-backed cache made of independently persisted buckets
#[derive(Debug)]
pub struct Cacher {
    config: CacherConfig,
    stores: Mutex<HashMap<String, Arc<CacheStore>>>,
}

impl Cacher {
    /// Opens a cache in `dir`, creating the directory if needed
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(CacherConfig::new(dir.as_ref()))
    }

    /// Opens a cache in `dir` whose bucket files end with `ext`
    pub fn with_ext(dir: impl AsRef<Path>, ext: impl Into<String>) -> Result<Self> {
        Self::with_config(CacherConfig::new(dir.as_ref()).with_ext(ext))
    }

    /// Opens a cache described by `config`, creating its directory if needed
    pub fn with_config(config: CacherConfig) -> Result<Self> {
        fs::create_dir_all(config.dir()).map_err(|source| CacheError::CreateDir {
            path: config.dir().to_path_buf(),
            source,
        })?;
        Ok(Self {
            config,
            stores: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the directory and extension this cache was opened with
    pub fn config(&self) -> &CacherConfig {
        &self.config
    }

    /// Returns the store for `bucket`, loading it from disk on first use
    fn store(&self, bucket: &str) -> Result<Arc<CacheStore>> {
        let mut stores = mutex_lock(&self.stores, "store");
        if let Some(store) = stores.get(bucket) {
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(CacheStore::open(self.config.bucket_path(bucket))?);
        debug!(target: "filecache", bucket, "opened bucket");
        stores.insert(bucket.to_string(), Arc::clone(&store));
        Ok(store)
    }

    /// Stores `value` under `key` in `bucket`, expiring `ttl` from now
    ///
    /// # Arguments
    /// * `bucket` - Bucket name; its store is loaded from disk on first use
    /// * `ttl` - How long the entry stays live
    /// * `key` - Key within the bucket; an existing entry is replaced
    /// * `value` - Any serializable value
    ///
    /// # Returns
    /// * `Ok(())` once the whole bucket has been written to its file
    /// * `Err(CacheError::EncodeValue)` if the value cannot be encoded (e.g. a NaN float)
    /// * `Err(CacheError::Write)` if the bucket file cannot be written
    pub fn set<V: Serialize + ?Sized>(
        &self,
        bucket: &str,
        ttl: Duration,
        key: &str,
        value: &V,
    ) -> Result<()> {
        self.store(bucket)?.set(key, ttl, value)
    }

    /// Stores `value` under `key` using the bucket descriptor's name and TTL
    pub fn set_in<V: Serialize + ?Sized>(&self, bucket: &Bucket, key: &str, value: &V) -> Result<()> {
        self.set(bucket.name(), bucket.ttl(), key, value)
    }

    /// Stores `value` under `key` in `bucket` with no expiration
    pub fn set_frozen<V: Serialize + ?Sized>(&self, bucket: &str, key: &str, value: &V) -> Result<()> {
        self.store(bucket)?.set_frozen(key, value)
    }

    /// Reads the value for `key` from `bucket`, decoded as `T`
    ///
    /// An expired entry is evicted and the bucket rewritten before `None` is
    /// returned.
    ///
    /// # Arguments
    /// * `bucket` - Bucket name
    /// * `key` - Key within the bucket
    ///
    /// # Returns
    /// * `Ok(Some(T))` if the entry is live
    /// * `Ok(None)` if the entry is absent or expired
    /// * `Err(CacheError::DecodeValue)` if the stored payload does not have the shape of `T`
    /// * `Err(CacheError::Write)` if evicting an expired entry could not be persisted
    pub fn get<T: DeserializeOwned>(&self, bucket: &str, key: &str) -> Result<Option<T>> {
        self.store(bucket)?.get(key)
    }

    /// Returns the value for `key` decoded as `T` without checking expiration
    pub fn get_frozen<T: DeserializeOwned>(&self, bucket: &str, key: &str) -> Result<Option<T>> {
        self.store(bucket)?.get_frozen(key)
    }

    /// Removes `key` from `bucket`; absent keys are not an error
    pub fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.store(bucket)?.delete(key)
    }

    /// Visits the live entries of `bucket` until `visit` returns false,
    /// evicting expired entries it walks past
    pub fn range<T, F>(&self, bucket: &str, visit: F) -> Result<()>
    where
        T: DeserializeOwned,
        F: FnMut(&str, T) -> bool,
    {
        self.store(bucket)?.range(visit)
    }

    /// Collects every live entry of `bucket`
    pub fn get_all<T: DeserializeOwned>(&self, bucket: &str) -> Result<HashMap<String, T>> {
        let mut all = HashMap::new();
        self.range(bucket, |key, value: T| {
            all.insert(key.to_string(), value);
            true
        })?;
        Ok(all)
    }

    /// Removes every entry of `bucket` matching `predicate`, expired and
    /// frozen entries included
    pub fn delete_if<T, F>(&self, bucket: &str, predicate: F) -> Result<()>
    where
        T: DeserializeOwned,
        F: FnMut(&str, &T) -> bool,
    {
        self.store(bucket)?.delete_if(predicate)
    }

    /// Removes every entry of `bucket`
    pub fn empty_bucket(&self, bucket: &str) -> Result<()> {
        self.store(bucket)?.empty()
    }

    /// Removes the expired entries of `bucket`
    pub fn clean_bucket(&self, bucket: &str) -> Result<()> {
        self.store(bucket)?.clean()
    }

    /// Number of entries stored in `bucket`, expired ones included
    pub fn len(&self, bucket: &str) -> Result<usize> {
        Ok(self.store(bucket)?.len())
    }

    /// Names of the buckets currently loaded in memory, sorted
    pub fn bucket_names(&self) -> Vec<String> {
        let stores = mutex_lock(&self.stores, "bucket_names");
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drops `bucket` from memory and deletes its file.
    ///
    /// The bucket can be used again afterwards and starts out empty.
    ///
    /// # Returns
    /// * `Ok(true)` if the bucket file was deleted
    /// * `Ok(false)` if there was no file to delete
    /// * `Err(CacheError::Remove)` if the file exists but cannot be removed
    pub fn remove_bucket(&self, bucket: &str) -> Result<bool> {
        let mut stores = mutex_lock(&self.stores, "remove_bucket");
        stores.remove(bucket);

        let path = self.config.bucket_path(bucket);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(target: "filecache", bucket, "removed bucket");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(target: "filecache", bucket, "removed bucket with no file");
                Ok(false)
            }
            Err(source) => Err(CacheError::Remove { path, source }),
        }
    }

    /// Persists every loaded bucket, stopping at the first failure
    pub fn close(&self) -> Result<()> {
        let stores = mutex_lock(&self.stores, "close");
        for (bucket, store) in stores.iter() {
            if let Err(err) = store.save() {
                warn!(target: "filecache", bucket = %bucket, error = %err, "failed to persist bucket on close");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Deletes every bucket file accepted by `filter`
    ///
    /// All buckets are then dropped from memory, matched or not, so the next
    /// access reloads them from disk. That happens even when the scan fails.
    ///
    /// # Arguments
    /// * `filter` - Called with each file name (extension included) that ends
    ///   with the configured extension
    ///
    /// # Returns
    /// * `Ok(count)` with the number of files removed
    /// * `Err` on the first walk or removal failure; later files are left alone
    pub fn remove_all_by<F>(&self, filter: F) -> Result<usize>
    where
        F: FnMut(&str) -> bool,
    {
        let mut stores = mutex_lock(&self.stores, "remove_all_by");
        let removed = scan::remove_matching(self.config.dir(), self.config.ext(), filter);
        stores.clear();

        if let Ok(count) = &removed {
            debug!(target: "filecache", removed = count, "removed bucket files");
        }
        removed
    }

    /// Total size in bytes of every file in the cache directory
    pub fn total_size(&self) -> Result<u64> {
        let _stores = mutex_lock(&self.stores, "total_size");
        scan::total_size(self.config.dir())
    }
}
