//! The in-memory representation of one bucket
//!
//! A `CacheStore` owns a bucket's entries behind its own mutex and persists the
//! full map to its backing file after every operation that changes it,
//! including reads that evict expired entries. A call only returns `Ok` once
//! that persist succeeded. When the persist fails the in-memory map keeps the
//! attempted change, so the bucket's durable state is indeterminate until the
//! next successful save.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::entry::CacheEntry;
use super::error::{CacheError, Result};
use super::lock::mutex_lock;
use super::persist::{self, BucketData};

/// One bucket's entries and the file they are persisted to
#[derive(Debug)]
pub struct CacheStore {
    file_path: PathBuf,
    data: Mutex<BucketData>,
}

/// Computes the absolute expiration for an entry written now with `ttl`
fn expiration_after(ttl: Duration) -> Result<DateTime<Utc>> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .ok_or(CacheError::TtlOutOfRange(ttl))
}

impl CacheStore {
    /// Opens the store backed by `file_path`, loading it if the file exists
    pub fn open(file_path: impl Into<PathBuf>) -> Result<Self> {
        let file_path = file_path.into();
        let data = persist::load(&file_path)?;
        Ok(Self {
            file_path,
            data: Mutex::new(data),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Writes the current map to the backing file
    pub fn save(&self) -> Result<()> {
        let data = mutex_lock(&self.data, "save");
        persist::save(&self.file_path, &data)
    }

    /// Returns the value for `key`, evicting it if it has expired
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut data = mutex_lock(&self.data, "get");
        let Some(entry) = data.get(key) else {
            return Ok(None);
        };

        if entry.is_expired(Utc::now()) {
            data.remove(key);
            debug!(target: "filecache", path = %self.file_path.display(), key, "evicted expired entry");
            persist::save(&self.file_path, &data)?;
            return Ok(None);
        }

        entry.decode(key).map(Some)
    }

    /// Returns the value for `key` without looking at its expiration
    pub fn get_frozen<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let data = mutex_lock(&self.data, "get_frozen");
        data.get(key).map(|entry| entry.decode(key)).transpose()
    }

    /// Stores `value` under `key`, expiring `ttl` from now
    pub fn set<V: Serialize + ?Sized>(&self, key: &str, ttl: Duration, value: &V) -> Result<()> {
        let entry = CacheEntry::encode(key, value, Some(expiration_after(ttl)?))?;
        self.upsert(key, entry, "set")
    }

    /// Stores `value` under `key` with no expiration
    pub fn set_frozen<V: Serialize + ?Sized>(&self, key: &str, value: &V) -> Result<()> {
        let entry = CacheEntry::encode(key, value, None)?;
        self.upsert(key, entry, "set_frozen")
    }

    fn upsert(&self, key: &str, entry: CacheEntry, op: &'static str) -> Result<()> {
        let mut data = mutex_lock(&self.data, op);
        data.insert(key.to_string(), entry);
        persist::save(&self.file_path, &data)
    }

    /// Removes `key` if present
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut data = mutex_lock(&self.data, "delete");
        data.remove(key);
        persist::save(&self.file_path, &data)
    }

    /// Visits every live entry, decoded as `T`, until `visit` returns false.
    ///
    /// Expired entries met along the way are evicted. The bucket is persisted
    /// afterwards whether or not the walk stopped early. A payload that does
    /// not decode as `T` aborts the walk with that error.
    pub fn range<T, F>(&self, mut visit: F) -> Result<()>
    where
        T: DeserializeOwned,
        F: FnMut(&str, T) -> bool,
    {
        let mut data = mutex_lock(&self.data, "range");
        let now = Utc::now();

        let mut expired = Vec::new();
        for (key, entry) in data.iter() {
            if entry.is_expired(now) {
                expired.push(key.clone());
                continue;
            }
            if !visit(key.as_str(), entry.decode(key)?) {
                break;
            }
        }

        for key in &expired {
            data.remove(key);
        }
        if !expired.is_empty() {
            debug!(
                target: "filecache",
                path = %self.file_path.display(),
                evicted = expired.len(),
                "evicted expired entries during range"
            );
        }

        persist::save(&self.file_path, &data)
    }

    /// Removes every entry, expired or frozen, for which `predicate` holds
    pub fn delete_if<T, F>(&self, mut predicate: F) -> Result<()>
    where
        T: DeserializeOwned,
        F: FnMut(&str, &T) -> bool,
    {
        let mut data = mutex_lock(&self.data, "delete_if");

        let mut doomed = Vec::new();
        for (key, entry) in data.iter() {
            let value: T = entry.decode(key)?;
            if predicate(key.as_str(), &value) {
                doomed.push(key.clone());
            }
        }
        for key in &doomed {
            data.remove(key);
        }

        persist::save(&self.file_path, &data)
    }

    /// Removes only the expired entries
    pub fn clean(&self) -> Result<()> {
        let mut data = mutex_lock(&self.data, "clean");
        let now = Utc::now();
        let before = data.len();
        data.retain(|_, entry| !entry.is_expired(now));

        debug!(
            target: "filecache",
            path = %self.file_path.display(),
            evicted = before - data.len(),
            "cleaned bucket"
        );
        persist::save(&self.file_path, &data)
    }

    /// Removes every entry
    pub fn empty(&self) -> Result<()> {
        let mut data = mutex_lock(&self.data, "empty");
        data.clear();
        persist::save(&self.file_path, &data)
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        mutex_lock(&self.data, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        name: String,
        value: i32,
    }

    fn create_test_store() -> (CacheStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = CacheStore::open(temp_dir.path().join("test.cache")).expect("Open should succeed");
        (store, temp_dir)
    }

    /// Inserts an entry that expired a second ago, bypassing `set`
    fn insert_expired(store: &CacheStore, key: &str, value: i32) {
        let entry = CacheEntry::encode(key, &value, Some(Utc::now() - TimeDelta::seconds(1))).unwrap();
        mutex_lock(&store.data, "test").insert(key.to_string(), entry);
    }

    #[test]
    fn test_set_then_get_returns_value() {
        let (store, _temp_dir) = create_test_store();
        let data = TestData {
            name: "fresh".to_string(),
            value: 7,
        };

        store.set("k", Duration::from_secs(60), &data).expect("Set should succeed");

        let got: Option<TestData> = store.get("k").expect("Get should succeed");
        assert_eq!(got, Some(data));
    }

    #[test]
    fn test_get_missing_key_is_none() {
        let (store, _temp_dir) = create_test_store();
        let got: Option<TestData> = store.get("missing").expect("Get should succeed");
        assert!(got.is_none());
    }

    #[test]
    fn test_get_evicts_expired_and_persists() {
        let (store, _temp_dir) = create_test_store();
        insert_expired(&store, "old", 1);
        store.set_frozen("keep", &2).unwrap();

        let got: Option<i32> = store.get("old").expect("Get should succeed");
        assert!(got.is_none());
        assert_eq!(store.len(), 1);

        let on_disk = persist::load(store.file_path()).unwrap();
        assert!(!on_disk.contains_key("old"));
        assert!(on_disk.contains_key("keep"));
    }

    #[test]
    fn test_get_frozen_ignores_expiration() {
        let (store, _temp_dir) = create_test_store();
        insert_expired(&store, "old", 5);

        let got: Option<i32> = store.get_frozen("old").expect("Get should succeed");
        assert_eq!(got, Some(5));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_zero_ttl_expires() {
        let (store, _temp_dir) = create_test_store();
        store.set("k", Duration::ZERO, &1).unwrap();
        thread::sleep(Duration::from_millis(10));

        let got: Option<i32> = store.get("k").unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn test_huge_ttl_is_out_of_range() {
        let (store, _temp_dir) = create_test_store();
        let err = store.set("k", Duration::MAX, &1).unwrap_err();
        assert!(matches!(err, CacheError::TtlOutOfRange(_)));
    }

    #[test]
    fn test_get_with_wrong_shape_is_decode_error() {
        let (store, _temp_dir) = create_test_store();
        store.set_frozen("k", &"text").unwrap();

        let err = store.get::<TestData>("k").unwrap_err();
        assert!(err.is_decode_value());
    }

    #[test]
    fn test_delete_absent_key_is_ok() {
        let (store, _temp_dir) = create_test_store();
        store.delete("nothing").expect("Delete should succeed");
        assert!(store.file_path().exists());
    }

    #[test]
    fn test_range_skips_and_evicts_expired() {
        let (store, _temp_dir) = create_test_store();
        store.set_frozen("a", &1).unwrap();
        store.set("b", Duration::from_secs(60), &2).unwrap();
        insert_expired(&store, "c", 3);

        let mut seen = Vec::new();
        store
            .range(|key, value: i32| {
                seen.push((key.to_string(), value));
                true
            })
            .expect("Range should succeed");
        seen.sort();

        assert_eq!(seen, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
        assert_eq!(store.len(), 2);
        assert!(!persist::load(store.file_path()).unwrap().contains_key("c"));
    }

    #[test]
    fn test_range_stops_early_and_still_persists() {
        let (store, _temp_dir) = create_test_store();
        for i in 0..5 {
            store.set_frozen(&format!("k{}", i), &i).unwrap();
        }
        fs::remove_file(store.file_path()).unwrap();

        let mut visits = 0;
        store
            .range(|_, _: i32| {
                visits += 1;
                false
            })
            .expect("Range should succeed");

        assert_eq!(visits, 1);
        assert_eq!(persist::load(store.file_path()).unwrap().len(), 5);
    }

    #[test]
    fn test_delete_if_includes_expired_and_frozen() {
        let (store, _temp_dir) = create_test_store();
        store.set_frozen("frozen_even", &2).unwrap();
        store.set_frozen("frozen_odd", &3).unwrap();
        store.set("timed_even", Duration::from_secs(60), &4).unwrap();
        insert_expired(&store, "expired_even", 6);
        insert_expired(&store, "expired_odd", 7);

        store
            .delete_if(|_, value: &i32| value % 2 == 0)
            .expect("DeleteIf should succeed");

        let mut left: Vec<String> = persist::load(store.file_path()).unwrap().into_keys().collect();
        left.sort();
        assert_eq!(left, vec!["expired_odd".to_string(), "frozen_odd".to_string()]);
    }

    #[test]
    fn test_clean_removes_only_expired() {
        let (store, _temp_dir) = create_test_store();
        store.set_frozen("frozen", &1).unwrap();
        store.set("timed", Duration::from_secs(60), &2).unwrap();
        insert_expired(&store, "expired", 3);

        store.clean().expect("Clean should succeed");

        assert_eq!(store.len(), 2);
        assert_eq!(store.get_frozen::<i32>("expired").unwrap(), None);
    }

    #[test]
    fn test_empty_clears_everything() {
        let (store, _temp_dir) = create_test_store();
        store.set_frozen("a", &1).unwrap();
        store.set("b", Duration::from_secs(60), &2).unwrap();

        store.empty().expect("Empty should succeed");

        assert!(store.is_empty());
        assert!(persist::load(store.file_path()).unwrap().is_empty());
    }

    #[test]
    fn test_reopen_loads_persisted_entries() {
        let (store, temp_dir) = create_test_store();
        store.set_frozen("k", &"persisted").unwrap();
        drop(store);

        let reopened = CacheStore::open(temp_dir.path().join("test.cache")).unwrap();
        let got: Option<String> = reopened.get("k").unwrap();
        assert_eq!(got.as_deref(), Some("persisted"));
    }

    #[test]
    fn test_failed_persist_keeps_memory_change() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().join("bucket_dir");
        fs::create_dir(&dir).unwrap();
        let store = CacheStore::open(dir.join("test.cache")).unwrap();
        fs::remove_dir(&dir).unwrap();

        let err = store.set_frozen("k", &1).unwrap_err();
        assert!(matches!(err, CacheError::Write { .. }));
        assert_eq!(store.get_frozen::<i32>("k").unwrap(), Some(1));
    }

    #[test]
    fn test_expired_get_reports_failed_persist() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().join("bucket_dir");
        fs::create_dir(&dir).unwrap();
        let store = CacheStore::open(dir.join("test.cache")).unwrap();
        insert_expired(&store, "old", 1);
        fs::remove_dir(&dir).unwrap();

        // Verify the eviction's failed save is surfaced, not swallowed as a miss
        let err = store.get::<i32>("old").unwrap_err();
        assert!(matches!(err, CacheError::Write { .. }));

        // The eviction itself already happened in memory
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_non_finite_float_leaves_bucket_unchanged() {
        let (store, _temp_dir) = create_test_store();
        store.set_frozen("k", &1.5).unwrap();
        let before = fs::read_to_string(store.file_path()).unwrap();

        let err = store.set_frozen("k", &f64::NAN).unwrap_err();
        assert!(matches!(err, CacheError::EncodeValue { .. }));
        let err = store
            .set("other", Duration::from_secs(60), &vec![1.0, f64::INFINITY])
            .unwrap_err();
        assert!(matches!(err, CacheError::EncodeValue { .. }));

        // Verify neither memory nor disk picked up a null
        assert_eq!(store.get::<f64>("k").unwrap(), Some(1.5));
        assert_eq!(store.len(), 1);
        assert_eq!(fs::read_to_string(store.file_path()).unwrap(), before);
    }
}
