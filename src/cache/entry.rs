//! Cache entries and the generic payload they carry
//!
//! Values are stored as `serde_json::Value` so one bucket can hold payloads of
//! different Rust types. Reading a value back decodes the payload into whatever
//! type the caller asks for, which succeeds as long as the shapes line up.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::error::{CacheError, Result};
use super::finite;

/// A single cached value together with its optional expiration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The structurally encoded payload
    pub value: Value,
    /// When the entry expires; `None` means the entry is frozen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Encodes `value` into an entry that expires at `expiration`
    ///
    /// NaN and infinite floats anywhere in `value` are rejected rather than
    /// stored as `null`.
    pub fn encode<V: Serialize + ?Sized>(
        key: &str,
        value: &V,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let encode_err = |source: serde_json::Error| CacheError::EncodeValue {
            key: key.to_string(),
            source,
        };
        finite::check(value).map_err(encode_err)?;
        let value = serde_json::to_value(value).map_err(encode_err)?;
        Ok(Self { value, expiration })
    }

    /// Returns true when the entry has an expiration strictly before `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|expiration| now > expiration)
    }

    /// Decodes the payload into `T`
    pub fn decode<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        T::deserialize(&self.value).map_err(|source| CacheError::DecodeValue {
            key: key.to_string(),
            source,
        })
    }
}
