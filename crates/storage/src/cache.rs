//! Hot cache of decoded records.

use alloy_primitives::hex;
use obex_primitives::Record;
use parking_lot::Mutex;
use schnellru::{ByLength, LruMap};

/// Bounded LRU of decoded records in front of the persistent store.
///
/// Keyed by the hex encoding of the store key. Consulted and populated by
/// direct reads only; staged reads bypass it so that speculative branches
/// never observe (or pollute) committed-state caching.
pub struct RecordCache {
    limit: u32,
    inner: Mutex<LruMap<String, Record>>,
}

impl core::fmt::Debug for RecordCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RecordCache").field("limit", &self.limit).finish_non_exhaustive()
    }
}

/// Returns the cache key for a raw store key.
pub(crate) fn cache_key(key: &[u8]) -> String {
    hex::encode(key)
}

impl RecordCache {
    /// Creates a cache bounded to `limit` entries.
    pub fn new(limit: u32) -> Self {
        Self { limit, inner: Mutex::new(LruMap::new(ByLength::new(limit))) }
    }

    /// Returns true if the cache holds a record for `key`, without touching
    /// recency.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.inner.lock().peek(&cache_key(key)).is_some()
    }

    /// Returns a copy of the cached record for `key`, promoting its recency.
    pub fn get(&self, key: &[u8]) -> Option<Record> {
        self.inner.lock().get(&cache_key(key)).map(|record| record.clone())
    }

    /// Caches `record` under `key`.
    pub fn insert(&self, key: &[u8], record: Record) {
        self.inner.lock().insert(cache_key(key), record);
    }

    /// Evicts the record cached under `key`. Returns true if one was present.
    pub fn remove(&self, key: &[u8]) -> bool {
        self.inner.lock().remove(&cache_key(key)).is_some()
    }

    /// Drops every cached record.
    pub fn purge(&self) {
        self.inner.lock().clear();
    }

    /// Returns the number of cached records.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
