//! Persistent byte key/value store abstraction.

use crate::error::StoreError;
use parking_lot::RwLock;
use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

/// A durable ordered byte key/value store with atomic batch writes.
///
/// Ordering across batches is not required; within a batch, writes are
/// all-or-nothing.
pub trait KeyValueStore: Send + Sync + Debug {
    /// The store's write batch type.
    type Batch: StoreBatch;

    /// Returns true if the store holds a value for `key`.
    fn contains(&self, key: &[u8]) -> Result<bool, StoreError>;

    /// Returns the value stored under `key`, or [`StoreError::NotFound`].
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError>;

    /// Stores `value` under `key`.
    fn put(&self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError>;

    /// Removes the value stored under `key`. Removing an absent key is not an
    /// error.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Opens a new write batch.
    fn batch(&self) -> Self::Batch;
}

/// A set of writes applied atomically by [`StoreBatch::write`].
pub trait StoreBatch {
    /// Stages a put.
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Stages a delete.
    fn delete(&mut self, key: Vec<u8>);

    /// Applies all staged operations atomically.
    fn write(self) -> Result<(), StoreError>;
}

/// In-memory [`KeyValueStore`] over a [`BTreeMap`].
///
/// The reference engine for tests and single-process deployments; cloning
/// shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    type Batch = MemoryBatch;

    fn contains(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.data.read().contains_key(key))
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        self.data.read().get(key).cloned().ok_or(StoreError::NotFound)
    }

    fn put(&self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError> {
        self.data.write().insert(key.to_vec(), value);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn batch(&self) -> Self::Batch {
        MemoryBatch { data: Arc::clone(&self.data), ops: Vec::new() }
    }
}

#[derive(Debug)]
enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Write batch of a [`MemoryStore`]. All operations are applied under a
/// single write lock, making the batch atomic with respect to readers.
#[derive(Debug)]
pub struct MemoryBatch {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    ops: Vec<BatchOp>,
}

impl StoreBatch for MemoryBatch {
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put(key, value));
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete(key));
    }

    fn write(self) -> Result<(), StoreError> {
        let mut data = self.data.write();
        for op in self.ops {
            match op {
                BatchOp::Put(key, value) => {
                    data.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn get_put_delete() {
        let store = MemoryStore::new();
        assert_matches!(store.get(b"k"), Err(StoreError::NotFound));

        store.put(b"k", b"v".to_vec()).unwrap();
        assert!(store.contains(b"k").unwrap());
        assert_eq!(store.get(b"k").unwrap(), b"v");

        store.delete(b"k").unwrap();
        assert!(!store.contains(b"k").unwrap());
    }

    #[test]
    fn deleting_absent_key_is_not_an_error() {
        let store = MemoryStore::new();
        store.delete(b"missing").unwrap();
    }

    #[test]
    fn batch_applies_all_operations() {
        let store = MemoryStore::new();
        store.put(b"a", b"1".to_vec()).unwrap();

        let mut batch = store.batch();
        batch.put(b"b".to_vec(), b"2".to_vec());
        batch.put(b"c".to_vec(), b"3".to_vec());
        batch.delete(b"a".to_vec());

        // Nothing is visible until the batch is written.
        assert!(store.contains(b"a").unwrap());
        assert!(!store.contains(b"b").unwrap());

        batch.write().unwrap();
        assert!(!store.contains(b"a").unwrap());
        assert_eq!(store.get(b"b").unwrap(), b"2");
        assert_eq!(store.get(b"c").unwrap(), b"3");
    }

    #[test]
    fn clones_share_data() {
        let store = MemoryStore::new();
        let clone = store.clone();
        store.put(b"k", b"v".to_vec()).unwrap();
        assert_eq!(clone.get(b"k").unwrap(), b"v");
    }
}
