//! Per-block copy-on-write overlays over the persistent store.
//!
//! Each overlay is keyed by the hash of the block being evaluated and shadows
//! the persistent store for the duration of that block's validation. Writes
//! land in the overlay only; a tombstone slot marks a deletion without
//! consulting lower layers. On success the overlay is promoted into the
//! persistent store through one atomic batch; on rejection it is dropped.
//!
//! Overlays never share mutable state: inheriting from a parent overlay
//! clones every entry through an encode/decode round-trip, so sibling
//! speculative branches cannot alias record interiors.

use crate::{
    cache::{cache_key, RecordCache},
    error::StoreError,
    kv::{KeyValueStore, StoreBatch},
};
use alloy_primitives::{hex, B256};
use derive_more::{Deref, DerefMut};
use obex_primitives::{
    constants::{is_empty_key, DEFAULT_CACHE_LIMIT, DRY_RUN_CACHE_LIMIT, MINER_OVERLAY_HASH},
    Record, RecordKind,
};
use parking_lot::Mutex;
use schnellru::{ByLength, LruMap};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, trace};

/// Selects which layer a [`StagedStore`] operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Read/write the hot cache and the persistent store.
    Direct,
    /// Read/write the overlay registered for the given block hash, falling
    /// through to the persistent store on reads.
    Staged(B256),
}

/// A single overlay: hex cache key to record, `None` marking a tombstone.
#[derive(Deref, DerefMut)]
pub(crate) struct Overlay(LruMap<String, Option<Record>>);

impl Overlay {
    fn new(limit: u32) -> Self {
        Self(LruMap::new(ByLength::new(limit)))
    }
}

impl core::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Overlay").field("len", &self.0.len()).finish()
    }
}

/// Registry state guarded by the single overlay lock.
#[derive(Debug, Default)]
struct OverlayRegistry {
    /// Live overlays by block hash.
    overlays: HashMap<B256, Overlay>,
    /// Non-miner overlay hashes in creation order, oldest first. Governs FIFO
    /// eviction once [`DRY_RUN_CACHE_LIMIT`] is reached.
    recent: VecDeque<B256>,
}

/// Layered store: per-block overlays atop a persistent store plus a
/// read-through hot cache.
///
/// All overlay-registry mutations (init, drop, promote, lookup) serialize on
/// one lock. Reads and writes within a single overlay are expected to be
/// driven by one validator task at a time per block hash.
#[derive(Debug)]
pub struct StagedStore<DB> {
    db: DB,
    cache: RecordCache,
    registry: Mutex<OverlayRegistry>,
    cache_limit: u32,
}

impl<DB: KeyValueStore> StagedStore<DB> {
    /// Creates a staged store over `db` with the default cache limit.
    pub fn new(db: DB) -> Self {
        Self::with_cache_limit(db, DEFAULT_CACHE_LIMIT)
    }

    /// Creates a staged store over `db`, bounding the hot cache and each
    /// overlay to `cache_limit` entries.
    pub fn with_cache_limit(db: DB, cache_limit: u32) -> Self {
        Self {
            db,
            cache: RecordCache::new(cache_limit),
            registry: Mutex::new(OverlayRegistry::default()),
            cache_limit,
        }
    }

    /// Returns the underlying persistent store.
    pub const fn db(&self) -> &DB {
        &self.db
    }

    /// Returns true if a value is visible for `key` in the given mode.
    ///
    /// In staged mode the overlay's own entry wins (a tombstone reports
    /// absent) and the hot cache is never consulted.
    pub fn contains(&self, key: &[u8], mode: StoreMode) -> Result<bool, StoreError> {
        if is_empty_key(key) {
            return Ok(false)
        }
        match mode {
            StoreMode::Staged(block_hash) => {
                let mut registry = self.registry.lock();
                if let Some(overlay) = registry.overlays.get_mut(&block_hash) {
                    if let Some(slot) = overlay.get(&cache_key(key)) {
                        return Ok(slot.is_some())
                    }
                }
                drop(registry);
                self.db.contains(key)
            }
            StoreMode::Direct => {
                if self.cache.contains(key) {
                    return Ok(true)
                }
                self.db.contains(key)
            }
        }
    }

    /// Returns the record visible for `key` in the given mode, decoded as
    /// `kind`.
    ///
    /// Staged reads return the overlay's own entry if present (a tombstone
    /// is [`StoreError::NotFound`]) and otherwise fall through to the
    /// persistent store, bypassing the hot cache. Direct reads consult the
    /// hot cache first and populate it on a miss.
    pub fn get(&self, key: &[u8], kind: RecordKind, mode: StoreMode) -> Result<Record, StoreError> {
        if is_empty_key(key) {
            return Err(StoreError::NotFound)
        }
        if let StoreMode::Staged(block_hash) = mode {
            let mut registry = self.registry.lock();
            if let Some(overlay) = registry.overlays.get_mut(&block_hash) {
                if let Some(slot) = overlay.get(&cache_key(key)) {
                    return match slot {
                        Some(record) => Ok(record.clone()),
                        None => {
                            trace!(
                                target: "storage::staged",
                                key = %hex::encode(key),
                                %block_hash,
                                "read of tombstoned key"
                            );
                            Err(StoreError::NotFound)
                        }
                    }
                }
            }
            drop(registry);
            let bytes = self.db.get(key)?;
            return Ok(Record::decode(&bytes, kind)?)
        }

        if let Some(record) = self.cache.get(key) {
            return Ok(record)
        }
        let bytes = self.db.get(key)?;
        let record = Record::decode(&bytes, kind)?;
        self.cache.insert(key, record.clone());
        Ok(record)
    }

    /// Writes `record` under `key` in the given mode.
    ///
    /// Staged writes land in the overlay only and fail with
    /// [`StoreError::NoSuchOverlay`] if the overlay is not registered. Direct
    /// writes populate the hot cache and the persistent store.
    pub fn put(&self, key: &[u8], record: Record, mode: StoreMode) -> Result<(), StoreError> {
        match mode {
            StoreMode::Staged(block_hash) => {
                let mut registry = self.registry.lock();
                let overlay = registry
                    .overlays
                    .get_mut(&block_hash)
                    .ok_or(StoreError::NoSuchOverlay(block_hash))?;
                overlay.insert(cache_key(key), Some(record));
                Ok(())
            }
            StoreMode::Direct => {
                let encoded = record.encoded();
                self.cache.insert(key, record);
                self.db.put(key, encoded)
            }
        }
    }

    /// Deletes `key` in the given mode.
    ///
    /// A staged delete inserts a tombstone into the overlay; the persistent
    /// store is untouched until promotion. A direct delete removes from the
    /// hot cache and the persistent store.
    pub fn delete(&self, key: &[u8], mode: StoreMode) -> Result<(), StoreError> {
        match mode {
            StoreMode::Staged(block_hash) => {
                let mut registry = self.registry.lock();
                let overlay = registry
                    .overlays
                    .get_mut(&block_hash)
                    .ok_or(StoreError::NoSuchOverlay(block_hash))?;
                overlay.insert(cache_key(key), None);
                Ok(())
            }
            StoreMode::Direct => {
                self.cache.remove(key);
                self.db.delete(key)
            }
        }
    }

    /// Initializes a fresh overlay for `block_hash`, optionally inheriting
    /// every entry of `parent`'s overlay.
    ///
    /// If the registry is full, the oldest non-miner overlay is evicted
    /// first. Re-initializing an existing hash drops its previous overlay.
    /// Inherited entries are cloned by an encode/decode round-trip so the new
    /// overlay shares no mutable state with its parent; a failing round-trip
    /// aborts initialization with [`StoreError::Inherit`]. The named parent
    /// must exist and be non-empty.
    pub fn init_dry_run(&self, block_hash: B256, parent: Option<B256>) -> Result<(), StoreError> {
        let mut registry = self.registry.lock();
        if registry.recent.len() >= DRY_RUN_CACHE_LIMIT {
            if let Some(oldest) = registry.recent.pop_front() {
                debug!(target: "storage::staged", block_hash = %oldest, "evicting oldest overlay");
                registry.overlays.remove(&oldest);
            }
        }

        // Re-initialization is idempotent: any previous overlay for this
        // hash is discarded before the new one is built.
        registry.overlays.remove(&block_hash);
        debug!(target: "storage::staged", %block_hash, ?parent, "initializing overlay");

        let mut overlay = Overlay::new(self.cache_limit);
        if let Some(parent_hash) = parent {
            let parent_overlay = registry
                .overlays
                .get(&parent_hash)
                .filter(|parent_overlay| !parent_overlay.is_empty())
                .ok_or(StoreError::ParentOverlayNotFound {
                    hash: block_hash,
                    parent: parent_hash,
                })?;
            for (key, slot) in parent_overlay.iter() {
                let cloned = match slot {
                    Some(record) => {
                        Some(Record::decode(&record.encoded(), record.kind()).map_err(|source| {
                            StoreError::Inherit { hash: block_hash, parent: parent_hash, source }
                        })?)
                    }
                    None => None,
                };
                overlay.insert(key.clone(), cloned);
            }
        }

        registry.overlays.insert(block_hash, overlay);
        if block_hash != MINER_OVERLAY_HASH {
            registry.recent.push_back(block_hash);
        }
        Ok(())
    }

    /// Returns true if a non-empty overlay is registered for `block_hash`.
    pub fn has_dry_run(&self, block_hash: B256) -> bool {
        self.registry
            .lock()
            .overlays
            .get(&block_hash)
            .is_some_and(|overlay| !overlay.is_empty())
    }

    /// Drops the overlay registered for `block_hash`, if any.
    pub fn drop_dry_run(&self, block_hash: B256) {
        debug!(target: "storage::staged", %block_hash, "dropping overlay");
        self.registry.lock().overlays.remove(&block_hash);
    }

    /// Promotes the overlay registered for `block_hash` into the persistent
    /// store.
    ///
    /// Every live entry becomes a batch put, every tombstone a batch delete;
    /// the batch is written atomically and the hot cache is purged afterwards
    /// so direct reads observe the promoted values. The overlay itself stays
    /// registered until [`Self::drop_dry_run`]. Promoting a missing or empty
    /// overlay is a no-op.
    pub fn save_dry_run(&self, block_hash: B256) -> Result<(), StoreError> {
        debug!(target: "storage::staged", %block_hash, "promoting overlay");
        let mut registry = self.registry.lock();
        let Some(overlay) = registry.overlays.get_mut(&block_hash) else {
            debug!(target: "storage::staged", %block_hash, "nothing to promote, overlay missing");
            return Ok(())
        };
        if overlay.is_empty() {
            debug!(target: "storage::staged", %block_hash, "nothing to promote, overlay empty");
            return Ok(())
        }

        let mut batch = self.db.batch();
        for (hex_key, slot) in overlay.iter() {
            let key =
                hex::decode(hex_key).map_err(|_| StoreError::InvalidCacheKey(hex_key.clone()))?;
            match slot {
                Some(record) => batch.put(key, record.encoded()),
                None => batch.delete(key),
            }
        }
        batch.write()?;

        // Promoted values supersede whatever the hot cache held.
        self.cache.purge();
        debug!(target: "storage::staged", %block_hash, "promoted overlay");
        Ok(())
    }
}
