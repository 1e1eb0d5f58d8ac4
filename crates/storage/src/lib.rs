//! Layered key/value storage for the obex matching chain.
//!
//! Three layers, bottom up:
//!
//! - [`KeyValueStore`]: a durable ordered byte store with atomic batch
//!   writes. [`MemoryStore`] is the in-tree engine; production engines plug
//!   in behind the trait.
//! - [`RecordCache`]: a bounded LRU of decoded records in front of the
//!   persistent store, consulted by direct reads only.
//! - [`StagedStore`]: per-block copy-on-write overlays that let a validator
//!   run speculative matches against a mutable shadow of the book and either
//!   promote the result atomically or discard it.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cache;
mod error;
pub mod kv;
pub mod staged;

pub use cache::RecordCache;
pub use error::StoreError;
pub use kv::{KeyValueStore, MemoryStore, StoreBatch};
pub use staged::{StagedStore, StoreMode};
