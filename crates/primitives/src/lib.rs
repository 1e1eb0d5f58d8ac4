//! Commonly used types for the obex matching chain.
//!
//! Blocks, transactions and receipts cover the boundary the block validator
//! sees; orders, trades and the storage [`Record`] variants cover the matching
//! engine's state, together with its canonical encoding.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod block;
pub mod constants;
mod error;
pub mod order;
pub mod proofs;
pub mod receipt;
pub mod record;
pub mod trade;
pub mod transaction;

pub use block::{Block, Header};
pub use error::{GotExpected, GotExpectedBoxed};
pub use order::{OrderBookItem, OrderItem, OrderListItem, OrderStatus, OrderTreeItem, Side};
pub use receipt::{Log, Receipt};
pub use record::{CodecError, Item, Record, RecordKind};
pub use trade::{Trade, TradeStatus};
pub use transaction::Transaction;

// Re-export the primitive integer/byte types used throughout the workspace.
pub use alloy_primitives::{self, keccak256, Address, Bloom, BloomInput, Bytes, B256, U256};
