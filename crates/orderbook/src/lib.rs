//! On-chain limit-order matching engine for the obex chain.
//!
//! The book for each trading pair lives entirely in the staged store as
//! records, so every mutation is scoped to the store mode it was made in:
//! direct writes hit canonical state, staged writes stay inside a per-block
//! overlay until that overlay is promoted. [`MatchingService`] is the facade
//! the block validator resolves; [`MatchPayload`] carries a submitted order
//! together with the book digests and trades its submitter claims.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod book;
mod error;
pub mod payload;
pub mod service;

pub use book::{MatchOutcome, OrderBook};
pub use error::OrderBookError;
pub use payload::{MatchPayload, PayloadTrade};
pub use service::{MatchingService, NoopTradeSink, ProcessedRecord, TradeSink};
