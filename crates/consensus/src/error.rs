use alloy_primitives::{Bloom, B256};
use obex_orderbook::OrderBookError;
use obex_primitives::{GotExpected, GotExpectedBoxed};
use obex_storage::StoreError;

/// Errors produced by block validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsensusError {
    /// The block is already known with state.
    #[error("block [hash={hash}, number={number}] is already known")]
    KnownBlock {
        /// Hash of the known block.
        hash: B256,
        /// Height of the known block.
        number: u64,
    },

    /// The block's parent is not known at all.
    #[error("block ancestor [hash={0}] is not known")]
    UnknownAncestor(B256),

    /// The block's parent is known but its state has been pruned.
    #[error("block ancestor [hash={0}] is known but its state is not available")]
    PrunedAncestor(B256),

    /// The derived uncle root does not match the header.
    #[error("mismatched block uncle root: {0}")]
    UncleRootMismatch(GotExpected<B256>),

    /// The derived transaction root does not match the header.
    #[error("mismatched block transaction root: {0}")]
    TxRootMismatch(GotExpected<B256>),

    /// The derived receipt root does not match the header.
    #[error("mismatched block receipt root: {0}")]
    ReceiptRootMismatch(GotExpected<B256>),

    /// The intermediate state root does not match the header.
    #[error("mismatched block state root: {0}")]
    StateRootMismatch(GotExpected<B256>),

    /// The derived logs bloom does not match the header.
    #[error("mismatched block logs bloom: {0}")]
    BloomMismatch(GotExpectedBoxed<Bloom>),

    /// The gas used by execution does not match the header.
    #[error("invalid gas used: {0}")]
    GasUsedMismatch(GotExpected<u64>),

    /// The matching-engine service could not be resolved.
    #[error("matching engine service is not available")]
    ServiceUnavailable,

    /// Match replay failed.
    #[error(transparent)]
    OrderBook(#[from] OrderBookError),

    /// A storage layer failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Rolling back a failed match replay itself failed. Supersedes the
    /// original error in severity but carries it.
    #[error("rollback failed while handling `{original}`: {source}")]
    RollbackFailed {
        /// The error that triggered the rollback.
        original: Box<ConsensusError>,
        /// The rollback failure.
        source: OrderBookError,
    },
}
