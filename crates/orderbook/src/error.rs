use alloy_primitives::B256;
use obex_primitives::{CodecError, GotExpected};
use obex_storage::StoreError;

/// Errors produced by the matching engine and payload verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderBookError {
    /// The transaction payload is not a valid match payload encoding.
    #[error("match payload is corrupted: {0}")]
    PayloadCorrupt(alloy_rlp::Error),

    /// The submitted order failed verification.
    #[error("order verification failed: {0}")]
    OrderVerify(&'static str),

    /// The book digest before the match does not equal the digest the
    /// payload declares.
    #[error("pre-match book digest mismatch: {0}")]
    StatePreMismatch(GotExpected<B256>),

    /// The book digest after the match does not equal the digest the payload
    /// declares.
    #[error("post-match book digest mismatch: {0}")]
    StatePostMismatch(GotExpected<B256>),

    /// The engine observed inconsistent book records.
    #[error("matching engine failure: {0}")]
    Engine(String),

    /// A storage layer failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Record bytes failed to decode.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
