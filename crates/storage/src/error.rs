use alloy_primitives::B256;
use obex_primitives::CodecError;

/// Errors produced by the storage layers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The key has no value in the consulted layers.
    #[error("key not found")]
    NotFound,

    /// The underlying persistent store failed.
    #[error("store i/o failure: {0}")]
    Io(String),

    /// A staged operation addressed an overlay that is not registered.
    #[error("no overlay registered for block {0}")]
    NoSuchOverlay(B256),

    /// Overlay initialization named a parent overlay that does not exist or
    /// is empty.
    #[error("cannot initialize overlay {hash}: parent overlay {parent} not found")]
    ParentOverlayNotFound {
        /// The overlay being initialized.
        hash: B256,
        /// The missing parent overlay.
        parent: B256,
    },

    /// An entry inherited from a parent overlay failed its encode/decode
    /// round-trip.
    #[error("cannot inherit into overlay {hash} from parent {parent}: {source}")]
    Inherit {
        /// The overlay being initialized.
        hash: B256,
        /// The parent overlay the entry came from.
        parent: B256,
        /// The round-trip failure.
        source: CodecError,
    },

    /// An overlay cache key was not valid hex.
    #[error("invalid overlay cache key: {0}")]
    InvalidCacheKey(String),

    /// Stored bytes failed to decode as the expected record variant.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
