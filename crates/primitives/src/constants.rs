//! Chain-wide constants and tunables.

use alloy_primitives::{Address, B256};

/// Maximum number of decoded records held by the hot cache and by each
/// per-block overlay.
pub const DEFAULT_CACHE_LIMIT: u32 = 1_024_000;

/// Maximum number of non-miner overlays kept alive at once. Once the limit is
/// reached, the oldest overlay is evicted (FIFO by creation).
pub const DRY_RUN_CACHE_LIMIT: usize = 200;

/// Minimum gas limit a block may declare.
pub const MIN_GAS_LIMIT: u64 = 5_000;

/// Gas limit the miner strategy steers towards when below it.
pub const TARGET_GAS_LIMIT: u64 = 4_712_388;

/// Divisor bounding per-block gas limit adjustments.
pub const GAS_LIMIT_BOUND_DIVISOR: u64 = 1_024;

/// The empty-key sentinel. Compares equal to a zero-length key and is never
/// stored; the trade sink interprets it as "append".
pub const EMPTY_KEY: [u8; 32] = [0; 32];

/// Distinguished overlay hash reserved for the miner's own staging overlay.
/// It is exempt from FIFO overlay eviction.
pub const MINER_OVERLAY_HASH: B256 = B256::new([0xff; 32]);

/// System address that matched-order transactions are directed to.
pub const MATCHING_ENGINE_ADDRESS: Address = Address::new([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x9a,
]);

/// Returns true if `key` is the empty-key sentinel.
pub fn is_empty_key(key: &[u8]) -> bool {
    key.is_empty() || key == EMPTY_KEY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_sentinel() {
        assert!(is_empty_key(&[]));
        assert!(is_empty_key(&EMPTY_KEY));
        assert!(!is_empty_key(&[0; 31]));
        assert!(!is_empty_key(b"book"));
    }
}
