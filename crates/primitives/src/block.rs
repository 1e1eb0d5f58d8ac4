//! Block and header types.

use crate::transaction::Transaction;
use alloy_primitives::{keccak256, Bloom, B256};
use alloy_rlp::{RlpDecodable, RlpEncodable};

/// A block header.
///
/// Headers are assumed to be validated by the consensus engine before the
/// block validator sees them; the validator only re-derives the commitments
/// (`uncle_root`, `tx_root`, `receipt_root`, `state_root`, `bloom`) and
/// checks them against these fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Header {
    /// Hash of the parent block's header.
    pub parent_hash: B256,
    /// Commitment over the block's uncle headers.
    pub uncle_root: B256,
    /// Commitment over the block's ordered transaction list.
    pub tx_root: B256,
    /// Commitment over the receipts produced by executing the block.
    pub receipt_root: B256,
    /// State root after executing the block.
    pub state_root: B256,
    /// Aggregated logs bloom of the block's receipts.
    pub bloom: Bloom,
    /// Block height.
    pub number: u64,
    /// Gas limit of the block.
    pub gas_limit: u64,
    /// Gas used by all transactions in the block.
    pub gas_used: u64,
}

impl Header {
    /// Computes the hash of the header's canonical encoding.
    ///
    /// Recomputed on every call; callers that need the hash repeatedly should
    /// hold on to it.
    pub fn hash_slow(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }
}

/// A block: header, transactions and uncle headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    /// Block header.
    pub header: Header,
    /// Transactions in execution order.
    pub transactions: Vec<Transaction>,
    /// Uncle headers.
    pub uncles: Vec<Header>,
}

impl Block {
    /// Returns the block hash, i.e. the hash of its header.
    pub fn hash(&self) -> B256 {
        self.header.hash_slow()
    }

    /// Returns the block height.
    pub const fn number(&self) -> u64 {
        self.header.number
    }

    /// Returns the parent block's hash.
    pub const fn parent_hash(&self) -> B256 {
        self.header.parent_hash
    }

    /// Returns the block's gas limit.
    pub const fn gas_limit(&self) -> u64 {
        self.header.gas_limit
    }

    /// Returns the gas used by the block.
    pub const fn gas_used(&self) -> u64 {
        self.header.gas_used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_hash_is_deterministic() {
        let header = Header { number: 7, gas_limit: 8_000_000, ..Default::default() };
        assert_eq!(header.hash_slow(), header.hash_slow());

        let other = Header { number: 8, ..header.clone() };
        assert_ne!(header.hash_slow(), other.hash_slow());
    }

    #[test]
    fn block_hash_tracks_header() {
        let block = Block {
            header: Header { number: 3, ..Default::default() },
            ..Default::default()
        };
        assert_eq!(block.hash(), block.header.hash_slow());
        assert_eq!(block.number(), 3);
    }
}
