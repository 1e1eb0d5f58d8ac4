//! Transaction type at the validator boundary.

use crate::constants::MATCHING_ENGINE_ADDRESS;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};

/// A transaction as seen by the block validator.
///
/// Signing and execution of ordinary transactions are handled elsewhere; the
/// validator only needs the destination (to recognize matched-order
/// transactions), the payload bytes and the hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Transaction {
    /// Sender-scoped nonce.
    pub nonce: u64,
    /// Gas limit for the transaction.
    pub gas_limit: u64,
    /// Destination address.
    pub to: Address,
    /// Transferred value.
    pub value: U256,
    /// Call data. For matched-order transactions this is the encoded match
    /// payload.
    pub data: Bytes,
}

impl Transaction {
    /// Returns true if this transaction carries a matched-order payload,
    /// i.e. is directed at the matching-engine system address.
    pub fn is_matching_transaction(&self) -> bool {
        self.to == MATCHING_ENGINE_ADDRESS
    }

    /// Returns the transaction's payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Computes the hash of the transaction's canonical encoding.
    pub fn hash(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }
}
