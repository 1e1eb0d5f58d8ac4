//! Helper functions for deriving the header commitments.
//!
//! This chain commits to ordered lists (transactions, uncles, receipts) with
//! the keccak hash of the RLP encoding of the list of element hashes. The
//! encoding is canonical, so the commitments are identical across nodes.

use crate::{block::Header, receipt::Receipt, transaction::Transaction};
use alloy_primitives::{keccak256, Bloom, B256};

/// Commits to an ordered sequence of element hashes.
pub fn ordered_root(hashes: impl IntoIterator<Item = B256>) -> B256 {
    let hashes: Vec<B256> = hashes.into_iter().collect();
    keccak256(alloy_rlp::encode(&hashes))
}

/// Derives the `tx_root` commitment over the block's ordered transaction
/// list.
pub fn calculate_transaction_root(transactions: &[Transaction]) -> B256 {
    ordered_root(transactions.iter().map(Transaction::hash))
}

/// Derives the `uncle_root` commitment over the block's uncle headers.
pub fn calculate_uncle_root(uncles: &[Header]) -> B256 {
    ordered_root(uncles.iter().map(Header::hash_slow))
}

/// Derives the `receipt_root` commitment over the block's receipts.
pub fn calculate_receipt_root(receipts: &[Receipt]) -> B256 {
    ordered_root(receipts.iter().map(|receipt| keccak256(alloy_rlp::encode(receipt))))
}

/// Folds the logs of all receipts into the block's bloom filter.
pub fn calculate_log_bloom(receipts: &[Receipt]) -> Bloom {
    receipts.iter().fold(Bloom::ZERO, |bloom, receipt| bloom | receipt.bloom())
}
