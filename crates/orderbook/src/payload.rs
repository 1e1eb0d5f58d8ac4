//! The matched-order payload carried by matching transactions.

use crate::{book::OrderBook, error::OrderBookError};
use alloy_primitives::{Address, B256, U256};
use alloy_rlp::{Decodable, RlpDecodable, RlpEncodable};
use obex_primitives::{GotExpected, OrderItem, OrderStatus};
use obex_storage::KeyValueStore;

/// A fill the submitter claims the match will produce.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct PayloadTrade {
    /// Filled quantity, in base units.
    pub amount: U256,
    /// The counterparty whose resting order is consumed.
    pub counterparty: Address,
}

/// The body of a matching transaction: the submitted order, the book digests
/// the submitter observed before and expects after the match, and the trades
/// it claims will result. All four fields are required for validation.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct MatchPayload {
    /// The order being submitted.
    pub order: OrderItem,
    /// Book digest before the match.
    pub pre_digest: B256,
    /// Expected book digest after the match.
    pub post_digest: B256,
    /// Claimed fills.
    pub trades: Vec<PayloadTrade>,
}

impl MatchPayload {
    /// Decodes a payload from transaction data.
    pub fn decode(data: &[u8]) -> Result<Self, OrderBookError> {
        let mut buf = data;
        let payload =
            <Self as Decodable>::decode(&mut buf).map_err(OrderBookError::PayloadCorrupt)?;
        if !buf.is_empty() {
            return Err(OrderBookError::PayloadCorrupt(alloy_rlp::Error::UnexpectedLength))
        }
        Ok(payload)
    }

    /// Verifies the submitted order's integrity.
    pub fn verify_order(&self) -> Result<(), OrderBookError> {
        let order = &self.order;
        if order.pair.is_empty() {
            return Err(OrderBookError::OrderVerify("empty pair name"))
        }
        if order.base_token == order.quote_token {
            return Err(OrderBookError::OrderVerify("base and quote token are equal"))
        }
        if order.price.is_zero() {
            return Err(OrderBookError::OrderVerify("zero price"))
        }
        if order.quantity.is_zero() {
            return Err(OrderBookError::OrderVerify("zero quantity"))
        }
        if !order.filled.is_zero() || order.status != OrderStatus::Open {
            return Err(OrderBookError::OrderVerify("order is not fresh"))
        }
        if order.hash != order.compute_hash() {
            return Err(OrderBookError::OrderVerify("order hash mismatch"))
        }
        Ok(())
    }

    /// Recomputes the book's digest and checks it equals the declared
    /// pre-match digest.
    pub fn verify_old_state<DB: KeyValueStore>(
        &self,
        book: &OrderBook<DB>,
    ) -> Result<(), OrderBookError> {
        let digest = book.digest()?;
        if digest != self.pre_digest {
            return Err(OrderBookError::StatePreMismatch(GotExpected {
                got: digest,
                expected: self.pre_digest,
            }))
        }
        Ok(())
    }

    /// Recomputes the book's digest and checks it equals the declared
    /// post-match digest.
    pub fn verify_new_state<DB: KeyValueStore>(
        &self,
        book: &OrderBook<DB>,
    ) -> Result<(), OrderBookError> {
        let digest = book.digest()?;
        if digest != self.post_digest {
            return Err(OrderBookError::StatePostMismatch(GotExpected {
                got: digest,
                expected: self.post_digest,
            }))
        }
        Ok(())
    }
}
