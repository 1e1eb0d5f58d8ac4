//! Trade records produced by the matching engine.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_rlp::{BufMut, Decodable, Encodable, RlpDecodable, RlpEncodable};

/// Settlement state of a trade record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TradeStatus {
    /// The trade settled.
    #[default]
    Success = 0,
    /// The trade was reverted together with its block.
    Reverted = 1,
}

impl Encodable for TradeStatus {
    fn encode(&self, out: &mut dyn BufMut) {
        (*self as u8).encode(out)
    }

    fn length(&self) -> usize {
        (*self as u8).length()
    }
}

impl Decodable for TradeStatus {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        match u8::decode(buf)? {
            0 => Ok(Self::Success),
            1 => Ok(Self::Reverted),
            _ => Err(alloy_rlp::Error::Custom("invalid trade status")),
        }
    }
}

/// A single fill between two orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Trade {
    /// Filled quantity, in base units.
    pub amount: U256,
    /// Execution price.
    pub price: U256,
    /// Trading pair name.
    pub pair: String,
    /// Base token address.
    pub base_token: Address,
    /// Quote token address.
    pub quote_token: Address,
    /// Maker address.
    pub maker: Address,
    /// Taker address.
    pub taker: Address,
    /// Hash of the maker's order.
    pub maker_order_hash: B256,
    /// Hash of the taker's order.
    pub taker_order_hash: B256,
    /// Hash of the transaction the trade settled in.
    pub tx_hash: B256,
    /// Settlement state.
    pub status: TradeStatus,
    /// Hash over the trade's fields, see [`Self::compute_hash`].
    pub hash: B256,
}

impl Trade {
    /// Computes the hash over the trade's fields (excluding `hash` itself).
    pub fn compute_hash(&self) -> B256 {
        let mut buf = Vec::new();
        self.amount.encode(&mut buf);
        self.price.encode(&mut buf);
        self.pair.encode(&mut buf);
        self.maker.encode(&mut buf);
        self.taker.encode(&mut buf);
        self.maker_order_hash.encode(&mut buf);
        self.taker_order_hash.encode(&mut buf);
        self.tx_hash.encode(&mut buf);
        keccak256(&buf)
    }
}
