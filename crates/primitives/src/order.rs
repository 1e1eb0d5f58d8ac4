//! Order book domain types.
//!
//! The book for a pair is persisted as a set of records: one [`OrderBookItem`]
//! carrying the pair's metadata, one [`OrderTreeItem`] per side listing the
//! live price levels, and one [`OrderListItem`] per price level holding the
//! resting orders in time priority.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_rlp::{BufMut, Decodable, Encodable, RlpDecodable, RlpEncodable};

/// The side of the book an order belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Side {
    /// A buy order.
    #[default]
    Bid = 0,
    /// A sell order.
    Ask = 1,
}

impl Side {
    /// Returns the opposing side.
    pub const fn opposite(&self) -> Self {
        match self {
            Self::Bid => Self::Ask,
            Self::Ask => Self::Bid,
        }
    }
}

impl Encodable for Side {
    fn encode(&self, out: &mut dyn BufMut) {
        (*self as u8).encode(out)
    }

    fn length(&self) -> usize {
        (*self as u8).length()
    }
}

impl Decodable for Side {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        match u8::decode(buf)? {
            0 => Ok(Self::Bid),
            1 => Ok(Self::Ask),
            _ => Err(alloy_rlp::Error::Custom("invalid order side")),
        }
    }
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderStatus {
    /// Resting on the book, nothing filled yet.
    #[default]
    Open = 0,
    /// Some quantity filled, remainder resting.
    PartiallyFilled = 1,
    /// Fully filled and off the book.
    Filled = 2,
    /// Cancelled by its owner.
    Cancelled = 3,
    /// Rejected by the engine.
    Rejected = 4,
}

impl Encodable for OrderStatus {
    fn encode(&self, out: &mut dyn BufMut) {
        (*self as u8).encode(out)
    }

    fn length(&self) -> usize {
        (*self as u8).length()
    }
}

impl Decodable for OrderStatus {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        match u8::decode(buf)? {
            0 => Ok(Self::Open),
            1 => Ok(Self::PartiallyFilled),
            2 => Ok(Self::Filled),
            3 => Ok(Self::Cancelled),
            4 => Ok(Self::Rejected),
            _ => Err(alloy_rlp::Error::Custom("invalid order status")),
        }
    }
}

/// A single limit order.
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct OrderItem {
    /// Engine-assigned order id.
    pub order_id: u64,
    /// Trading pair name, e.g. `OBX/USDT`.
    pub pair: String,
    /// Base token address.
    pub base_token: Address,
    /// Quote token address.
    pub quote_token: Address,
    /// Side of the book.
    pub side: Side,
    /// Limit price, in quote units per base unit.
    pub price: U256,
    /// Total quantity, in base units.
    pub quantity: U256,
    /// Quantity filled so far.
    pub filled: U256,
    /// Lifecycle state.
    pub status: OrderStatus,
    /// Owner address.
    pub user: Address,
    /// Owner-scoped nonce.
    pub nonce: u64,
    /// Hash over the order's identity fields, see [`Self::compute_hash`].
    pub hash: B256,
}

impl OrderItem {
    /// Returns the quantity that is still open.
    pub fn open_quantity(&self) -> U256 {
        self.quantity - self.filled
    }

    /// Computes the hash over the order's identity fields.
    ///
    /// Must be stable across nodes: two peers deriving the hash for the same
    /// order must agree, so only canonical encodings go into the preimage.
    pub fn compute_hash(&self) -> B256 {
        let mut buf = Vec::new();
        self.user.encode(&mut buf);
        self.nonce.encode(&mut buf);
        self.pair.encode(&mut buf);
        self.base_token.encode(&mut buf);
        self.quote_token.encode(&mut buf);
        self.side.encode(&mut buf);
        self.price.encode(&mut buf);
        self.quantity.encode(&mut buf);
        keccak256(&buf)
    }
}

/// One price level of a book side: the orders resting at `price` in time
/// priority, head of the queue first.
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct OrderListItem {
    /// The level's price.
    pub price: U256,
    /// Total open quantity across the level's orders.
    pub quantity: U256,
    /// Resting orders, oldest first.
    pub orders: Vec<OrderItem>,
}

impl OrderListItem {
    /// Creates an empty level at the given price.
    pub const fn new(price: U256) -> Self {
        Self { price, quantity: U256::ZERO, orders: Vec::new() }
    }
}

/// One side of a book: the live price levels in ascending price order.
///
/// Max-first (bids) and min-first (asks) traversal are both derived from this
/// single canonical ordering, which keeps the encoding identical across
/// nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct OrderTreeItem {
    /// Live prices, ascending.
    pub prices: Vec<U256>,
    /// Total number of orders resting on this side.
    pub order_count: u64,
}

/// Per-pair book metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct OrderBookItem {
    /// Trading pair name.
    pub pair: String,
    /// Monotonic sequence, incremented once per processed order.
    pub sequence: u64,
}

impl OrderBookItem {
    /// Creates the initial book metadata for a pair.
    pub const fn new(pair: String) -> Self {
        Self { pair, sequence: 0 }
    }
}
