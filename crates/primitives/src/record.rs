//! Storage records and their canonical codec.
//!
//! Every value in the engine's key/value store is one of a closed set of
//! record variants. Encoding is canonical RLP; decoding is variant-directed:
//! the caller names the [`RecordKind`] it expects, there is no tag on the
//! wire. Changing the encoding of any variant is a consensus-breaking event.

use crate::order::{OrderBookItem, OrderItem, OrderListItem, OrderTreeItem};
use alloy_primitives::Bytes;
use alloy_rlp::{Decodable, RlpDecodable, RlpEncodable};

/// An opaque record, used for payloads the engine stores but does not
/// interpret.
#[derive(Debug, Clone, Default, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Item {
    /// The raw payload.
    pub data: Bytes,
}

/// A decoded store value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Opaque payload.
    Item(Item),
    /// A single order.
    Order(OrderItem),
    /// One price level of a book side.
    OrderList(OrderListItem),
    /// One side of a book.
    OrderTree(OrderTreeItem),
    /// Per-pair book metadata.
    OrderBook(OrderBookItem),
}

/// Names a [`Record`] variant for variant-directed decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// [`Record::Item`]
    Item,
    /// [`Record::Order`]
    Order,
    /// [`Record::OrderList`]
    OrderList,
    /// [`Record::OrderTree`]
    OrderTree,
    /// [`Record::OrderBook`]
    OrderBook,
}

/// Failure to decode record bytes into the expected variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The bytes are not a valid encoding of the expected variant.
    #[error("corrupt {kind:?} record: {source}")]
    Corrupt {
        /// The variant the caller expected.
        kind: RecordKind,
        /// The underlying decode failure.
        source: alloy_rlp::Error,
    },
}

impl Record {
    /// Returns the variant of this record.
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Item(_) => RecordKind::Item,
            Self::Order(_) => RecordKind::Order,
            Self::OrderList(_) => RecordKind::OrderList,
            Self::OrderTree(_) => RecordKind::OrderTree,
            Self::OrderBook(_) => RecordKind::OrderBook,
        }
    }

    /// Encodes the record canonically.
    ///
    /// The encoding carries no variant tag; readers must know the expected
    /// variant, see [`Self::decode`].
    pub fn encoded(&self) -> Vec<u8> {
        match self {
            Self::Item(item) => alloy_rlp::encode(item),
            Self::Order(order) => alloy_rlp::encode(order),
            Self::OrderList(list) => alloy_rlp::encode(list),
            Self::OrderTree(tree) => alloy_rlp::encode(tree),
            Self::OrderBook(book) => alloy_rlp::encode(book),
        }
    }

    /// Decodes `buf` as the given variant.
    ///
    /// Fails with [`CodecError::Corrupt`] if the bytes do not decode as the
    /// expected variant or leave trailing input.
    pub fn decode(buf: &[u8], kind: RecordKind) -> Result<Self, CodecError> {
        let mut buf = buf;
        let record = match kind {
            RecordKind::Item => Item::decode(&mut buf).map(Self::Item),
            RecordKind::Order => OrderItem::decode(&mut buf).map(Self::Order),
            RecordKind::OrderList => OrderListItem::decode(&mut buf).map(Self::OrderList),
            RecordKind::OrderTree => OrderTreeItem::decode(&mut buf).map(Self::OrderTree),
            RecordKind::OrderBook => OrderBookItem::decode(&mut buf).map(Self::OrderBook),
        }
        .map_err(|source| CodecError::Corrupt { kind, source })?;

        if !buf.is_empty() {
            return Err(CodecError::Corrupt { kind, source: alloy_rlp::Error::UnexpectedLength })
        }
        Ok(record)
    }

    /// Returns the inner order, if this is an [`Record::Order`].
    pub fn into_order(self) -> Option<OrderItem> {
        match self {
            Self::Order(order) => Some(order),
            _ => None,
        }
    }

    /// Returns the inner price level, if this is an [`Record::OrderList`].
    pub fn into_order_list(self) -> Option<OrderListItem> {
        match self {
            Self::OrderList(list) => Some(list),
            _ => None,
        }
    }

    /// Returns the inner tree, if this is an [`Record::OrderTree`].
    pub fn into_order_tree(self) -> Option<OrderTreeItem> {
        match self {
            Self::OrderTree(tree) => Some(tree),
            _ => None,
        }
    }

    /// Returns the inner book metadata, if this is an [`Record::OrderBook`].
    pub fn into_order_book(self) -> Option<OrderBookItem> {
        match self {
            Self::OrderBook(book) => Some(book),
            _ => None,
        }
    }
}

impl From<OrderItem> for Record {
    fn from(order: OrderItem) -> Self {
        Self::Order(order)
    }
}

impl From<OrderListItem> for Record {
    fn from(list: OrderListItem) -> Self {
        Self::OrderList(list)
    }
}

impl From<OrderTreeItem> for Record {
    fn from(tree: OrderTreeItem) -> Self {
        Self::OrderTree(tree)
    }
}

impl From<OrderBookItem> for Record {
    fn from(book: OrderBookItem) -> Self {
        Self::OrderBook(book)
    }
}
