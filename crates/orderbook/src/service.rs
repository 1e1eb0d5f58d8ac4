//! The matching-engine service facade.
//!
//! [`MatchingService`] is what the block validator resolves from the
//! consensus engine: it hands out book handles bound to the service's
//! current store mode, tracks processed order hashes, records trades on SDK
//! nodes and restores pre-images when a block's match replay fails.

use crate::{
    book::OrderBook,
    error::OrderBookError,
    payload::MatchPayload,
};
use alloy_primitives::{Bytes, B256};
use obex_primitives::{Record, RecordKind, Trade};
use obex_storage::{KeyValueStore, StagedStore, StoreError, StoreMode};
use parking_lot::{Mutex, RwLock};
use std::{collections::HashSet, fmt::Debug, sync::Arc};
use tracing::{debug, trace};

/// Sink for trade records on SDK nodes.
///
/// The empty key means "append"; sinks are free to derive their own key from
/// the trade's hash.
pub trait TradeSink: Send + Sync + Debug {
    /// Stores a trade record.
    fn put(&self, key: &[u8], trade: &Trade) -> Result<(), StoreError>;
}

/// Discards every trade. Used on nodes that do not serve SDK queries.
#[derive(Debug, Clone, Copy, Default)]
#[non_exhaustive]
pub struct NoopTradeSink;

impl TradeSink for NoopTradeSink {
    fn put(&self, _key: &[u8], _trade: &Trade) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Pre-image data captured while replaying one matched order, consumed by
/// [`MatchingService::rollback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedRecord {
    /// Canonical encoding of the order that was replayed.
    pub order: Bytes,
    /// Canonical encoding of the best opposing price level before the match,
    /// captured when the payload claimed trades.
    pub level: Option<Bytes>,
}

/// The matching-engine service.
#[derive(Debug)]
pub struct MatchingService<DB> {
    store: Arc<StagedStore<DB>>,
    mode: RwLock<StoreMode>,
    processed: Mutex<HashSet<B256>>,
    sdk_node: bool,
    trade_db: Arc<dyn TradeSink>,
}

impl<DB: KeyValueStore> MatchingService<DB> {
    /// Creates a service over the given store, in direct mode, without an
    /// SDK trade sink.
    pub fn new(store: Arc<StagedStore<DB>>) -> Self {
        Self {
            store,
            mode: RwLock::new(StoreMode::Direct),
            processed: Mutex::new(HashSet::new()),
            sdk_node: false,
            trade_db: Arc::new(NoopTradeSink),
        }
    }

    /// Turns this service into an SDK node recording trades into `trade_db`.
    pub fn with_sdk_db(mut self, trade_db: Arc<dyn TradeSink>) -> Self {
        self.sdk_node = true;
        self.trade_db = trade_db;
        self
    }

    /// Returns the staged store backing this service.
    pub const fn store(&self) -> &Arc<StagedStore<DB>> {
        &self.store
    }

    /// Returns the store mode book handles are currently bound to.
    pub fn mode(&self) -> StoreMode {
        *self.mode.read()
    }

    /// Switches the store mode for subsequently opened book handles.
    ///
    /// The enclosing chain-insertion pipeline points the service at the
    /// overlay of the block under evaluation before validation and back to
    /// direct mode after promotion.
    pub fn set_mode(&self, mode: StoreMode) {
        *self.mode.write() = mode;
    }

    /// Returns a handle on `pair`'s book, bound to the current mode.
    pub fn order_book(&self, pair: &str) -> Result<OrderBook<DB>, OrderBookError> {
        Ok(OrderBook::new(Arc::clone(&self.store), self.mode(), pair.to_string()))
    }

    /// Marks an order hash as processed.
    ///
    /// Idempotent: marking a hash that is already processed is a no-op.
    pub fn mark_order_as_processed(&self, order_hash: B256) -> Result<(), OrderBookError> {
        if !self.processed.lock().insert(order_hash) {
            trace!(target: "orderbook::service", order = %order_hash, "order already processed");
        }
        Ok(())
    }

    /// Returns true if the order hash has been marked as processed.
    pub fn is_order_processed(&self, order_hash: B256) -> bool {
        self.processed.lock().contains(&order_hash)
    }

    /// Returns true if this node records trades for SDK consumers.
    pub const fn is_sdk_node(&self) -> bool {
        self.sdk_node
    }

    /// Returns the trade sink.
    pub fn trade_db(&self) -> &dyn TradeSink {
        &*self.trade_db
    }

    /// Restores the pre-image of every processed record, newest first.
    ///
    /// For each record: the replayed order is removed from the book if it
    /// rested, the snapshotted opposing level is written back, the pair's
    /// sequence is stepped back and the order's processed mark is cleared.
    /// After rolling back every record of a failed block the book state
    /// observable through the validator's mode equals the state before the
    /// block's first matched order.
    pub fn rollback(&self, records: &[ProcessedRecord]) -> Result<(), OrderBookError> {
        for record in records.iter().rev() {
            let order = Record::decode(&record.order, RecordKind::Order)?
                .into_order()
                .ok_or_else(|| {
                    OrderBookError::Engine("processed record does not hold an order".to_string())
                })?;
            let book = self.order_book(&order.pair)?;
            book.cancel_order(&order)?;
            if let Some(level) = &record.level {
                let level = Record::decode(level, RecordKind::OrderList)?
                    .into_order_list()
                    .ok_or_else(|| {
                        OrderBookError::Engine(
                            "processed record does not hold a price level".to_string(),
                        )
                    })?;
                book.restore_level(order.side.opposite(), level)?;
            }
            book.rewind_sequence()?;
            self.processed.lock().remove(&order.hash);
            debug!(target: "orderbook::service", order = %order.hash, "rolled back matched order");
        }
        Ok(())
    }

    /// Captures the rollback pre-image for `payload` before its order is
    /// processed: the encoded order plus, when the payload claims trades,
    /// the encoded best opposing level.
    pub fn capture_pre_image(
        &self,
        book: &OrderBook<DB>,
        payload: &MatchPayload,
    ) -> Result<ProcessedRecord, OrderBookError> {
        let level = if payload.trades.is_empty() {
            None
        } else {
            book.best_opposing_level(payload.order.side)?
                .map(|level| Bytes::from(alloy_rlp::encode(&level)))
        };
        Ok(ProcessedRecord { order: Bytes::from(alloy_rlp::encode(&payload.order)), level })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use obex_primitives::{OrderItem, OrderStatus, Side};
    use obex_storage::MemoryStore;

    const PAIR: &str = "OBX/USDT";

    fn order(side: Side, price: u64, quantity: u64, user: u8, nonce: u64) -> OrderItem {
        let mut order = OrderItem {
            pair: PAIR.to_string(),
            base_token: Address::new([0xaa; 20]),
            quote_token: Address::new([0xbb; 20]),
            side,
            price: U256::from(price),
            quantity: U256::from(quantity),
            status: OrderStatus::Open,
            user: Address::new([user; 20]),
            nonce,
            ..Default::default()
        };
        order.hash = order.compute_hash();
        order
    }

    fn service() -> MatchingService<MemoryStore> {
        MatchingService::new(Arc::new(StagedStore::new(MemoryStore::new())))
    }

    #[test]
    fn marking_is_idempotent() {
        let service = service();
        let hash = B256::new([1; 32]);
        assert!(!service.is_order_processed(hash));

        service.mark_order_as_processed(hash).unwrap();
        service.mark_order_as_processed(hash).unwrap();
        assert!(service.is_order_processed(hash));
    }

    #[test]
    fn rollback_restores_the_book() {
        let service = service();
        let book = service.order_book(PAIR).unwrap();

        let ask = order(Side::Ask, 100, 1, 1, 1);
        book.process_order(ask, true).unwrap();
        let before = book.digest().unwrap();
        let sequence = book.sequence().unwrap();

        // Replay a crossing bid the way the validator does: snapshot the
        // opposing level, process, mark.
        let bid = order(Side::Bid, 100, 1, 2, 2);
        let snapshot = book.best_opposing_level(bid.side).unwrap().unwrap();
        let record = ProcessedRecord {
            order: alloy_rlp::encode(&bid).into(),
            level: Some(alloy_rlp::encode(&snapshot).into()),
        };
        book.process_order(bid.clone(), true).unwrap();
        service.mark_order_as_processed(bid.hash).unwrap();
        assert_ne!(book.digest().unwrap(), before);

        service.rollback(&[record]).unwrap();
        assert_eq!(book.digest().unwrap(), before);
        assert_eq!(book.sequence().unwrap(), sequence);
        assert!(!service.is_order_processed(bid.hash));
        // The ask at 100 is back, the bid is absent.
        assert_eq!(book.best_price(Side::Ask).unwrap(), Some(U256::from(100u64)));
        assert_eq!(book.best_price(Side::Bid).unwrap(), None);
    }

    #[test]
    fn rollback_removes_a_rested_order() {
        let service = service();
        let book = service.order_book(PAIR).unwrap();

        let bid = order(Side::Bid, 100, 5, 1, 1);
        let before = book.digest().unwrap();
        let record = ProcessedRecord { order: alloy_rlp::encode(&bid).into(), level: None };
        book.process_order(bid, true).unwrap();

        service.rollback(&[record]).unwrap();
        assert_eq!(book.digest().unwrap(), before);
        assert_eq!(book.best_price(Side::Bid).unwrap(), None);
    }

    #[test]
    fn rollback_unwinds_newest_first() {
        let service = service();
        let book = service.order_book(PAIR).unwrap();

        book.process_order(order(Side::Ask, 100, 2, 1, 1), true).unwrap();
        let before = book.digest().unwrap();

        // Two partial fills against the same level, replayed back to back.
        let mut records = Vec::new();
        for (user, nonce) in [(2u8, 2u64), (3, 3)] {
            let bid = order(Side::Bid, 100, 1, user, nonce);
            let snapshot = book.best_opposing_level(bid.side).unwrap().unwrap();
            records.push(ProcessedRecord {
                order: alloy_rlp::encode(&bid).into(),
                level: Some(alloy_rlp::encode(&snapshot).into()),
            });
            book.process_order(bid, true).unwrap();
        }
        assert_ne!(book.digest().unwrap(), before);

        service.rollback(&records).unwrap();
        assert_eq!(book.digest().unwrap(), before);
        let level = book.price_level(Side::Ask, U256::from(100u64)).unwrap().unwrap();
        assert_eq!(level.quantity, U256::from(2u64));
    }
}
