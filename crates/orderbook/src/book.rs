//! The per-pair order book.
//!
//! A book is two sides, each a set of price levels with the resting orders
//! in time priority. All of it is stored as records in the staged store, so
//! a book handle bound to a staged mode mutates only that block's overlay
//! and a handle bound to direct mode mutates canonical state.
//!
//! Record layout per pair:
//!
//! - `<pair>/book`: [`OrderBookItem`], pair metadata and sequence
//! - `<pair>/bids`, `<pair>/asks`: [`OrderTreeItem`], live prices per side
//! - `<pair>/bids/<price>`, `<pair>/asks/<price>`: [`OrderListItem`], the
//!   FIFO of orders resting at one price

use crate::error::OrderBookError;
use alloy_primitives::{keccak256, B256, U256};
use alloy_rlp::Encodable;
use obex_primitives::{
    OrderBookItem, OrderItem, OrderListItem, OrderStatus, OrderTreeItem, Record, RecordKind, Side,
    Trade, TradeStatus,
};
use obex_storage::{KeyValueStore, StagedStore, StoreError, StoreMode};
use std::sync::Arc;
use tracing::trace;

/// The result of processing one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Fills produced by the match, in execution order.
    pub trades: Vec<Trade>,
    /// The remainder that rested on the book, if the order was not fully
    /// filled.
    pub resting: Option<OrderItem>,
}

impl MatchOutcome {
    /// Returns true if the order was fully filled.
    pub const fn is_fully_filled(&self) -> bool {
        self.resting.is_none()
    }
}

fn side_name(side: Side) -> &'static str {
    match side {
        Side::Bid => "bids",
        Side::Ask => "asks",
    }
}

fn book_key(pair: &str) -> Vec<u8> {
    format!("{pair}/book").into_bytes()
}

fn tree_key(pair: &str, side: Side) -> Vec<u8> {
    format!("{pair}/{}", side_name(side)).into_bytes()
}

fn level_key(pair: &str, side: Side, price: U256) -> Vec<u8> {
    let mut key = format!("{pair}/{}/", side_name(side)).into_bytes();
    key.extend_from_slice(&price.to_be_bytes::<32>());
    key
}

/// Returns the best price of a side: highest for bids, lowest for asks.
///
/// `prices` is kept ascending, so both are ends of the vector.
fn best_price_of(tree: &OrderTreeItem, side: Side) -> Option<U256> {
    match side {
        Side::Bid => tree.prices.last().copied(),
        Side::Ask => tree.prices.first().copied(),
    }
}

/// Returns true if an incoming order at `limit` crosses the opposing side's
/// `best` price.
fn crosses(side: Side, limit: U256, best: U256) -> bool {
    match side {
        Side::Bid => best <= limit,
        Side::Ask => best >= limit,
    }
}

/// A handle on one pair's book, bound to a store mode.
///
/// The mode is captured when the handle is created; every read and write of
/// this handle goes through it.
#[derive(Debug)]
pub struct OrderBook<DB> {
    store: Arc<StagedStore<DB>>,
    mode: StoreMode,
    pair: String,
}

impl<DB: KeyValueStore> OrderBook<DB> {
    /// Creates a handle on `pair`'s book in the given mode.
    ///
    /// The book's records are created lazily on first mutation; opening a
    /// handle performs no I/O.
    pub const fn new(store: Arc<StagedStore<DB>>, mode: StoreMode, pair: String) -> Self {
        Self { store, mode, pair }
    }

    /// Returns the pair this handle is bound to.
    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Returns the store mode this handle is bound to.
    pub const fn mode(&self) -> StoreMode {
        self.mode
    }

    /// Returns the pair's current sequence number.
    pub fn sequence(&self) -> Result<u64, OrderBookError> {
        Ok(self.read_book()?.sequence)
    }

    /// Returns the best price on `side`, if the side is non-empty.
    pub fn best_price(&self, side: Side) -> Result<Option<U256>, OrderBookError> {
        Ok(best_price_of(&self.read_tree(side)?, side))
    }

    /// Returns the price level at `price` on `side`, if present.
    pub fn price_level(
        &self,
        side: Side,
        price: U256,
    ) -> Result<Option<OrderListItem>, OrderBookError> {
        self.read_level(side, price)
    }

    /// Returns the price level an order arriving on `side` would match
    /// against first: the best ask level for a bid, the best bid level for an
    /// ask.
    pub fn best_opposing_level(
        &self,
        side: Side,
    ) -> Result<Option<OrderListItem>, OrderBookError> {
        let opposing = side.opposite();
        match best_price_of(&self.read_tree(opposing)?, opposing) {
            Some(price) => self.read_level(opposing, price),
            None => Ok(None),
        }
    }

    /// Computes the book digest: the keccak hash of the canonical
    /// serialization of both sides, bids first, each tree followed by its
    /// levels in ascending price order.
    pub fn digest(&self) -> Result<B256, OrderBookError> {
        let mut buf = Vec::new();
        for side in [Side::Bid, Side::Ask] {
            let tree = self.read_tree(side)?;
            tree.encode(&mut buf);
            for price in &tree.prices {
                let level = self.read_level(side, *price)?.ok_or_else(|| {
                    OrderBookError::Engine(format!("missing level for tracked price {price}"))
                })?;
                level.encode(&mut buf);
            }
        }
        Ok(keccak256(&buf))
    }

    /// Matches `order` against the opposing side in price-time priority.
    ///
    /// Fills are taken from the best opposing level first, oldest order
    /// first. Any remainder rests on the order's own side. The pair sequence
    /// advances by one. Deterministic: identical book state and order yield
    /// identical trades and post-state on every node.
    ///
    /// With `commit` set, the resulting book state is written through this
    /// handle's mode; without it, the outcome is computed but nothing is
    /// written (pure simulation).
    pub fn process_order(
        &self,
        order: OrderItem,
        commit: bool,
    ) -> Result<MatchOutcome, OrderBookError> {
        let opposing = order.side.opposite();
        let mut book = self.read_book()?;
        let mut opp_tree = self.read_tree(opposing)?;

        let mut remaining = order.open_quantity();
        let mut trades = Vec::new();
        let mut updated_levels: Vec<OrderListItem> = Vec::new();
        let mut cleared_prices: Vec<U256> = Vec::new();

        while remaining > U256::ZERO {
            let Some(best) = best_price_of(&opp_tree, opposing) else { break };
            if !crosses(order.side, order.price, best) {
                break
            }

            let mut level = self.read_level(opposing, best)?.ok_or_else(|| {
                OrderBookError::Engine(format!("missing level for tracked price {best}"))
            })?;

            while remaining > U256::ZERO && !level.orders.is_empty() {
                let fill = {
                    let maker = &mut level.orders[0];
                    let fill = maker.open_quantity().min(remaining);
                    maker.filled += fill;
                    maker.status = if maker.open_quantity().is_zero() {
                        OrderStatus::Filled
                    } else {
                        OrderStatus::PartiallyFilled
                    };
                    fill
                };
                remaining -= fill;
                level.quantity -= fill;

                let maker = &level.orders[0];
                let maker_done = maker.open_quantity().is_zero();
                trades.push(self.fill_trade(maker, &order, fill, level.price));
                trace!(
                    target: "orderbook",
                    pair = %self.pair,
                    price = %level.price,
                    amount = %fill,
                    "matched order"
                );
                if maker_done {
                    level.orders.remove(0);
                    opp_tree.order_count = opp_tree.order_count.saturating_sub(1);
                }
            }

            if level.orders.is_empty() {
                cleared_prices.push(best);
                opp_tree.prices.retain(|price| *price != best);
            } else {
                updated_levels.push(level);
            }
        }

        let matched = order.open_quantity() - remaining;
        let mut resting = None;
        let mut own_updates = None;
        if remaining > U256::ZERO {
            let mut rested = order.clone();
            rested.filled = order.filled + matched;
            rested.status = if matched.is_zero() {
                OrderStatus::Open
            } else {
                OrderStatus::PartiallyFilled
            };

            let mut own_tree = self.read_tree(order.side)?;
            let mut own_level = self
                .read_level(order.side, order.price)?
                .unwrap_or_else(|| OrderListItem::new(order.price));
            own_level.quantity += remaining;
            own_level.orders.push(rested.clone());
            if !own_tree.prices.contains(&order.price) {
                let pos = own_tree.prices.partition_point(|price| *price < order.price);
                own_tree.prices.insert(pos, order.price);
            }
            own_tree.order_count += 1;

            resting = Some(rested);
            own_updates = Some((own_tree, own_level));
        }

        book.sequence += 1;

        if commit {
            for price in &cleared_prices {
                self.delete_level(opposing, *price)?;
            }
            for level in &updated_levels {
                self.write_level(opposing, level)?;
            }
            if !cleared_prices.is_empty() || !updated_levels.is_empty() {
                self.write_tree(opposing, &opp_tree)?;
            }
            if let Some((own_tree, own_level)) = &own_updates {
                self.write_level(order.side, own_level)?;
                self.write_tree(order.side, own_tree)?;
            }
            self.write_book(&book)?;
        }

        Ok(MatchOutcome { trades, resting })
    }

    /// Removes a resting order from the book.
    ///
    /// Returns true if the order was found (by hash, at its side and price)
    /// and removed.
    pub fn cancel_order(&self, order: &OrderItem) -> Result<bool, OrderBookError> {
        let Some(mut level) = self.read_level(order.side, order.price)? else { return Ok(false) };
        let Some(pos) = level.orders.iter().position(|resting| resting.hash == order.hash) else {
            return Ok(false)
        };
        let removed = level.orders.remove(pos);
        level.quantity -= removed.open_quantity();

        let mut tree = self.read_tree(order.side)?;
        tree.order_count = tree.order_count.saturating_sub(1);
        if level.orders.is_empty() {
            self.delete_level(order.side, level.price)?;
            tree.prices.retain(|price| *price != level.price);
        } else {
            self.write_level(order.side, &level)?;
        }
        self.write_tree(order.side, &tree)?;
        trace!(target: "orderbook", pair = %self.pair, order = %order.hash, "cancelled order");
        Ok(true)
    }

    /// Overwrites the level at `level.price` on `side` with the given
    /// pre-image, re-registering its price in the side's tree.
    pub(crate) fn restore_level(
        &self,
        side: Side,
        level: OrderListItem,
    ) -> Result<(), OrderBookError> {
        let mut tree = self.read_tree(side)?;
        let current_orders =
            self.read_level(side, level.price)?.map_or(0, |current| current.orders.len() as u64);
        tree.order_count = tree.order_count.saturating_sub(current_orders) + level.orders.len() as u64;
        if !tree.prices.contains(&level.price) {
            let pos = tree.prices.partition_point(|price| *price < level.price);
            tree.prices.insert(pos, level.price);
        }
        self.write_level(side, &level)?;
        self.write_tree(side, &tree)
    }

    /// Steps the pair sequence back by one.
    pub(crate) fn rewind_sequence(&self) -> Result<(), OrderBookError> {
        let mut book = self.read_book()?;
        book.sequence = book.sequence.saturating_sub(1);
        self.write_book(&book)
    }

    fn fill_trade(&self, maker: &OrderItem, taker: &OrderItem, amount: U256, price: U256) -> Trade {
        let mut trade = Trade {
            amount,
            price,
            pair: self.pair.clone(),
            base_token: taker.base_token,
            quote_token: taker.quote_token,
            maker: maker.user,
            taker: taker.user,
            maker_order_hash: maker.hash,
            taker_order_hash: taker.hash,
            tx_hash: B256::ZERO,
            status: TradeStatus::Success,
            hash: B256::ZERO,
        };
        trade.hash = trade.compute_hash();
        trade
    }

    fn read_book(&self) -> Result<OrderBookItem, OrderBookError> {
        match self.store.get(&book_key(&self.pair), RecordKind::OrderBook, self.mode) {
            Ok(record) => record
                .into_order_book()
                .ok_or_else(|| OrderBookError::Engine("book record has wrong variant".to_string())),
            Err(StoreError::NotFound) => Ok(OrderBookItem::new(self.pair.clone())),
            Err(err) => Err(err.into()),
        }
    }

    fn read_tree(&self, side: Side) -> Result<OrderTreeItem, OrderBookError> {
        match self.store.get(&tree_key(&self.pair, side), RecordKind::OrderTree, self.mode) {
            Ok(record) => record
                .into_order_tree()
                .ok_or_else(|| OrderBookError::Engine("tree record has wrong variant".to_string())),
            Err(StoreError::NotFound) => Ok(OrderTreeItem::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn read_level(
        &self,
        side: Side,
        price: U256,
    ) -> Result<Option<OrderListItem>, OrderBookError> {
        match self.store.get(&level_key(&self.pair, side, price), RecordKind::OrderList, self.mode)
        {
            Ok(record) => record
                .into_order_list()
                .map(Some)
                .ok_or_else(|| OrderBookError::Engine("level record has wrong variant".to_string())),
            Err(StoreError::NotFound) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write_book(&self, book: &OrderBookItem) -> Result<(), OrderBookError> {
        Ok(self.store.put(&book_key(&self.pair), Record::OrderBook(book.clone()), self.mode)?)
    }

    fn write_tree(&self, side: Side, tree: &OrderTreeItem) -> Result<(), OrderBookError> {
        Ok(self.store.put(
            &tree_key(&self.pair, side),
            Record::OrderTree(tree.clone()),
            self.mode,
        )?)
    }

    fn write_level(&self, side: Side, level: &OrderListItem) -> Result<(), OrderBookError> {
        Ok(self.store.put(
            &level_key(&self.pair, side, level.price),
            Record::OrderList(level.clone()),
            self.mode,
        )?)
    }

    fn delete_level(&self, side: Side, price: U256) -> Result<(), OrderBookError> {
        Ok(self.store.delete(&level_key(&self.pair, side, price), self.mode)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use obex_storage::MemoryStore;

    const PAIR: &str = "OBX/USDT";

    fn order(side: Side, price: u64, quantity: u64, user: u8, nonce: u64) -> OrderItem {
        let mut order = OrderItem {
            order_id: nonce,
            pair: PAIR.to_string(),
            base_token: Address::new([0xaa; 20]),
            quote_token: Address::new([0xbb; 20]),
            side,
            price: U256::from(price),
            quantity: U256::from(quantity),
            filled: U256::ZERO,
            status: OrderStatus::Open,
            user: Address::new([user; 20]),
            nonce,
            hash: B256::ZERO,
        };
        order.hash = order.compute_hash();
        order
    }

    fn book() -> OrderBook<MemoryStore> {
        let store = Arc::new(StagedStore::new(MemoryStore::new()));
        OrderBook::new(store, StoreMode::Direct, PAIR.to_string())
    }

    #[test]
    fn unmatched_order_rests_on_its_side() {
        let book = book();
        let outcome = book.process_order(order(Side::Bid, 100, 5, 1, 1), true).unwrap();

        assert!(outcome.trades.is_empty());
        let rested = outcome.resting.unwrap();
        assert_eq!(rested.status, OrderStatus::Open);
        assert_eq!(book.best_price(Side::Bid).unwrap(), Some(U256::from(100u64)));
        assert_eq!(book.best_price(Side::Ask).unwrap(), None);
        assert_eq!(book.sequence().unwrap(), 1);
    }

    #[test]
    fn crossing_order_fills_at_the_resting_price() {
        let book = book();
        book.process_order(order(Side::Ask, 100, 5, 1, 1), true).unwrap();

        let outcome = book.process_order(order(Side::Bid, 105, 5, 2, 2), true).unwrap();
        assert!(outcome.is_fully_filled());
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].price, U256::from(100u64));
        assert_eq!(outcome.trades[0].amount, U256::from(5u64));

        // Both sides are empty again.
        assert_eq!(book.best_price(Side::Ask).unwrap(), None);
        assert_eq!(book.best_price(Side::Bid).unwrap(), None);
    }

    #[test]
    fn fills_follow_time_priority_within_a_level() {
        let book = book();
        book.process_order(order(Side::Ask, 100, 3, 1, 1), true).unwrap();
        book.process_order(order(Side::Ask, 100, 3, 2, 2), true).unwrap();

        let outcome = book.process_order(order(Side::Bid, 100, 4, 3, 3), true).unwrap();
        assert_eq!(outcome.trades.len(), 2);
        // The older ask fills first and fully; the newer one partially.
        assert_eq!(outcome.trades[0].maker, Address::new([1; 20]));
        assert_eq!(outcome.trades[0].amount, U256::from(3u64));
        assert_eq!(outcome.trades[1].maker, Address::new([2; 20]));
        assert_eq!(outcome.trades[1].amount, U256::from(1u64));

        let level = book.price_level(Side::Ask, U256::from(100u64)).unwrap().unwrap();
        assert_eq!(level.orders.len(), 1);
        assert_eq!(level.orders[0].status, OrderStatus::PartiallyFilled);
        assert_eq!(level.quantity, U256::from(2u64));
    }

    #[test]
    fn fills_walk_price_levels_best_first() {
        let book = book();
        book.process_order(order(Side::Ask, 101, 1, 1, 1), true).unwrap();
        book.process_order(order(Side::Ask, 100, 1, 2, 2), true).unwrap();

        let outcome = book.process_order(order(Side::Bid, 101, 2, 3, 3), true).unwrap();
        assert_eq!(outcome.trades.len(), 2);
        assert_eq!(outcome.trades[0].price, U256::from(100u64));
        assert_eq!(outcome.trades[1].price, U256::from(101u64));
        assert!(outcome.is_fully_filled());
    }

    #[test]
    fn partial_fill_rests_the_remainder() {
        let book = book();
        book.process_order(order(Side::Ask, 100, 2, 1, 1), true).unwrap();

        let outcome = book.process_order(order(Side::Bid, 100, 5, 2, 2), true).unwrap();
        assert_eq!(outcome.trades.len(), 1);
        let rested = outcome.resting.unwrap();
        assert_eq!(rested.status, OrderStatus::PartiallyFilled);
        assert_eq!(rested.filled, U256::from(2u64));

        assert_eq!(book.best_price(Side::Bid).unwrap(), Some(U256::from(100u64)));
        let level = book.price_level(Side::Bid, U256::from(100u64)).unwrap().unwrap();
        assert_eq!(level.quantity, U256::from(3u64));
    }

    #[test]
    fn non_crossing_prices_do_not_match() {
        let book = book();
        book.process_order(order(Side::Ask, 101, 1, 1, 1), true).unwrap();

        let outcome = book.process_order(order(Side::Bid, 100, 1, 2, 2), true).unwrap();
        assert!(outcome.trades.is_empty());
        assert!(outcome.resting.is_some());
        assert_eq!(book.best_price(Side::Ask).unwrap(), Some(U256::from(101u64)));
        assert_eq!(book.best_price(Side::Bid).unwrap(), Some(U256::from(100u64)));
    }

    #[test]
    fn simulation_writes_nothing() {
        let book = book();
        book.process_order(order(Side::Ask, 100, 1, 1, 1), true).unwrap();
        let digest = book.digest().unwrap();
        let sequence = book.sequence().unwrap();

        let outcome = book.process_order(order(Side::Bid, 100, 1, 2, 2), false).unwrap();
        assert_eq!(outcome.trades.len(), 1);

        assert_eq!(book.digest().unwrap(), digest);
        assert_eq!(book.sequence().unwrap(), sequence);
    }

    #[test]
    fn replay_is_deterministic() {
        let run = || {
            let book = book();
            book.process_order(order(Side::Ask, 100, 3, 1, 1), true).unwrap();
            book.process_order(order(Side::Ask, 101, 2, 2, 2), true).unwrap();
            let outcome = book.process_order(order(Side::Bid, 101, 4, 3, 3), true).unwrap();
            (outcome, book.digest().unwrap())
        };
        let (first_outcome, first_digest) = run();
        let (second_outcome, second_digest) = run();
        assert_eq!(first_outcome, second_outcome);
        assert_eq!(first_digest, second_digest);
    }

    #[test]
    fn digest_changes_with_every_mutation() {
        let book = book();
        let empty = book.digest().unwrap();

        book.process_order(order(Side::Ask, 100, 1, 1, 1), true).unwrap();
        let one_ask = book.digest().unwrap();
        assert_ne!(empty, one_ask);

        book.process_order(order(Side::Bid, 100, 1, 2, 2), true).unwrap();
        let matched = book.digest().unwrap();
        assert_ne!(one_ask, matched);
        // The match emptied the book again, but digests of distinct tree
        // states (fresh vs. written-empty) still agree.
        assert_eq!(matched, empty);
    }

    #[test]
    fn cancel_removes_a_resting_order() {
        let book = book();
        let ask = order(Side::Ask, 100, 1, 1, 1);
        book.process_order(ask.clone(), true).unwrap();

        assert!(book.cancel_order(&ask).unwrap());
        assert_eq!(book.best_price(Side::Ask).unwrap(), None);
        // Cancelling again finds nothing.
        assert!(!book.cancel_order(&ask).unwrap());
    }

    #[test]
    fn staged_mode_keeps_canonical_state_untouched() {
        let store = Arc::new(StagedStore::new(MemoryStore::new()));
        let direct = OrderBook::new(Arc::clone(&store), StoreMode::Direct, PAIR.to_string());
        direct.process_order(order(Side::Ask, 100, 1, 1, 1), true).unwrap();
        let canonical = direct.digest().unwrap();

        let block_hash = B256::new([1; 32]);
        store.init_dry_run(block_hash, None).unwrap();
        let staged =
            OrderBook::new(Arc::clone(&store), StoreMode::Staged(block_hash), PAIR.to_string());
        // The staged handle sees canonical state through the overlay.
        assert_eq!(staged.digest().unwrap(), canonical);

        staged.process_order(order(Side::Bid, 100, 1, 2, 2), true).unwrap();
        assert_ne!(staged.digest().unwrap(), canonical);
        assert_eq!(direct.digest().unwrap(), canonical);
    }
}
