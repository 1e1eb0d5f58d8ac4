//! End-to-end body validation scenarios driving the validator, the matching
//! service and the staged store together.

use alloy_primitives::{Address, B256, U256};
use assert_matches::assert_matches;
use obex_consensus::{
    test_utils::{MockChain, TestConsensus, VecSink},
    BlockValidator, ChainConfig, ConsensusError,
};
use obex_orderbook::{MatchPayload, MatchingService, OrderBookError, PayloadTrade, TradeSink};
use obex_primitives::{
    constants::MATCHING_ENGINE_ADDRESS, proofs, Block, Header, OrderItem, OrderStatus, Side,
    Transaction,
};
use obex_storage::{MemoryStore, StagedStore, StoreMode};
use std::sync::Arc;

const PAIR: &str = "OBX/USDT";

type Validator = BlockValidator<MockChain, TestConsensus, MemoryStore>;

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

fn claimed(amount: u64, counterparty: u8) -> PayloadTrade {
    PayloadTrade { amount: U256::from(amount), counterparty: Address::new([counterparty; 20]) }
}

#[allow(clippy::type_complexity)]
fn new_service() -> (Arc<StagedStore<MemoryStore>>, Arc<MatchingService<MemoryStore>>, Arc<VecSink>)
{
    let store = Arc::new(StagedStore::new(MemoryStore::new()));
    let sink = Arc::new(VecSink::new());
    let trade_db: Arc<dyn TradeSink> = sink.clone() as Arc<dyn TradeSink>;
    let service = Arc::new(MatchingService::new(Arc::clone(&store)).with_sdk_db(trade_db));
    (store, service, sink)
}

/// Seeds resting orders into canonical state through direct mode.
fn seed_book(service: &MatchingService<MemoryStore>, resting: &[OrderItem]) {
    let book = service.order_book(PAIR).unwrap();
    for order in resting {
        book.process_order(order.clone(), true).unwrap();
    }
}

/// Builds payloads with correct pre/post digests by replaying the orders on
/// a scratch overlay, in sequence.
fn build_payloads(
    service: &MatchingService<MemoryStore>,
    orders: &[(OrderItem, Vec<PayloadTrade>)],
) -> Vec<MatchPayload> {
    let scratch = B256::new([0xee; 32]);
    service.store().init_dry_run(scratch, None).unwrap();
    let previous_mode = service.mode();
    service.set_mode(StoreMode::Staged(scratch));

    let book = service.order_book(PAIR).unwrap();
    let mut payloads = Vec::new();
    for (order, trades) in orders {
        let pre_digest = book.digest().unwrap();
        book.process_order(order.clone(), true).unwrap();
        let post_digest = book.digest().unwrap();
        payloads.push(MatchPayload {
            order: order.clone(),
            pre_digest,
            post_digest,
            trades: trades.clone(),
        });
    }

    service.set_mode(previous_mode);
    service.store().drop_dry_run(scratch);
    payloads
}

fn match_tx(payload: &MatchPayload, nonce: u64) -> Transaction {
    Transaction {
        nonce,
        gas_limit: 500_000,
        to: MATCHING_ENGINE_ADDRESS,
        value: U256::ZERO,
        data: alloy_rlp::encode(payload).into(),
    }
}

fn sealed_block(number: u64, parent_hash: B256, transactions: Vec<Transaction>) -> Block {
    let mut block = Block {
        header: Header { parent_hash, number, gas_limit: 8_000_000, ..Default::default() },
        transactions,
        uncles: Vec::new(),
    };
    block.header.tx_root = proofs::calculate_transaction_root(&block.transactions);
    block.header.uncle_root = proofs::calculate_uncle_root(&block.uncles);
    block
}

/// A chain that knows the block's parent, with state.
fn chain_for(block: &Block) -> MockChain {
    let mut chain = MockChain::new();
    chain.insert_block_with_state(block.parent_hash(), block.number() - 1);
    chain
}

fn validator_with(chain: MockChain, service: Arc<MatchingService<MemoryStore>>) -> Validator {
    BlockValidator::new(ChainConfig::default(), chain, TestConsensus::default(), Some(service))
}

/// Registers a fresh overlay for the block and points the service at it.
fn stage_for_block(service: &MatchingService<MemoryStore>, block: &Block) -> B256 {
    let hash = block.hash();
    service.store().init_dry_run(hash, None).unwrap();
    service.set_mode(StoreMode::Staged(hash));
    hash
}

#[test]
fn known_block_is_rejected() {
    let (store, service, _sink) = new_service();
    let block = sealed_block(1, B256::new([1; 32]), Vec::new());

    let mut chain = MockChain::new();
    chain.insert_block_with_state(block.hash(), block.number());

    let validator = validator_with(chain, service);
    assert_matches!(validator.validate_body(&block), Err(ConsensusError::KnownBlock { .. }));
    // No overlay side effects.
    assert!(!store.has_dry_run(block.hash()));
}

#[test]
fn missing_ancestor_is_rejected() {
    let (_store, service, _sink) = new_service();
    let block = sealed_block(1, B256::new([1; 32]), Vec::new());

    let validator = validator_with(MockChain::new(), Arc::clone(&service));
    assert_matches!(
        validator.validate_body(&block),
        Err(ConsensusError::UnknownAncestor(hash)) if hash == block.parent_hash()
    );

    // A parent without state is pruned, not unknown.
    let mut chain = MockChain::new();
    chain.insert_block(block.parent_hash(), 0);
    let validator = validator_with(chain, service);
    assert_matches!(
        validator.validate_body(&block),
        Err(ConsensusError::PrunedAncestor(hash)) if hash == block.parent_hash()
    );
}

#[test]
fn uncle_root_mismatch_is_rejected() {
    let (_store, service, _sink) = new_service();
    let mut block = sealed_block(1, B256::new([1; 32]), Vec::new());
    block.header.uncle_root = B256::new([0xbb; 32]);

    let validator = validator_with(chain_for(&block), service);
    assert_matches!(
        validator.validate_body(&block),
        Err(ConsensusError::UncleRootMismatch(_))
    );
}

#[test]
fn engine_uncle_verification_is_delegated() {
    let (_store, service, _sink) = new_service();
    let block = sealed_block(1, B256::new([1; 32]), Vec::new());

    let engine = TestConsensus::default();
    engine.set_fail_uncles(true);
    let validator =
        BlockValidator::new(ChainConfig::default(), chain_for(&block), engine, Some(service));
    assert_matches!(
        validator.validate_body(&block),
        Err(ConsensusError::UncleRootMismatch(_))
    );
}

#[test]
fn transaction_root_mismatch_is_rejected() {
    let (_store, service, _sink) = new_service();
    let payload = MatchPayload {
        order: order(Side::Bid, 100, 1, 2, 1),
        pre_digest: B256::ZERO,
        post_digest: B256::ZERO,
        trades: Vec::new(),
    };
    let mut block = sealed_block(1, B256::new([1; 32]), vec![match_tx(&payload, 1)]);
    block.header.tx_root = B256::new([0xbb; 32]);

    let validator = validator_with(chain_for(&block), service);
    assert_matches!(validator.validate_body(&block), Err(ConsensusError::TxRootMismatch(_)));
}

#[test]
fn missing_service_is_fatal() {
    let block = sealed_block(1, B256::new([1; 32]), Vec::new());
    let validator: Validator =
        BlockValidator::new(ChainConfig::default(), chain_for(&block), TestConsensus::default(), None);
    assert_matches!(validator.validate_body(&block), Err(ConsensusError::ServiceUnavailable));
}

#[test]
fn corrupt_payload_is_rejected() {
    let (_store, service, _sink) = new_service();
    let tx = Transaction {
        nonce: 1,
        gas_limit: 500_000,
        to: MATCHING_ENGINE_ADDRESS,
        value: U256::ZERO,
        data: b"garbage".to_vec().into(),
    };
    let block = sealed_block(1, B256::new([1; 32]), vec![tx]);

    let chain = chain_for(&block);
    stage_for_block(&service, &block);
    let validator = validator_with(chain, service);
    assert_matches!(
        validator.validate_body(&block),
        Err(ConsensusError::OrderBook(OrderBookError::PayloadCorrupt(_)))
    );
}

#[test]
fn pre_state_mismatch_leaves_the_book_untouched() {
    let (_store, service, sink) = new_service();
    seed_book(&service, &[order(Side::Ask, 100, 1, 1, 1)]);

    let bid = order(Side::Bid, 100, 1, 2, 2);
    let mut payloads = build_payloads(&service, &[(bid, vec![claimed(1, 1)])]);
    let mut payload = payloads.remove(0);
    let actual_pre = payload.pre_digest;
    payload.pre_digest = B256::new([0xde; 32]);

    let block = sealed_block(1, B256::new([1; 32]), vec![match_tx(&payload, 1)]);
    let chain = chain_for(&block);
    stage_for_block(&service, &block);

    let validator = validator_with(chain, Arc::clone(&service));
    assert_matches!(
        validator.validate_body(&block),
        Err(ConsensusError::OrderBook(OrderBookError::StatePreMismatch(_)))
    );

    let book = service.order_book(PAIR).unwrap();
    assert_eq!(book.digest().unwrap(), actual_pre);
    assert!(sink.trades().is_empty());
}

#[test]
fn post_state_mismatch_triggers_rollback() {
    let (_store, service, sink) = new_service();
    seed_book(&service, &[order(Side::Ask, 100, 1, 1, 1)]);

    let bid = order(Side::Bid, 100, 1, 2, 2);
    let mut payloads = build_payloads(&service, &[(bid.clone(), vec![claimed(1, 1)])]);
    let mut payload = payloads.remove(0);
    let actual_pre = payload.pre_digest;
    payload.post_digest = B256::new([0xdd; 32]);

    let block = sealed_block(1, B256::new([1; 32]), vec![match_tx(&payload, 1)]);
    let chain = chain_for(&block);
    stage_for_block(&service, &block);

    let validator = validator_with(chain, Arc::clone(&service));
    assert_matches!(
        validator.validate_body(&block),
        Err(ConsensusError::OrderBook(OrderBookError::StatePostMismatch(_)))
    );

    // After rollback the bid is absent and the ask at 100 remains.
    let book = service.order_book(PAIR).unwrap();
    assert_eq!(book.digest().unwrap(), actual_pre);
    assert_eq!(book.best_price(Side::Ask).unwrap(), Some(U256::from(100u64)));
    assert_eq!(book.best_price(Side::Bid).unwrap(), None);
    assert!(!service.is_order_processed(bid.hash));
    assert!(sink.trades().is_empty());
}

#[test]
fn chain_of_three_matches_validates() {
    let (store, service, sink) = new_service();
    seed_book(
        &service,
        &[
            order(Side::Ask, 100, 1, 1, 1),
            order(Side::Ask, 101, 1, 3, 2),
            order(Side::Ask, 102, 1, 4, 3),
        ],
    );

    let bids = [
        (order(Side::Bid, 100, 1, 2, 4), vec![claimed(1, 1)]),
        (order(Side::Bid, 101, 1, 5, 5), vec![claimed(1, 3)]),
        (order(Side::Bid, 102, 1, 6, 6), vec![claimed(1, 4)]),
    ];
    let payloads = build_payloads(&service, &bids);
    let transactions =
        payloads.iter().enumerate().map(|(i, p)| match_tx(p, i as u64 + 1)).collect();

    let block = sealed_block(1, B256::new([1; 32]), transactions);
    let chain = chain_for(&block);
    let block_hash = stage_for_block(&service, &block);

    let validator = validator_with(chain, Arc::clone(&service));
    validator.validate_body(&block).unwrap();

    // Exactly three trade records reached the sink, one per claimed trade.
    let trades = sink.trades();
    assert_eq!(trades.len(), 3);
    for ((trade, (bid, _)), tx) in trades.iter().zip(&bids).zip(&block.transactions) {
        assert_eq!(trade.amount, U256::from(1u64));
        assert_eq!(trade.maker_order_hash, bid.hash);
        // The taker field carries the submitted order's hash until the
        // payload schema learns the resting order's hash.
        assert_eq!(trade.taker_order_hash, bid.hash);
        assert_eq!(trade.tx_hash, tx.hash());
    }

    // The book's final digest equals the last declared post-digest.
    let book = service.order_book(PAIR).unwrap();
    assert_eq!(book.digest().unwrap(), payloads[2].post_digest);
    for (bid, _) in &bids {
        assert!(service.is_order_processed(bid.hash));
    }

    // Promotion makes the result visible to direct reads.
    store.save_dry_run(block_hash).unwrap();
    service.set_mode(StoreMode::Direct);
    let book = service.order_book(PAIR).unwrap();
    assert_eq!(book.digest().unwrap(), payloads[2].post_digest);
    store.drop_dry_run(block_hash);
}

#[test]
fn mid_loop_failure_restores_the_initial_state() {
    let (_store, service, sink) = new_service();
    seed_book(
        &service,
        &[
            order(Side::Ask, 100, 1, 1, 1),
            order(Side::Ask, 101, 1, 3, 2),
            order(Side::Ask, 102, 1, 4, 3),
        ],
    );
    let initial_sequence = 3;

    let bids = [
        (order(Side::Bid, 100, 1, 2, 4), vec![claimed(1, 1)]),
        (order(Side::Bid, 101, 1, 5, 5), vec![claimed(1, 3)]),
        (order(Side::Bid, 102, 1, 6, 6), vec![claimed(1, 4)]),
    ];
    let mut payloads = build_payloads(&service, &bids);
    let initial_digest = payloads[0].pre_digest;
    // The third payload declares a wrong post-state.
    payloads[2].post_digest = B256::new([0xdd; 32]);

    let transactions =
        payloads.iter().enumerate().map(|(i, p)| match_tx(p, i as u64 + 1)).collect();
    let block = sealed_block(1, B256::new([1; 32]), transactions);
    let chain = chain_for(&block);
    stage_for_block(&service, &block);

    let validator = validator_with(chain, Arc::clone(&service));
    assert_matches!(
        validator.validate_body(&block),
        Err(ConsensusError::OrderBook(OrderBookError::StatePostMismatch(_)))
    );

    // Every replayed order was unwound: the book observable through the
    // overlay is back to its state before the first transaction.
    let book = service.order_book(PAIR).unwrap();
    assert_eq!(book.digest().unwrap(), initial_digest);
    assert_eq!(book.sequence().unwrap(), initial_sequence);
    assert_eq!(book.best_price(Side::Ask).unwrap(), Some(U256::from(100u64)));
    for (bid, _) in &bids {
        assert!(!service.is_order_processed(bid.hash));
    }
    // Trades of the two successful replays had already been emitted; the
    // sink is not rolled back.
    assert_eq!(sink.trades().len(), 2);
}
