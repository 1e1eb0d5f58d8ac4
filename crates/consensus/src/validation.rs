//! Block body and state validation.

use crate::{
    config::ChainConfig,
    error::ConsensusError,
    traits::{ChainProvider, Consensus, StateProvider},
};
use alloy_primitives::B256;
use obex_orderbook::{MatchPayload, MatchingService, ProcessedRecord};
use obex_primitives::{
    constants::{EMPTY_KEY, GAS_LIMIT_BOUND_DIVISOR, MIN_GAS_LIMIT, TARGET_GAS_LIMIT},
    proofs, Block, GotExpected, Receipt, Trade, TradeStatus, Transaction,
};
use obex_storage::KeyValueStore;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Validates block bodies and post-execution state.
///
/// Headers are assumed to be already validated. Body validation checks the
/// block's structural commitments and replays every matched-order payload
/// against the authoritative book; on any failure the replayed orders are
/// rolled back before the error surfaces. Overlay promotion is performed by
/// the enclosing chain-insertion pipeline, not here.
#[derive(Debug)]
pub struct BlockValidator<P, C, DB> {
    /// Chain configuration options.
    config: ChainConfig,
    /// Canonical chain access.
    chain: P,
    /// Consensus engine used for uncle validation.
    engine: C,
    /// The matching-engine service, if one is registered.
    service: Option<Arc<MatchingService<DB>>>,
}

impl<P, C, DB> BlockValidator<P, C, DB>
where
    P: ChainProvider,
    C: Consensus,
    DB: KeyValueStore,
{
    /// Creates a new block validator. Safe for re-use across blocks.
    pub const fn new(
        config: ChainConfig,
        chain: P,
        engine: C,
        service: Option<Arc<MatchingService<DB>>>,
    ) -> Self {
        Self { config, chain, engine, service }
    }

    /// Validates the given block's uncles, transactions and matched-order
    /// payloads.
    ///
    /// Matched-order payloads are replayed in order against the book in the
    /// matching service's current store mode. The first failing payload
    /// aborts the loop; every order replayed up to that point is handed to
    /// the engine's rollback hook and the original error is returned. If the
    /// rollback itself fails, [`ConsensusError::RollbackFailed`] supersedes
    /// it.
    pub fn validate_body(&self, block: &Block) -> Result<(), ConsensusError> {
        // Check whether the block's known, and if not, that it's linkable.
        let hash = block.hash();
        if self.chain.has_block_and_state(hash, block.number()) {
            return Err(ConsensusError::KnownBlock { hash, number: block.number() })
        }
        let parent_hash = block.parent_hash();
        let parent_number = block.number().saturating_sub(1);
        if !self.chain.has_block_and_state(parent_hash, parent_number) {
            if !self.chain.has_block(parent_hash, parent_number) {
                return Err(ConsensusError::UnknownAncestor(parent_hash))
            }
            return Err(ConsensusError::PrunedAncestor(parent_hash))
        }

        // Header validity is known at this point; check uncles and
        // transactions.
        self.engine.verify_uncles(block)?;
        let uncle_root = proofs::calculate_uncle_root(&block.uncles);
        if uncle_root != block.header.uncle_root {
            return Err(ConsensusError::UncleRootMismatch(GotExpected {
                got: uncle_root,
                expected: block.header.uncle_root,
            }))
        }
        let tx_root = proofs::calculate_transaction_root(&block.transactions);
        if tx_root != block.header.tx_root {
            return Err(ConsensusError::TxRootMismatch(GotExpected {
                got: tx_root,
                expected: block.header.tx_root,
            }))
        }

        let Some(service) = self.service.as_ref() else {
            error!(target: "consensus::validation", "matching engine service not found");
            return Err(ConsensusError::ServiceUnavailable)
        };

        let mut processed = Vec::new();
        let mut outcome = Ok(());
        for tx in &block.transactions {
            if !tx.is_matching_transaction() {
                continue
            }
            trace!(target: "consensus::validation", tx = %tx.hash(), "replaying matched order");
            if let Err(err) = self.replay_matched_order(service, tx, &mut processed) {
                outcome = Err(err);
                break
            }
        }

        if let Err(err) = outcome {
            debug!(
                target: "consensus::validation",
                %err,
                replayed = processed.len(),
                "match replay failed, rolling back"
            );
            if let Err(source) = service.rollback(&processed) {
                return Err(ConsensusError::RollbackFailed { original: Box::new(err), source })
            }
            return Err(err)
        }
        Ok(())
    }

    /// Replays one matched-order transaction against the book.
    ///
    /// The rollback pre-image is appended to `processed` as soon as the book
    /// has been mutated, so that the failures of any later step (including
    /// later transactions) can restore it.
    fn replay_matched_order(
        &self,
        service: &MatchingService<DB>,
        tx: &Transaction,
        processed: &mut Vec<ProcessedRecord>,
    ) -> Result<(), ConsensusError> {
        let payload = MatchPayload::decode(tx.data())?;
        payload.verify_order()?;

        let book = service.order_book(&payload.order.pair)?;
        payload.verify_old_state(&book)?;

        // The best opposing level is about to be consumed; capture it as the
        // rollback anchor before the engine runs.
        let pre_image = service.capture_pre_image(&book, &payload)?;

        book.process_order(payload.order.clone(), true)?;
        processed.push(pre_image);

        service.mark_order_as_processed(payload.order.hash)?;
        payload.verify_new_state(&book)?;
        self.emit_trades(service, tx, &payload)?;
        Ok(())
    }

    /// Records the payload's claimed trades through the trade sink on SDK
    /// nodes.
    fn emit_trades(
        &self,
        service: &MatchingService<DB>,
        tx: &Transaction,
        payload: &MatchPayload,
    ) -> Result<(), ConsensusError> {
        debug!(
            target: "consensus::validation",
            count = payload.trades.len(),
            tx = %tx.hash(),
            "claimed trades"
        );
        if !service.is_sdk_node() {
            return Ok(())
        }
        for claimed in &payload.trades {
            let mut trade = Trade {
                amount: claimed.amount,
                price: payload.order.price,
                pair: payload.order.pair.clone(),
                base_token: payload.order.base_token,
                quote_token: payload.order.quote_token,
                maker: payload.order.user,
                taker: claimed.counterparty,
                maker_order_hash: payload.order.hash,
                // TODO: extend the match payload to carry the resting
                // order's hash so this can reference the counterparty's own
                // order.
                taker_order_hash: payload.order.hash,
                tx_hash: tx.hash(),
                status: TradeStatus::Success,
                hash: B256::ZERO,
            };
            trade.hash = trade.compute_hash();
            trace!(target: "consensus::validation", trade = %trade.hash, "recording trade");
            service.trade_db().put(&EMPTY_KEY, &trade)?;
        }
        Ok(())
    }

    /// Validates the changes that happen after a state transition: the gas
    /// used, the derived bloom and receipt root, and the state root itself.
    pub fn validate_state<S: StateProvider>(
        &self,
        block: &Block,
        _parent: &Block,
        state: &S,
        receipts: &[Receipt],
        used_gas: u64,
    ) -> Result<(), ConsensusError> {
        if block.gas_used() != used_gas {
            return Err(ConsensusError::GasUsedMismatch(GotExpected {
                got: used_gas,
                expected: block.gas_used(),
            }))
        }
        // The bloom derived from the receipts must always validate for valid
        // blocks.
        let bloom = proofs::calculate_log_bloom(receipts);
        if bloom != block.header.bloom {
            return Err(ConsensusError::BloomMismatch(
                GotExpected { got: bloom, expected: block.header.bloom }.into(),
            ))
        }
        let receipt_root = proofs::calculate_receipt_root(receipts);
        if receipt_root != block.header.receipt_root {
            return Err(ConsensusError::ReceiptRootMismatch(GotExpected {
                got: receipt_root,
                expected: block.header.receipt_root,
            }))
        }
        let state_root = state.intermediate_root(self.config.is_eip158(block.number()));
        if state_root != block.header.state_root {
            return Err(ConsensusError::StateRootMismatch(GotExpected {
                got: state_root,
                expected: block.header.state_root,
            }))
        }
        Ok(())
    }
}

/// Computes the gas limit of the next block after `parent`.
///
/// Miner strategy, not consensus protocol: the limit decays towards the
/// parent's usage and is pulled up towards [`TARGET_GAS_LIMIT`] when below
/// it, with per-block movement bounded by [`GAS_LIMIT_BOUND_DIVISOR`] and
/// the result floored at [`MIN_GAS_LIMIT`].
pub fn calc_gas_limit(parent: &Block) -> u64 {
    // contrib = (parentGasUsed * 3 / 2) / 1024
    let contrib = (parent.gas_used() + parent.gas_used() / 2) / GAS_LIMIT_BOUND_DIVISOR;
    // decay = parentGasLimit / 1024 - 1
    let decay = parent.gas_limit() / GAS_LIMIT_BOUND_DIVISOR - 1;

    let mut limit = parent.gas_limit() - decay + contrib;
    if limit < MIN_GAS_LIMIT {
        limit = MIN_GAS_LIMIT;
    }
    // If we're below the target, raise the limit as far as the bound allows.
    if limit < TARGET_GAS_LIMIT {
        limit = parent.gas_limit() + decay;
        if limit > TARGET_GAS_LIMIT {
            limit = TARGET_GAS_LIMIT;
        }
    }
    limit
}
