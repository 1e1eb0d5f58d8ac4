//! Mock collaborators for validator tests.

use crate::{
    error::ConsensusError,
    traits::{ChainProvider, Consensus, StateProvider},
};
use alloy_primitives::B256;
use obex_orderbook::TradeSink;
use obex_primitives::{Block, GotExpected, Trade};
use obex_storage::StoreError;
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

/// Chain provider over explicit block sets.
#[derive(Debug, Clone, Default)]
pub struct MockChain {
    blocks: HashSet<(B256, u64)>,
    blocks_with_state: HashSet<(B256, u64)>,
    state_root: B256,
}

impl MockChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a block without state.
    pub fn insert_block(&mut self, hash: B256, number: u64) {
        self.blocks.insert((hash, number));
    }

    /// Registers a block together with its state.
    pub fn insert_block_with_state(&mut self, hash: B256, number: u64) {
        self.blocks.insert((hash, number));
        self.blocks_with_state.insert((hash, number));
    }

    /// Sets the root reported by [`MockChain::state`].
    pub fn set_state_root(&mut self, root: B256) {
        self.state_root = root;
    }
}

impl ChainProvider for MockChain {
    type State = MockState;

    fn has_block_and_state(&self, hash: B256, number: u64) -> bool {
        self.blocks_with_state.contains(&(hash, number))
    }

    fn has_block(&self, hash: B256, number: u64) -> bool {
        self.blocks.contains(&(hash, number))
    }

    fn state(&self) -> Result<Self::State, ConsensusError> {
        Ok(MockState { root: self.state_root })
    }
}

/// State provider reporting a fixed root.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockState {
    /// The root returned by [`StateProvider::intermediate_root`].
    pub root: B256,
}

impl StateProvider for MockState {
    fn intermediate_root(&self, _eip158: bool) -> B256 {
        self.root
    }
}

/// Consensus engine whose uncle verification can be toggled to fail.
#[derive(Debug, Default)]
pub struct TestConsensus {
    fail_uncles: AtomicBool,
}

impl TestConsensus {
    /// Makes [`Consensus::verify_uncles`] fail (or succeed again).
    pub fn set_fail_uncles(&self, fail: bool) {
        self.fail_uncles.store(fail, Ordering::SeqCst);
    }
}

impl Consensus for TestConsensus {
    fn verify_uncles(&self, block: &Block) -> Result<(), ConsensusError> {
        if self.fail_uncles.load(Ordering::SeqCst) {
            return Err(ConsensusError::UncleRootMismatch(GotExpected {
                got: B256::ZERO,
                expected: block.header.uncle_root,
            }))
        }
        Ok(())
    }
}

/// Trade sink capturing every recorded trade.
#[derive(Debug, Default)]
pub struct VecSink {
    trades: Mutex<Vec<Trade>>,
}

impl VecSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded trades.
    pub fn trades(&self) -> Vec<Trade> {
        self.trades.lock().unwrap().clone()
    }
}

impl TradeSink for VecSink {
    fn put(&self, _key: &[u8], trade: &Trade) -> Result<(), StoreError> {
        self.trades.lock().unwrap().push(trade.clone());
        Ok(())
    }
}
