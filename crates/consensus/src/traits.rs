//! Collaborator traits the block validator is driven against.

use crate::error::ConsensusError;
use alloy_primitives::B256;
use obex_primitives::Block;
use std::fmt::Debug;

/// Read access to the state of the chain head.
#[auto_impl::auto_impl(&, Arc)]
pub trait StateProvider: Send + Sync {
    /// Returns the intermediate state root, applying EIP-158 style account
    /// clearing when `eip158` is true.
    fn intermediate_root(&self, eip158: bool) -> B256;
}

/// Read access to the canonical chain.
#[auto_impl::auto_impl(&, Arc)]
pub trait ChainProvider: Send + Sync {
    /// The chain's state provider.
    type State: StateProvider;

    /// Returns true if the block is known and its post-state is available.
    fn has_block_and_state(&self, hash: B256, number: u64) -> bool;

    /// Returns true if the block is known, with or without state.
    fn has_block(&self, hash: B256, number: u64) -> bool;

    /// Returns a provider over the chain head's state.
    fn state(&self) -> Result<Self::State, ConsensusError>;
}

/// The consensus engine, as far as body validation is concerned.
#[auto_impl::auto_impl(&, Arc)]
pub trait Consensus: Send + Sync + Debug {
    /// Verifies the block's uncles against the engine's rules.
    fn verify_uncles(&self, block: &Block) -> Result<(), ConsensusError>;
}
