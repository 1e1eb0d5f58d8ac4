//! Block validation for the obex matching chain.
//!
//! [`BlockValidator`] ingests header-validated blocks, checks their
//! structural commitments and replays every matched-order payload against
//! the authoritative book, verifying the submitter's claimed pre- and
//! post-match digests around the engine's deterministic transition. Failed
//! replays roll the book back through the matching service before the error
//! surfaces.
//!
//! ## Feature Flags
//!
//! - `test-utils`: Export mock collaborators for testing

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
mod error;
pub mod traits;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::ChainConfig;
pub use error::ConsensusError;
pub use traits::{ChainProvider, Consensus, StateProvider};
pub use validation::{calc_gas_limit, BlockValidator};
