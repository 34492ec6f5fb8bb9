// Off-chain client for commit-reveal-resolve duels.
//
// The binary in `src/bin/duel.rs` wires these together; integration tests
// drive the same pieces against the in-process ledger.

pub mod board_init;
pub mod cache;
pub mod chain;
pub mod chain_protocol;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod local_state;
pub mod payload;
pub mod proofs;
pub mod visualize;
pub mod wallet;
pub mod witness;

pub use error::{ClientError, Result};
