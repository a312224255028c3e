//! Consensus for the DPOS chain database.
//!
//! - [`schedule`]: slots, active delegate selection and shuffle, signer checks.
//! - [`fork_db`]: every known block and how it links to the canonical chain.
//! - [`fork_graph`]: fork database export for inspection.
//! - [`vote_tally`]: delegate votes recomputed from balances.
//! - [`error`]: consensus error types.

pub mod error;
pub mod fork_db;
pub mod fork_graph;
pub mod schedule;
pub mod vote_tally;

pub use error::ConsensusError;
pub use fork_db::{ForkDatabase, ForkEntry, ForkHistory, InsertOutcome};
pub use fork_graph::{ForkGraph, ForkNode};
pub use schedule::{
    expected_signer, is_round_boundary, missed_slots, next_producible_timestamp, next_round,
    select_active, shuffle, slot_number, validate_block_signer,
};
pub use vote_tally::{VoteMismatch, VoteTally};
