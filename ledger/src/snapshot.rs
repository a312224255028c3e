//! Ledger snapshots: a deterministic hash of the whole ledger state.
//!
//! Two states with equal snapshot hashes hold identical entities and chain
//! properties. Used to check that switching forks and switching back
//! restores the state exactly, and to compare nodes.

use dpos_crypto::blake2b_256_multi;
use dpos_transactions::codec;
use dpos_types::BlockId;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::state::LedgerState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Blake2b over the canonical encoding of every table.
    #[serde(with = "dpos_types::hex32")]
    pub hash: [u8; 32],
    pub head_block_num: u32,
    pub head_block_id: BlockId,
    pub accounts: usize,
    pub assets: usize,
    pub balances: usize,
    pub transactions: usize,
    /// Snapshot version for compatibility.
    pub version: u32,
}

impl LedgerSnapshot {
    pub fn capture(state: &LedgerState) -> Result<Self, LedgerError> {
        let props = state.properties();
        Ok(Self {
            hash: state_hash(state)?,
            head_block_num: props.head_block_num,
            head_block_id: props.head_block_id,
            accounts: state.accounts().count(),
            assets: state.assets().count(),
            balances: state.balances().count(),
            transactions: state.transactions().count(),
            version: 1,
        })
    }
}

/// Deterministic hash of the full ledger state.
pub fn state_hash(state: &LedgerState) -> Result<[u8; 32], LedgerError> {
    let accounts = codec::encode(&state.accounts().collect::<Vec<_>>())?;
    let assets = codec::encode(&state.assets().collect::<Vec<_>>())?;
    let balances = codec::encode(&state.balances().collect::<Vec<_>>())?;
    let slates = codec::encode(&state.slates().collect::<Vec<_>>())?;
    let slots = codec::encode(&state.slots_newest_first().collect::<Vec<_>>())?;
    let transactions = codec::encode(&state.transactions().collect::<Vec<_>>())?;
    let properties = codec::encode(state.properties())?;
    Ok(blake2b_256_multi(&[
        &accounts,
        &assets,
        &balances,
        &slates,
        &slots,
        &transactions,
        &properties,
    ]))
}
