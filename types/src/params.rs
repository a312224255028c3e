//! Chain parameters: slot timing, round size, retention depth, limits and fees.
//!
//! Every node on a network must use identical values; they are fixed at
//! genesis and selected per [`NetworkId`].

use serde::{Deserialize, Serialize};

use crate::network::NetworkId;

/// Consensus-relevant parameters shared by every node of a network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    // ── Slots and rounds ─────────────────────────────────────────────────
    /// Duration of one production slot in seconds.
    pub block_interval_secs: u64,

    /// Number of active delegates; also the round length in blocks.
    pub num_delegates: u32,

    /// How far ahead of the local clock a block timestamp may be.
    pub max_clock_skew_secs: u64,

    // ── Forks ────────────────────────────────────────────────────────────
    /// Blocks below the head for which undo deltas and alternate forks are
    /// kept. Deeper blocks are final.
    pub retention_depth: u32,

    // ── Transactions ─────────────────────────────────────────────────────
    /// Latest expiration a transaction may carry, relative to chain time.
    pub max_transaction_expiration_secs: u64,

    /// Maximum encoded size of one transaction in bytes.
    pub max_transaction_size: usize,

    /// Maximum number of signatures attached to one transaction.
    pub max_signatures: usize,

    /// Base-asset fee per started kilobyte required to enter the pending pool.
    pub relay_fee_per_kb: u64,

    /// Maximum transactions held in the pending pool.
    pub max_pending_transactions: usize,

    // ── Blocks ───────────────────────────────────────────────────────────
    /// Maximum encoded size of one block in bytes.
    pub max_block_size: usize,

    /// Maximum number of transactions in one block.
    pub max_block_transactions: usize,

    // ── Registration and supply ──────────────────────────────────────────
    /// Base-asset fee to register a delegate.
    pub delegate_registration_fee: u64,

    /// Base-asset fee to register an asset.
    pub asset_registration_fee: u64,

    /// Upper bound for any asset's `max_supply`.
    pub max_asset_supply: u64,

    // ── Delegate pay ─────────────────────────────────────────────────────
    /// New base shares issued to a 100%-pay-rate delegate per block.
    pub max_delegate_pay_per_block: u64,

    /// Collected fees are released over this many blocks (1 = all at once).
    pub fee_release_blocks: u32,
}

impl ChainParams {
    /// Parameters for the production network.
    pub fn live_defaults() -> Self {
        Self {
            block_interval_secs: 10,
            num_delegates: 101,
            max_clock_skew_secs: 20,
            retention_depth: 1_000,
            max_transaction_expiration_secs: 24 * 60 * 60,
            max_transaction_size: 100 * 1024,
            max_signatures: 16,
            relay_fee_per_kb: 10_000,
            max_pending_transactions: 10_000,
            max_block_size: 1024 * 1024,
            max_block_transactions: 2_000,
            delegate_registration_fee: 100_000_000,
            asset_registration_fee: 500_000_000,
            max_asset_supply: 1_000_000_000_000_000_000,
            max_delegate_pay_per_block: 300_000,
            fee_release_blocks: 1,
        }
    }

    /// Parameters for the public test network: same timing, cheaper fees.
    pub fn test_defaults() -> Self {
        Self {
            relay_fee_per_kb: 100,
            delegate_registration_fee: 1_000,
            asset_registration_fee: 5_000,
            ..Self::live_defaults()
        }
    }

    /// Parameters for local development: a small round and fast slots.
    pub fn dev_defaults() -> Self {
        Self {
            block_interval_secs: 2,
            num_delegates: 5,
            max_clock_skew_secs: 4,
            retention_depth: 100,
            relay_fee_per_kb: 0,
            delegate_registration_fee: 0,
            asset_registration_fee: 0,
            max_delegate_pay_per_block: 0,
            ..Self::live_defaults()
        }
    }

    pub fn for_network(network: NetworkId) -> Self {
        match network {
            NetworkId::Live => Self::live_defaults(),
            NetworkId::Test => Self::test_defaults(),
            NetworkId::Dev => Self::dev_defaults(),
        }
    }

    /// Duration of one full delegate round in seconds.
    pub fn round_secs(&self) -> u64 {
        self.block_interval_secs * u64::from(self.num_delegates)
    }

    /// Reject parameter sets that would make slot arithmetic meaningless.
    pub fn validate(&self) -> Result<(), String> {
        if self.block_interval_secs == 0 {
            return Err("block_interval_secs must be positive".into());
        }
        if self.num_delegates == 0 {
            return Err("num_delegates must be positive".into());
        }
        if self.retention_depth == 0 {
            return Err("retention_depth must be positive".into());
        }
        if self.fee_release_blocks == 0 {
            return Err("fee_release_blocks must be positive".into());
        }
        if self.max_block_transactions == 0 || self.max_block_size == 0 {
            return Err("block limits must be positive".into());
        }
        Ok(())
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self::live_defaults()
    }
}
