//! Shared, async handle to the chain database.
//!
//! All mutation is serialized behind one write lock; queries take the read
//! lock and return owned copies, so a reader never observes a half-applied
//! block or a chain switch in progress.

use std::collections::BTreeMap;
use std::sync::Arc;

use dpos_consensus::{ForkEntry, ForkGraph};
use dpos_ledger::{
    AccountEntry, AssetEntry, BalanceEntry, GenesisConfig, SlotEntry, TrxError, TxEntry,
};
use dpos_store::KvStore;
use dpos_transactions::{SignedBlock, SignedTransaction};
use dpos_types::{
    AccountId, AccountRef, AssetRef, BalanceId, BlockId, BlockRef, ChainId, ChainParams, Clock,
    KeyPair, PublicKey, Timestamp, TxId,
};
use tokio::sync::RwLock;

use crate::audit::AuditReport;
use crate::block_summary::BlockSummary;
use crate::engine::ChainState;
use crate::error::{BlockError, NodeError};
use crate::metrics::ChainMetrics;

#[derive(Clone)]
pub struct ChainDatabase {
    state: Arc<RwLock<ChainState>>,
    chain_id: ChainId,
    params: ChainParams,
    metrics: Arc<ChainMetrics>,
}

impl ChainDatabase {
    pub fn open(
        kv: Arc<dyn KvStore>,
        genesis: &GenesisConfig,
        params: ChainParams,
        clock: Arc<dyn Clock>,
        metrics: Arc<ChainMetrics>,
    ) -> Result<Self, NodeError> {
        let state = ChainState::open(kv, genesis, params.clone(), clock, Arc::clone(&metrics))?;
        Ok(Self {
            chain_id: *state.chain_id(),
            state: Arc::new(RwLock::new(state)),
            params,
            metrics,
        })
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn metrics(&self) -> &Arc<ChainMetrics> {
        &self.metrics
    }

    // ── Writes ──────────────────────────────────────────────────────────

    pub async fn submit_block(&self, block: SignedBlock) -> Result<ForkEntry, BlockError> {
        self.state.write().await.push_block(block)
    }

    pub async fn submit_transaction(&self, trx: SignedTransaction) -> Result<TxId, TrxError> {
        self.state.write().await.submit_transaction(trx)
    }

    pub async fn produce_block(
        &self,
        signer: &KeyPair,
        timestamp: Timestamp,
    ) -> Result<SignedBlock, BlockError> {
        self.state.write().await.produce_block(signer, timestamp)
    }

    /// Returns the head block number after revalidation.
    pub async fn revalidate_pending(&self) -> Result<u32, BlockError> {
        self.state.write().await.revalidate_pending()
    }

    pub async fn pop_block(&self) -> Result<BlockId, BlockError> {
        self.state.write().await.pop_block()
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub async fn get_head_block_number(&self) -> u32 {
        self.state.read().await.head_block_number()
    }

    pub async fn get_head_block_id(&self) -> BlockId {
        self.state.read().await.head_block_id()
    }

    pub async fn is_poisoned(&self) -> bool {
        self.state.read().await.is_poisoned()
    }

    pub async fn get_block(
        &self,
        block: impl Into<BlockRef>,
    ) -> Result<Option<SignedBlock>, NodeError> {
        self.state.read().await.get_block(block.into())
    }

    pub async fn get_block_transactions(
        &self,
        block: impl Into<BlockRef>,
    ) -> Result<BTreeMap<TxId, TxEntry>, NodeError> {
        self.state.read().await.get_block_transactions(block.into())
    }

    pub async fn get_block_summary(
        &self,
        block: impl Into<BlockRef>,
    ) -> Result<Option<BlockSummary>, NodeError> {
        self.state.read().await.get_block_summary(block.into())
    }

    pub async fn get_transaction(&self, id: &TxId) -> Option<TxEntry> {
        self.state.read().await.get_transaction(id)
    }

    pub async fn get_account(&self, account: impl Into<AccountRef>) -> Option<AccountEntry> {
        self.state.read().await.get_account(&account.into())
    }

    pub async fn get_asset(&self, asset: impl Into<AssetRef>) -> Option<AssetEntry> {
        self.state.read().await.get_asset(&asset.into())
    }

    pub async fn get_balance(&self, id: &BalanceId) -> Option<BalanceEntry> {
        self.state.read().await.get_balance(id)
    }

    pub async fn list_forks(&self) -> BTreeMap<u32, Vec<ForkEntry>> {
        self.state.read().await.list_forks()
    }

    pub async fn get_fork_entry(&self, id: &BlockId) -> Option<ForkEntry> {
        self.state.read().await.get_fork_entry(id)
    }

    pub async fn get_fork_graph(&self, first: u32, last: u32) -> ForkGraph {
        self.state.read().await.get_fork_graph(first, last)
    }

    pub async fn list_active_delegates(&self, first: u32, count: u32) -> Vec<AccountEntry> {
        self.state.read().await.list_active_delegates(first, count)
    }

    pub async fn round_delegates(&self) -> Vec<AccountId> {
        self.state.read().await.round_delegates()
    }

    pub async fn get_delegate_slot_entries(
        &self,
        delegate: AccountId,
        limit: usize,
    ) -> Vec<SlotEntry> {
        self.state.read().await.get_delegate_slot_entries(delegate, limit)
    }

    pub async fn list_missing_block_delegates(
        &self,
        block_num: u32,
    ) -> Result<Vec<AccountId>, NodeError> {
        self.state.read().await.list_missing_block_delegates(block_num)
    }

    pub async fn pending_transactions(&self) -> Vec<SignedTransaction> {
        self.state.read().await.pending_transactions()
    }

    pub async fn delegates_for_keys(&self, keys: &[PublicKey]) -> Vec<AccountId> {
        self.state.read().await.delegates_for_keys(keys)
    }

    pub async fn next_producible_block_timestamp(
        &self,
        delegates: &[AccountId],
    ) -> Option<(Timestamp, AccountId)> {
        self.state.read().await.next_producible_block_timestamp(delegates)
    }

    pub async fn audit_state(&self) -> AuditReport {
        self.state.read().await.audit_state()
    }

    pub async fn state_hash(&self) -> Result<[u8; 32], NodeError> {
        Ok(self.state.read().await.state_hash()?)
    }
}
