//! The chain switch engine: owner of the ledger, the fork database, the
//! retained undo deltas and the pending pool.
//!
//! Every block reaches the ledger through [`ChainState::push_block`]. The
//! block is stored and linked in the fork database first; if that makes a
//! longer chain available, the engine pops the head down to the common
//! ancestor and extends forward through the new branch. A failure anywhere
//! on the new branch marks the offending block invalid and restores the
//! original branch.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use dpos_consensus::{
    is_round_boundary, missed_slots, next_producible_timestamp, next_round, select_active,
    validate_block_signer, ForkDatabase, ForkEntry, ForkGraph,
};
use dpos_ledger::block_effects::{
    advance_head, pay_delegate, record_missed, record_produced, set_active_delegates,
};
use dpos_ledger::persist::{load_state, write_full, write_touched};
use dpos_ledger::{
    state_hash, validate_and_apply, AccountEntry, AssetEntry, BalanceEntry, EvalEnv,
    GenesisConfig, LedgerError, LedgerState, SlotEntry, TrxError, TxEntry, TxLocation, UndoDelta,
};
use dpos_store::{KvStore, WriteSet};
use dpos_transactions::validation::validate_block_structure;
use dpos_transactions::{SignedBlock, SignedTransaction};
use dpos_types::{
    AccountId, AccountRef, Amount, AssetRef, BalanceId, BlockId, BlockRef, ChainId, ChainParams,
    Clock, KeyPair, PublicKey, Timestamp, TxId,
};
use tracing::{debug, error, info, warn};

use crate::audit::{audit_state, AuditReport};
use crate::block_summary::BlockSummary;
use crate::error::{BlockError, NodeError};
use crate::metrics::ChainMetrics;
use crate::pending::{PendingPool, PendingTransaction};
use crate::persistence::ChainStore;
use crate::tracing_spans::{
    block_apply_span, block_push_span, chain_switch_span, produce_span, transaction_span,
};
use crate::verify::verify_signatures_parallel;

/// Bytes of a block beyond its transactions: header, signature and
/// length prefixes.
const BLOCK_OVERHEAD: usize = 256;

pub struct ChainState {
    params: ChainParams,
    chain_id: ChainId,
    ledger: LedgerState,
    forks: ForkDatabase,
    /// Bodies of blocks not yet final. Final canonical blocks are read from
    /// the store.
    blocks: HashMap<BlockId, SignedBlock>,
    canonical: BTreeMap<u32, BlockId>,
    undo: HashMap<BlockId, UndoDelta>,
    pending: PendingPool,
    store: ChainStore,
    clock: Arc<dyn Clock>,
    metrics: Arc<ChainMetrics>,
    poisoned: bool,
}

impl ChainState {
    /// Open the chain stored in `kv`, initializing it from `genesis` when
    /// the store is empty.
    pub fn open(
        kv: Arc<dyn KvStore>,
        genesis: &GenesisConfig,
        params: ChainParams,
        clock: Arc<dyn Clock>,
        metrics: Arc<ChainMetrics>,
    ) -> Result<Self, NodeError> {
        let store = ChainStore::new(kv);
        let chain_id = genesis.chain_id()?;
        if let Some(stored) = store.stored_chain_id()? {
            if stored != chain_id {
                return Err(NodeError::ChainMismatch {
                    stored: stored.to_string(),
                    expected: chain_id.to_string(),
                });
            }
        }

        let (ledger, forks) = match load_state(store.kv())? {
            Some(ledger) => {
                let forks = ForkDatabase::from_entries(store.load_forks()?);
                (ledger, forks)
            }
            None => {
                let ledger = genesis.build_state(&params)?;
                let mut forks = ForkDatabase::new();
                let mut set = WriteSet::new();
                write_full(&ledger, &mut set)?;
                store.stage_chain_id(&mut set, &chain_id);
                store.stage_forks(&mut set, &mut forks)?;
                store.commit(set)?;
                info!(chain_id = %chain_id, "initialized chain from genesis");
                (ledger, forks)
            }
        };

        let canonical = store.load_canonical()?;
        let undo = store.load_undo()?;
        let mut blocks = HashMap::new();
        for entry in forks.entries().filter(|e| e.is_known && !e.block_id.is_zero()) {
            let block = store
                .load_block(&entry.block_id)?
                .ok_or(NodeError::MissingBlock(entry.block_id))?;
            blocks.insert(entry.block_id, block);
        }

        let state = Self {
            pending: PendingPool::new(params.max_pending_transactions),
            params,
            chain_id,
            ledger,
            forks,
            blocks,
            canonical,
            undo,
            store,
            clock,
            metrics,
            poisoned: false,
        };
        let head = state.ledger.properties();
        info!(
            head = head.head_block_num,
            head_id = %head.head_block_id,
            forks = state.forks.len(),
            retained_undo = state.undo.len(),
            "chain database opened"
        );
        state.metrics.head_block_num.set(i64::from(head.head_block_num));
        Ok(state)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    pub fn ledger(&self) -> &LedgerState {
        &self.ledger
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn head_block_number(&self) -> u32 {
        self.ledger.properties().head_block_num
    }

    pub fn head_block_id(&self) -> BlockId {
        self.ledger.properties().head_block_id
    }

    fn resolve(&self, block: BlockRef) -> Option<BlockId> {
        match block {
            BlockRef::Id(id) => Some(id),
            BlockRef::Number(num) => self.canonical.get(&num).copied(),
        }
    }

    pub fn get_block(&self, block: BlockRef) -> Result<Option<SignedBlock>, NodeError> {
        let Some(id) = self.resolve(block) else {
            return Ok(None);
        };
        if let Some(block) = self.blocks.get(&id) {
            return Ok(Some(block.clone()));
        }
        Ok(self.store.load_block(&id)?)
    }

    /// Transactions of a canonical block, by id.
    pub fn get_block_transactions(
        &self,
        block: BlockRef,
    ) -> Result<BTreeMap<TxId, TxEntry>, NodeError> {
        let Some(block) = self.get_block(block)? else {
            return Ok(BTreeMap::new());
        };
        let mut entries = BTreeMap::new();
        for id in block.transaction_ids()? {
            if let Some(entry) = self.ledger.transaction(&id) {
                entries.insert(id, entry.clone());
            }
        }
        Ok(entries)
    }

    pub fn get_block_summary(&self, block: BlockRef) -> Result<Option<BlockSummary>, NodeError> {
        match self.resolve(block) {
            Some(id) => Ok(self.store.load_summary(&id)?),
            None => Ok(None),
        }
    }

    pub fn get_transaction(&self, id: &TxId) -> Option<TxEntry> {
        self.ledger.transaction(id).cloned()
    }

    pub fn get_account(&self, account: &AccountRef) -> Option<AccountEntry> {
        match account {
            AccountRef::Id(id) => self.ledger.account(*id),
            AccountRef::Name(name) => self.ledger.account_by_name(name),
        }
        .cloned()
    }

    pub fn get_asset(&self, asset: &AssetRef) -> Option<AssetEntry> {
        match asset {
            AssetRef::Id(id) => self.ledger.asset(*id),
            AssetRef::Symbol(symbol) => self.ledger.asset_by_symbol(symbol),
        }
        .cloned()
    }

    pub fn get_balance(&self, id: &BalanceId) -> Option<BalanceEntry> {
        self.ledger.balance(id).cloned()
    }

    pub fn list_forks(&self) -> BTreeMap<u32, Vec<ForkEntry>> {
        self.forks.forks()
    }

    pub fn get_fork_entry(&self, id: &BlockId) -> Option<ForkEntry> {
        self.forks.get(id).cloned()
    }

    pub fn get_fork_graph(&self, first: u32, last: u32) -> ForkGraph {
        ForkGraph::build(&self.forks, first, last)
    }

    /// Delegates ranked by votes, `count` of them starting at rank `first`.
    pub fn list_active_delegates(&self, first: u32, count: u32) -> Vec<AccountEntry> {
        select_active(&self.ledger, u32::MAX)
            .into_iter()
            .skip(first as usize)
            .take(count as usize)
            .filter_map(|id| self.ledger.account(id).cloned())
            .collect()
    }

    /// The current round's delegates in production order.
    pub fn round_delegates(&self) -> Vec<AccountId> {
        self.ledger.properties().active_delegates.clone()
    }

    /// Most recent slots of a delegate, produced or missed.
    pub fn get_delegate_slot_entries(&self, delegate: AccountId, limit: usize) -> Vec<SlotEntry> {
        self.ledger
            .slots_newest_first()
            .filter(|s| s.delegate_id == delegate)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Delegates who missed their slot between block `block_num - 1` and
    /// block `block_num`.
    pub fn list_missing_block_delegates(
        &self,
        block_num: u32,
    ) -> Result<Vec<AccountId>, NodeError> {
        Ok(self
            .get_block_summary(BlockRef::Number(block_num))?
            .map(|s| s.missed_delegates)
            .unwrap_or_default())
    }

    pub fn pending_transactions(&self) -> Vec<SignedTransaction> {
        self.pending.iter().map(|t| t.transaction.clone()).collect()
    }

    /// Delegates whose signing key is one of `keys`.
    pub fn delegates_for_keys(&self, keys: &[PublicKey]) -> Vec<AccountId> {
        self.ledger
            .delegates()
            .filter(|a| {
                a.delegate_info
                    .as_ref()
                    .is_some_and(|d| keys.contains(&d.signing_key))
            })
            .map(|a| a.id)
            .collect()
    }

    pub fn next_producible_block_timestamp(
        &self,
        delegates: &[AccountId],
    ) -> Option<(Timestamp, AccountId)> {
        next_producible_timestamp(&self.ledger, &self.params, delegates, self.clock.now())
    }

    pub fn audit_state(&self) -> AuditReport {
        audit_state(&self.ledger)
    }

    pub fn state_hash(&self) -> Result<[u8; 32], LedgerError> {
        state_hash(&self.ledger)
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Commit one step. Any failure poisons the chain database: memory may
    /// now be ahead of the store.
    fn persist(&mut self, set: Result<WriteSet, BlockError>) -> Result<(), BlockError> {
        let result = set.and_then(|set| self.store.commit(set).map_err(BlockError::from));
        if let Err(e) = &result {
            self.poisoned = true;
            error!(error = %e, "storage failure, refusing further writes");
        }
        result
    }

    fn ensure_writable(&self) -> Result<(), BlockError> {
        if self.poisoned {
            return Err(BlockError::Poisoned);
        }
        Ok(())
    }

    fn block_body(&self, id: &BlockId) -> Result<SignedBlock, BlockError> {
        if let Some(block) = self.blocks.get(id) {
            return Ok(block.clone());
        }
        self.store.load_block(id)?.ok_or_else(|| {
            BlockError::Ledger(LedgerError::Inconsistent(format!("block {} body missing", id)))
        })
    }

    // ── Blocks ──────────────────────────────────────────────────────────

    /// Store a block, link it, and switch to the longest chain it makes
    /// available. Re-pushing a known block is a no-op.
    pub fn push_block(&mut self, block: SignedBlock) -> Result<ForkEntry, BlockError> {
        self.ensure_writable()?;
        let id = block.id()?;
        let num = block.block_num();
        let _span = block_push_span(&id, num).entered();

        let head_num = self.head_block_number();
        if num.saturating_add(self.params.retention_depth) <= head_num {
            self.metrics.blocks_rejected.inc();
            return Err(BlockError::TooOld {
                block_num: num,
                head_num,
            });
        }
        if num > head_num.saturating_add(self.params.retention_depth) {
            self.metrics.blocks_rejected.inc();
            return Err(BlockError::TooFarAhead {
                block_num: num,
                head_num,
            });
        }
        if let Some(entry) = self.forks.get(&id).filter(|e| e.is_known) {
            debug!(id = %id, "block already known");
            return Ok(entry.clone());
        }
        if let Err(e) = validate_block_structure(&block, &self.params) {
            self.metrics.blocks_rejected.inc();
            warn!(id = %id, error = %e, "rejected malformed block");
            return Err(e.into());
        }

        let previous = block.previous();
        if let Some(expected) = self.forks.expected_child_number(&previous) {
            if num != expected {
                self.metrics.blocks_rejected.inc();
                warn!(id = %id, num, expected, "rejected misnumbered block");
                return Err(BlockError::BadNumber {
                    block_num: num,
                    expected,
                });
            }
        }
        let outcome = self.forks.insert(id, previous, num);
        let staged = (|| -> Result<WriteSet, BlockError> {
            let mut set = WriteSet::new();
            self.store.stage_block(&mut set, &id, &block)?;
            self.store.stage_forks(&mut set, &mut self.forks)?;
            Ok(set)
        })();
        self.blocks.insert(id, block);
        self.persist(staged)?;
        self.metrics.fork_entries.set(self.forks.len() as i64);

        if outcome.newly_linked.is_empty() {
            debug!(id = %id, previous = %previous, "block stored, waiting for its parent");
        }
        let tips = self.forks.tips(&outcome.newly_linked);
        let result = self.switch_to_best(tips);
        self.revalidate_pool();

        match result {
            Err(e) => {
                self.metrics.blocks_rejected.inc();
                warn!(id = %id, error = %e, kind = %e.kind(), "block rejected");
                Err(e)
            }
            Ok(()) => self.forks.get(&id).cloned().ok_or_else(|| {
                BlockError::Ledger(LedgerError::Inconsistent(format!("fork entry {} vanished", id)))
            }),
        }
    }

    /// Try candidate tips higher than the head, best first, until one
    /// switch succeeds. Returns the error of the first failed attempt if
    /// none does.
    fn switch_to_best(&mut self, tips: Vec<BlockId>) -> Result<(), BlockError> {
        let mut first_error = None;
        for tip in self.forks.rank_candidates(tips) {
            let Some(tip_num) = self.forks.get(&tip).map(|e| e.block_num) else {
                continue;
            };
            if tip_num <= self.head_block_number() {
                break;
            }
            // An earlier failure may have invalidated this tip.
            if self.forks.get(&tip).is_some_and(|e| e.is_invalid()) {
                continue;
            }
            match self.switch_to_fork(&tip) {
                Ok(()) => return Ok(()),
                Err(e @ (BlockError::Storage(_) | BlockError::Poisoned)) => return Err(e),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Make the fork ending in `tip` the canonical chain.
    pub fn switch_to_fork(&mut self, tip: &BlockId) -> Result<(), BlockError> {
        self.ensure_writable()?;
        let from_num = self.head_block_number();
        let _span = chain_switch_span(tip, from_num).entered();
        let history = self.forks.history(tip)?;

        let mut popped = Vec::new();
        while self.head_block_id() != history.ancestor {
            popped.push(self.pop_block()?);
        }

        for id in &history.blocks {
            if let Err(e) = self.extend_chain(id) {
                if matches!(e, BlockError::Storage(_) | BlockError::Poisoned) {
                    return Err(e);
                }
                if e.is_retryable() {
                    self.forks.clear_validity(id);
                } else {
                    let marked = self.forks.mark_invalid(id, &e.to_string());
                    warn!(id = %id, marked, error = %e, "marked fork invalid");
                }
                self.restore(&history.ancestor, popped.iter().rev())?;
                return Err(if popped.is_empty() {
                    e
                } else {
                    BlockError::InvalidFork {
                        block_id: *id,
                        source: Box::new(e),
                    }
                });
            }
        }

        if !popped.is_empty() {
            self.metrics.chain_switches.inc();
            info!(
                from = from_num,
                to = self.head_block_number(),
                popped = popped.len(),
                ancestor = %history.ancestor,
                "switched to a longer fork"
            );
        }
        Ok(())
    }

    /// Pop back to `ancestor` and re-extend the original branch.
    fn restore<'a>(
        &mut self,
        ancestor: &BlockId,
        original: impl Iterator<Item = &'a BlockId>,
    ) -> Result<(), BlockError> {
        while self.head_block_id() != *ancestor {
            self.pop_block()?;
        }
        for id in original {
            self.extend_chain(id)?;
        }
        // Persist the invalid marks left by the failed attempt.
        let staged = (|| -> Result<WriteSet, BlockError> {
            let mut set = WriteSet::new();
            self.store.stage_forks(&mut set, &mut self.forks)?;
            Ok(set)
        })();
        self.persist(staged)
    }

    /// Apply the stored block `id` on top of the head.
    fn extend_chain(&mut self, id: &BlockId) -> Result<(), BlockError> {
        let started = Instant::now();
        let block = self.block_body(id)?;
        let num = block.block_num();
        let _span = block_apply_span(id, num).entered();

        let head = self.head_block_id();
        if block.previous() != head || num != self.head_block_number() + 1 {
            return Err(BlockError::NotNext {
                block_num: num,
                expected: head,
                previous: block.previous(),
            });
        }
        let signer = validate_block_signer(&block, &self.ledger, &self.params, self.clock.now())?;
        verify_signatures_parallel(&block.transactions, &self.chain_id).map_err(
            |(index, source)| BlockError::Transaction {
                block_id: *id,
                index,
                source,
            },
        )?;

        let mut delta = UndoDelta::new();
        let summary = match self.apply_block(&block, *id, signer, &mut delta) {
            Ok(summary) => summary,
            Err(e) => {
                self.ledger.unapply(delta);
                return Err(e);
            }
        };

        self.forks.mark_valid(id);
        self.forks.set_included(id, true);
        self.canonical.insert(num, *id);
        let tx_ids: HashSet<TxId> = block.transaction_ids()?.into_iter().collect();
        self.pending.remove_all(&tx_ids);

        let keys = delta.touched_keys();
        let staged = (|| -> Result<WriteSet, BlockError> {
            let mut set = WriteSet::new();
            write_touched(&self.ledger, &keys, &mut set)?;
            self.store.stage_applied(&mut set, &summary, &delta)?;
            self.prune(&mut set);
            self.store.stage_forks(&mut set, &mut self.forks)?;
            Ok(set)
        })();
        self.undo.insert(*id, delta);
        self.persist(staged)?;

        self.metrics.blocks_pushed.inc();
        self.metrics.head_block_num.set(i64::from(num));
        self.metrics.fork_entries.set(self.forks.len() as i64);
        self.metrics
            .block_apply_ms
            .observe(started.elapsed().as_secs_f64() * 1_000.0);
        info!(
            num,
            id = %id,
            signer = %signer,
            transactions = summary.transaction_count,
            missed = summary.missed_delegates.len(),
            "new head"
        );
        Ok(())
    }

    fn apply_block(
        &mut self,
        block: &SignedBlock,
        id: BlockId,
        signer: AccountId,
        delta: &mut UndoDelta,
    ) -> Result<BlockSummary, BlockError> {
        let num = block.block_num();
        let timestamp = block.timestamp();

        let missed = missed_slots(&self.ledger, &self.params, timestamp);
        for (slot, delegate) in &missed {
            record_missed(&mut self.ledger, *delegate, *slot, delta)?;
        }
        record_produced(&mut self.ledger, signer, num, timestamp, id, delta)?;

        let mut fees = Amount::ZERO;
        for (index, trx) in block.transactions.iter().enumerate() {
            let env = EvalEnv {
                chain_id: &self.chain_id,
                params: &self.params,
                chain_time: timestamp,
                enforce_relay_fee: false,
                location: TxLocation {
                    block_num: num,
                    trx_index: index as u32,
                },
            };
            match validate_and_apply(trx, &env, &mut self.ledger) {
                Ok((receipt, trx_delta)) => {
                    fees = fees + receipt.base_fee();
                    delta.append(trx_delta);
                }
                Err(source) => {
                    return Err(BlockError::Transaction {
                        block_id: id,
                        index,
                        source,
                    })
                }
            }
        }

        let delegate_pay = pay_delegate(&mut self.ledger, signer, &self.params, delta)?;
        if is_round_boundary(num, self.params.num_delegates) {
            let active = next_round(&self.ledger, &self.params, &id);
            debug!(num, delegates = active.len(), "new round");
            set_active_delegates(&mut self.ledger, active, delta);
        }
        advance_head(&mut self.ledger, id, num, timestamp, delta);

        Ok(BlockSummary {
            block_id: id,
            block_num: num,
            timestamp,
            signer,
            transaction_count: block.transactions.len() as u32,
            fees,
            delegate_pay,
            missed_delegates: missed.into_iter().map(|(_, d)| d).collect(),
        })
    }

    /// Forget what is deeper than the retention depth: undo deltas, fork
    /// entries and the bodies of blocks that lost. Unlinked blocks beyond
    /// the acceptance window above the head go too.
    fn prune(&mut self, set: &mut WriteSet) {
        let head_num = self.head_block_number();
        for stale in self
            .forks
            .prune_unlinked_above(head_num.saturating_add(self.params.retention_depth))
        {
            self.blocks.remove(&stale);
            self.store.delete_block(set, &stale);
        }
        let cutoff = head_num.saturating_sub(self.params.retention_depth);
        if cutoff == 0 {
            return;
        }
        if let Some(final_id) = self.canonical.get(&cutoff).copied() {
            if self.undo.remove(&final_id).is_some() {
                self.store.delete_undo(set, &final_id);
            }
        }
        for stale in self.forks.prune_below(cutoff) {
            self.blocks.remove(&stale);
            self.store.delete_block(set, &stale);
        }
        self.blocks.retain(|_, b| b.block_num() >= cutoff);
    }

    /// Undo the head block. Its transactions go back to the pending pool.
    pub fn pop_block(&mut self) -> Result<BlockId, BlockError> {
        self.ensure_writable()?;
        let props = self.ledger.properties();
        let (id, num) = (props.head_block_id, props.head_block_num);
        if num == 0 {
            return Err(BlockError::CannotPopGenesis);
        }
        let block = self.block_body(&id)?;
        let delta = self.undo.remove(&id).ok_or_else(|| {
            BlockError::Ledger(LedgerError::Inconsistent(format!(
                "block {} is final: no undo state",
                id
            )))
        })?;

        let now = self.clock.now();
        let mut requeued = Vec::with_capacity(block.transactions.len());
        for trx in &block.transactions {
            let tx_id = trx.id()?;
            let fee = self
                .ledger
                .transaction(&tx_id)
                .map(|t| t.receipt.base_fee())
                .unwrap_or(Amount::ZERO);
            requeued.push(PendingTransaction {
                id: tx_id,
                transaction: trx.clone(),
                fee,
                received: now,
            });
        }

        let keys = delta.touched_keys();
        self.ledger.unapply(delta);
        self.canonical.remove(&num);
        self.forks.set_included(&id, false);
        self.pending.requeue_front(requeued);

        let staged = (|| -> Result<WriteSet, BlockError> {
            let mut set = WriteSet::new();
            write_touched(&self.ledger, &keys, &mut set)?;
            self.store.stage_popped(&mut set, &id, num);
            self.store.stage_forks(&mut set, &mut self.forks)?;
            Ok(set)
        })();
        self.persist(staged)?;

        self.metrics.blocks_popped.inc();
        self.metrics.head_block_num.set(i64::from(num - 1));
        debug!(num, id = %id, "popped block");
        Ok(id)
    }

    /// Retry blocks left untried by a temporary failure (a timestamp too
    /// far in the future) and drop pending transactions that no longer
    /// apply.
    pub fn revalidate_pending(&mut self) -> Result<u32, BlockError> {
        self.ensure_writable()?;
        let untried = self.forks.untried();
        let result = if untried.is_empty() {
            Ok(())
        } else {
            debug!(candidates = untried.len(), "revalidating untried blocks");
            let tips = self.forks.all_tips();
            self.switch_to_best(tips)
        };
        self.revalidate_pool();
        result.map(|()| self.head_block_number())
    }

    // ── Transactions ────────────────────────────────────────────────────

    /// Apply `txs` in order on the live ledger, keeping those that succeed.
    /// The caller must unapply the returned deltas in reverse.
    fn apply_sequence(
        &mut self,
        txs: Vec<PendingTransaction>,
        chain_time: Timestamp,
        enforce_relay_fee: bool,
    ) -> (Vec<PendingTransaction>, Vec<UndoDelta>, Vec<(TxId, TrxError)>) {
        let mut kept = Vec::new();
        let mut deltas = Vec::new();
        let mut dropped = Vec::new();
        for tx in txs {
            let env = EvalEnv {
                chain_id: &self.chain_id,
                params: &self.params,
                chain_time,
                enforce_relay_fee,
                location: TxLocation {
                    block_num: self.ledger.properties().head_block_num + 1,
                    trx_index: kept.len() as u32,
                },
            };
            match validate_and_apply(&tx.transaction, &env, &mut self.ledger) {
                Ok((_, delta)) => {
                    deltas.push(delta);
                    kept.push(tx);
                }
                Err(e) => dropped.push((tx.id, e)),
            }
        }
        (kept, deltas, dropped)
    }

    fn unapply_all(&mut self, deltas: Vec<UndoDelta>) {
        for delta in deltas.into_iter().rev() {
            self.ledger.unapply(delta);
        }
    }

    /// Validate `trx` against the head state plus the pending pool and
    /// queue it.
    pub fn submit_transaction(&mut self, trx: SignedTransaction) -> Result<TxId, TrxError> {
        let id = trx.id()?;
        let _span = transaction_span(&id).entered();
        if self.pending.contains(&id) || self.ledger.transaction(&id).is_some() {
            self.metrics.transactions_rejected.inc();
            return Err(TrxError::DuplicateTransaction(id));
        }
        if self.pending.is_full() {
            self.metrics.transactions_rejected.inc();
            return Err(TrxError::PoolFull(self.pending.capacity()));
        }

        let now = self.clock.now();
        let queued = self.pending.drain();
        let (kept, mut deltas, dropped) = self.apply_sequence(queued, now, true);
        for (tx_id, e) in &dropped {
            debug!(id = %tx_id, error = %e, "dropped pending transaction");
        }

        let env = EvalEnv {
            chain_id: &self.chain_id,
            params: &self.params,
            chain_time: now,
            enforce_relay_fee: true,
            location: TxLocation {
                block_num: self.ledger.properties().head_block_num + 1,
                trx_index: kept.len() as u32,
            },
        };
        let result = match validate_and_apply(&trx, &env, &mut self.ledger) {
            Ok((receipt, delta)) => {
                deltas.push(delta);
                Ok(receipt)
            }
            Err(e) => Err(e),
        };
        self.unapply_all(deltas);
        for tx in kept {
            self.pending.push(tx);
        }

        match result {
            Ok(receipt) => {
                self.pending.push(PendingTransaction {
                    id,
                    transaction: trx,
                    fee: receipt.base_fee(),
                    received: now,
                });
                self.metrics.transactions_accepted.inc();
                self.metrics.pending_transactions.set(self.pending.len() as i64);
                debug!(id = %id, fee = %receipt.base_fee(), "transaction accepted");
                Ok(id)
            }
            Err(e) => {
                self.metrics.transactions_rejected.inc();
                debug!(id = %id, error = %e, kind = %e.kind(), "transaction rejected");
                Err(e)
            }
        }
    }

    /// Re-validate the pool against the current head, dropping expired and
    /// invalid transactions.
    fn revalidate_pool(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let now = self.clock.now();
        let queued = self.pending.drain();
        let (kept, deltas, dropped) = self.apply_sequence(queued, now, true);
        self.unapply_all(deltas);
        for (tx_id, e) in &dropped {
            debug!(id = %tx_id, error = %e, "dropped pending transaction");
        }
        for tx in kept {
            self.pending.push(tx);
        }
        self.metrics.pending_transactions.set(self.pending.len() as i64);
    }

    // ── Production ──────────────────────────────────────────────────────

    /// Assemble pending transactions into a block for `timestamp`, sign it
    /// with `signer` and push it.
    pub fn produce_block(
        &mut self,
        signer: &KeyPair,
        timestamp: Timestamp,
    ) -> Result<SignedBlock, BlockError> {
        self.ensure_writable()?;
        let _span = produce_span(timestamp.as_secs()).entered();
        let now = self.clock.now();
        if timestamp.has_expired(self.params.block_interval_secs, now) {
            return Err(BlockError::ProductionSlotExpired { timestamp, now });
        }

        let candidates: Vec<PendingTransaction> = self.pending.iter().cloned().collect();
        let (kept, deltas, _) = self.apply_sequence(candidates, timestamp, false);
        self.unapply_all(deltas);

        let mut transactions = Vec::new();
        let mut size = BLOCK_OVERHEAD;
        for tx in kept {
            if transactions.len() >= self.params.max_block_transactions {
                break;
            }
            let tx_size = tx.transaction.encoded_size()?;
            if size + tx_size > self.params.max_block_size {
                break;
            }
            size += tx_size;
            transactions.push(tx.transaction);
        }

        let block = SignedBlock::build(
            self.head_block_number() + 1,
            self.head_block_id(),
            timestamp,
            transactions,
            signer,
        )?;
        self.push_block(block.clone())?;
        info!(num = block.block_num(), transactions = block.transactions.len(), "produced block");
        Ok(block)
    }
}
