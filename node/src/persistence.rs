//! Table layout of the chain database in the key-value store.
//!
//! | table | key | value |
//! |---|---|---|
//! | `blocks` | block id | `SignedBlock` |
//! | `block_numbers` | number (BE u32) | block id of the canonical block |
//! | `block_summaries` | block id | `BlockSummary` |
//! | `fork_data` | block id | `ForkEntry` |
//! | `undo_states` | block id | `UndoDelta` of a retained block |
//! | ledger tables | see `dpos_ledger::persist` | |
//!
//! Writes are staged into a [`WriteSet`] and committed once per pushed or
//! popped block.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dpos_consensus::{ForkDatabase, ForkEntry};
use dpos_ledger::UndoDelta;
use dpos_store::{decode, get_value, scan_values, KvStore, StoreError, Table, WriteSet};
use dpos_transactions::SignedBlock;
use dpos_types::{BlockId, ChainId};

use crate::block_summary::BlockSummary;

const CHAIN_ID_KEY: &[u8] = b"chain_id";

fn num_key(block_num: u32) -> [u8; 4] {
    block_num.to_be_bytes()
}

fn id_from_key(key: &[u8]) -> Result<BlockId, StoreError> {
    let bytes: [u8; 32] = key
        .try_into()
        .map_err(|_| StoreError::Corruption(format!("block key of {} bytes", key.len())))?;
    Ok(BlockId::new(bytes))
}

#[derive(Clone)]
pub struct ChainStore {
    kv: Arc<dyn KvStore>,
}

impl ChainStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &dyn KvStore {
        self.kv.as_ref()
    }

    pub fn commit(&self, set: WriteSet) -> Result<(), StoreError> {
        if set.is_empty() {
            return Ok(());
        }
        self.kv.commit(set)
    }

    // ── Staging ─────────────────────────────────────────────────────────

    pub fn stage_chain_id(&self, set: &mut WriteSet, chain_id: &ChainId) {
        set.put(Table::Meta, CHAIN_ID_KEY, chain_id.as_bytes().to_vec());
    }

    pub fn stage_block(
        &self,
        set: &mut WriteSet,
        id: &BlockId,
        block: &SignedBlock,
    ) -> Result<(), StoreError> {
        set.put_value(Table::Blocks, *id.as_bytes(), block)
    }

    pub fn delete_block(&self, set: &mut WriteSet, id: &BlockId) {
        set.delete(Table::Blocks, *id.as_bytes());
        set.delete(Table::BlockSummaries, *id.as_bytes());
    }

    pub fn stage_applied(
        &self,
        set: &mut WriteSet,
        summary: &BlockSummary,
        undo: &UndoDelta,
    ) -> Result<(), StoreError> {
        let key = *summary.block_id.as_bytes();
        set.put(
            Table::BlockNumbers,
            num_key(summary.block_num),
            key.to_vec(),
        );
        set.put_value(Table::BlockSummaries, key, summary)?;
        set.put_value(Table::UndoStates, key, undo)
    }

    pub fn stage_popped(&self, set: &mut WriteSet, id: &BlockId, block_num: u32) {
        set.delete(Table::BlockNumbers, num_key(block_num));
        set.delete(Table::BlockSummaries, *id.as_bytes());
        set.delete(Table::UndoStates, *id.as_bytes());
    }

    pub fn delete_undo(&self, set: &mut WriteSet, id: &BlockId) {
        set.delete(Table::UndoStates, *id.as_bytes());
    }

    /// Stage every fork entry changed or removed since the last call.
    pub fn stage_forks(
        &self,
        set: &mut WriteSet,
        forks: &mut ForkDatabase,
    ) -> Result<(), StoreError> {
        let (changed, removed) = forks.take_changes();
        for entry in &changed {
            set.put_value(Table::ForkData, *entry.block_id.as_bytes(), entry)?;
        }
        for id in removed {
            set.delete(Table::ForkData, *id.as_bytes());
        }
        Ok(())
    }

    // ── Loading ─────────────────────────────────────────────────────────

    pub fn stored_chain_id(&self) -> Result<Option<ChainId>, StoreError> {
        match self.kv.get(Table::Meta, CHAIN_ID_KEY)? {
            Some(bytes) => {
                let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::Corruption("chain_id has unexpected byte length".into())
                })?;
                Ok(Some(ChainId::new(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn load_block(&self, id: &BlockId) -> Result<Option<SignedBlock>, StoreError> {
        get_value(self.kv(), Table::Blocks, id.as_bytes())
    }

    pub fn load_summary(&self, id: &BlockId) -> Result<Option<BlockSummary>, StoreError> {
        get_value(self.kv(), Table::BlockSummaries, id.as_bytes())
    }

    /// Canonical block number index.
    pub fn load_canonical(&self) -> Result<BTreeMap<u32, BlockId>, StoreError> {
        self.kv
            .scan(Table::BlockNumbers)?
            .into_iter()
            .map(|(k, v)| {
                let num: [u8; 4] = k.as_slice().try_into().map_err(|_| {
                    StoreError::Corruption(format!("block number key of {} bytes", k.len()))
                })?;
                Ok((u32::from_be_bytes(num), id_from_key(&v)?))
            })
            .collect()
    }

    pub fn load_undo(&self) -> Result<HashMap<BlockId, UndoDelta>, StoreError> {
        self.kv
            .scan(Table::UndoStates)?
            .into_iter()
            .map(|(k, v)| Ok((id_from_key(&k)?, decode(&v)?)))
            .collect()
    }

    pub fn load_forks(&self) -> Result<Vec<ForkEntry>, StoreError> {
        Ok(scan_values::<ForkEntry>(self.kv(), Table::ForkData)?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect())
    }
}
