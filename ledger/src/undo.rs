//! Undo deltas: the previous value of every entity a write touched.
//!
//! Restoring the changes of a delta in reverse order returns the state to
//! exactly what it was before the writes.

use std::collections::BTreeSet;

use dpos_types::{AccountId, AssetId, BalanceId, SlateId, Timestamp, TxId};
use serde::{Deserialize, Serialize};

use crate::entries::{
    AccountEntry, AssetEntry, BalanceEntry, ChainProperties, SlateEntry, SlotEntry, TxEntry,
};

/// The previous value of one entity. `None` means it did not exist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    Account { id: AccountId, old: Option<AccountEntry> },
    Asset { id: AssetId, old: Option<AssetEntry> },
    Balance { id: BalanceId, old: Option<BalanceEntry> },
    Slate { id: SlateId, old: Option<SlateEntry> },
    Slot { timestamp: Timestamp, old: Option<SlotEntry> },
    Transaction { id: TxId, old: Option<TxEntry> },
    Properties { old: ChainProperties },
}

/// Identifies one stored entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StateKey {
    Account(AccountId),
    Asset(AssetId),
    Balance(BalanceId),
    Slate(SlateId),
    Slot(Timestamp),
    Transaction(TxId),
    Properties,
}

impl Change {
    pub fn key(&self) -> StateKey {
        match self {
            Change::Account { id, .. } => StateKey::Account(*id),
            Change::Asset { id, .. } => StateKey::Asset(*id),
            Change::Balance { id, .. } => StateKey::Balance(*id),
            Change::Slate { id, .. } => StateKey::Slate(*id),
            Change::Slot { timestamp, .. } => StateKey::Slot(*timestamp),
            Change::Transaction { id, .. } => StateKey::Transaction(*id),
            Change::Properties { .. } => StateKey::Properties,
        }
    }
}

/// Ordered list of changes made by one operation, transaction or block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoDelta {
    changes: Vec<Change>,
}

impl UndoDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Append the changes of a later delta.
    pub fn append(&mut self, mut later: UndoDelta) {
        self.changes.append(&mut later.changes);
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub(crate) fn into_changes(self) -> Vec<Change> {
        self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Every entity this delta touched, deduplicated.
    pub fn touched_keys(&self) -> BTreeSet<StateKey> {
        self.changes.iter().map(Change::key).collect()
    }
}
