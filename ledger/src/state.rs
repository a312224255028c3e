//! The ledger state store: entity maps, indexes and chain properties.
//!
//! Every write goes through a method that records the previous value into
//! an [`UndoDelta`]. [`LedgerState::unapply`] restores a delta.

use std::collections::BTreeMap;
use std::ops::Bound;

use dpos_types::{AccountId, AssetId, BalanceId, SlateId, Timestamp, TxId};

use crate::entries::{
    AccountEntry, AssetEntry, BalanceEntry, ChainProperties, SlateEntry, SlotEntry, TxEntry,
};
use crate::undo::{Change, UndoDelta};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerState {
    accounts: BTreeMap<AccountId, AccountEntry>,
    account_names: BTreeMap<String, AccountId>,
    assets: BTreeMap<AssetId, AssetEntry>,
    asset_symbols: BTreeMap<String, AssetId>,
    balances: BTreeMap<BalanceId, BalanceEntry>,
    slates: BTreeMap<SlateId, SlateEntry>,
    slots: BTreeMap<Timestamp, SlotEntry>,
    transactions: BTreeMap<TxId, TxEntry>,
    properties: ChainProperties,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub fn account(&self, id: AccountId) -> Option<&AccountEntry> {
        self.accounts.get(&id)
    }

    pub fn account_by_name(&self, name: &str) -> Option<&AccountEntry> {
        self.account_names
            .get(name)
            .and_then(|id| self.accounts.get(id))
    }

    pub fn accounts(&self) -> impl Iterator<Item = &AccountEntry> {
        self.accounts.values()
    }

    /// Registered delegates in ascending id order.
    pub fn delegates(&self) -> impl Iterator<Item = &AccountEntry> {
        self.accounts.values().filter(|a| a.is_delegate())
    }

    pub fn asset(&self, id: AssetId) -> Option<&AssetEntry> {
        self.assets.get(&id)
    }

    pub fn asset_by_symbol(&self, symbol: &str) -> Option<&AssetEntry> {
        self.asset_symbols
            .get(symbol)
            .and_then(|id| self.assets.get(id))
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetEntry> {
        self.assets.values()
    }

    pub fn balance(&self, id: &BalanceId) -> Option<&BalanceEntry> {
        self.balances.get(id)
    }

    pub fn balances(&self) -> impl Iterator<Item = &BalanceEntry> {
        self.balances.values()
    }

    pub fn slate(&self, id: &SlateId) -> Option<&SlateEntry> {
        self.slates.get(id)
    }

    pub fn slates(&self) -> impl Iterator<Item = &SlateEntry> {
        self.slates.values()
    }

    pub fn slot(&self, timestamp: Timestamp) -> Option<&SlotEntry> {
        self.slots.get(&timestamp)
    }

    /// Slot entries with `from < timestamp <= to`, oldest first.
    pub fn slots_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> impl Iterator<Item = &SlotEntry> {
        self.slots
            .range((Bound::Excluded(from), Bound::Included(to)))
            .map(|(_, s)| s)
    }

    /// Every slot entry, newest first.
    pub fn slots_newest_first(&self) -> impl Iterator<Item = &SlotEntry> {
        self.slots.values().rev()
    }

    pub fn transaction(&self, id: &TxId) -> Option<&TxEntry> {
        self.transactions.get(id)
    }

    pub fn transactions(&self) -> impl Iterator<Item = &TxEntry> {
        self.transactions.values()
    }

    pub fn properties(&self) -> &ChainProperties {
        &self.properties
    }

    // ── Writes ──────────────────────────────────────────────────────────

    pub fn put_account(&mut self, entry: AccountEntry, delta: &mut UndoDelta) {
        let id = entry.id;
        let old = self.set_account(id, Some(entry));
        delta.record(Change::Account { id, old });
    }

    pub fn put_asset(&mut self, entry: AssetEntry, delta: &mut UndoDelta) {
        let id = entry.id;
        let old = self.set_asset(id, Some(entry));
        delta.record(Change::Asset { id, old });
    }

    pub fn put_balance(&mut self, entry: BalanceEntry, delta: &mut UndoDelta) {
        let id = entry.id;
        let old = self.balances.insert(id, entry);
        delta.record(Change::Balance { id, old });
    }

    pub fn put_slate(&mut self, entry: SlateEntry, delta: &mut UndoDelta) {
        let id = entry.id;
        let old = self.slates.insert(id, entry);
        delta.record(Change::Slate { id, old });
    }

    pub fn put_slot(&mut self, entry: SlotEntry, delta: &mut UndoDelta) {
        let timestamp = entry.timestamp;
        let old = self.slots.insert(timestamp, entry);
        delta.record(Change::Slot { timestamp, old });
    }

    pub fn put_transaction(&mut self, entry: TxEntry, delta: &mut UndoDelta) {
        let id = entry.id;
        let old = self.transactions.insert(id, entry);
        delta.record(Change::Transaction { id, old });
    }

    /// Change chain properties through `f`.
    pub fn update_properties(
        &mut self,
        delta: &mut UndoDelta,
        f: impl FnOnce(&mut ChainProperties),
    ) {
        delta.record(Change::Properties {
            old: self.properties.clone(),
        });
        f(&mut self.properties);
    }

    /// Restore every change of `delta`, newest first.
    pub fn unapply(&mut self, delta: UndoDelta) {
        for change in delta.into_changes().into_iter().rev() {
            self.restore(change);
        }
    }

    fn restore(&mut self, change: Change) {
        match change {
            Change::Account { id, old } => {
                self.set_account(id, old);
            }
            Change::Asset { id, old } => {
                self.set_asset(id, old);
            }
            Change::Balance { id, old } => set_or_remove(&mut self.balances, id, old),
            Change::Slate { id, old } => set_or_remove(&mut self.slates, id, old),
            Change::Slot { timestamp, old } => set_or_remove(&mut self.slots, timestamp, old),
            Change::Transaction { id, old } => set_or_remove(&mut self.transactions, id, old),
            Change::Properties { old } => self.properties = old,
        }
    }

    fn set_account(&mut self, id: AccountId, value: Option<AccountEntry>) -> Option<AccountEntry> {
        let old = match value {
            Some(entry) => {
                self.account_names.insert(entry.name.clone(), id);
                self.accounts.insert(id, entry)
            }
            None => self.accounts.remove(&id),
        };
        if let Some(prev) = &old {
            if self.accounts.get(&id).map(|a| &a.name) != Some(&prev.name) {
                self.account_names.remove(&prev.name);
            }
        }
        old
    }

    fn set_asset(&mut self, id: AssetId, value: Option<AssetEntry>) -> Option<AssetEntry> {
        let old = match value {
            Some(entry) => {
                self.asset_symbols.insert(entry.symbol.clone(), id);
                self.assets.insert(id, entry)
            }
            None => self.assets.remove(&id),
        };
        if let Some(prev) = &old {
            if self.assets.get(&id).map(|a| &a.symbol) != Some(&prev.symbol) {
                self.asset_symbols.remove(&prev.symbol);
            }
        }
        old
    }

    // ── Loading ─────────────────────────────────────────────────────────

    /// Insert a persisted entity without recording a change.
    pub(crate) fn load_account(&mut self, entry: AccountEntry) {
        self.set_account(entry.id, Some(entry));
    }

    pub(crate) fn load_asset(&mut self, entry: AssetEntry) {
        self.set_asset(entry.id, Some(entry));
    }

    pub(crate) fn load_balance(&mut self, entry: BalanceEntry) {
        self.balances.insert(entry.id, entry);
    }

    pub(crate) fn load_slate(&mut self, entry: SlateEntry) {
        self.slates.insert(entry.id, entry);
    }

    pub(crate) fn load_slot(&mut self, entry: SlotEntry) {
        self.slots.insert(entry.timestamp, entry);
    }

    pub(crate) fn load_transaction(&mut self, entry: TxEntry) {
        self.transactions.insert(entry.id, entry);
    }

    pub(crate) fn load_properties(&mut self, properties: ChainProperties) {
        self.properties = properties;
    }
}

fn set_or_remove<K: Ord, V>(map: &mut BTreeMap<K, V>, key: K, value: Option<V>) {
    match value {
        Some(v) => {
            map.insert(key, v);
        }
        None => {
            map.remove(&key);
        }
    }
}
