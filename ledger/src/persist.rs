//! Persistence of the ledger state in the key-value store.
//!
//! Each entity lives in its own table keyed by its id (big-endian for
//! numeric ids). After a block is pushed or popped, only the entities its
//! undo delta touched are rewritten.

use std::collections::BTreeSet;

use dpos_store::{scan_values, KvStore, StoreError, Table, WriteSet};
use dpos_types::{AccountId, AssetId, Timestamp};

use crate::entries::{
    AccountEntry, AssetEntry, BalanceEntry, ChainProperties, SlateEntry, SlotEntry, TxEntry,
};
use crate::error::LedgerError;
use crate::state::LedgerState;
use crate::undo::StateKey;

/// Key of the single chain-properties record.
pub const PROPERTIES_KEY: &[u8] = b"chain";

pub fn account_key(id: AccountId) -> [u8; 4] {
    id.0.to_be_bytes()
}

pub fn asset_key(id: AssetId) -> [u8; 4] {
    id.0.to_be_bytes()
}

pub fn slot_key(timestamp: Timestamp) -> [u8; 8] {
    timestamp.as_secs().to_be_bytes()
}

fn write_key(state: &LedgerState, key: StateKey, set: &mut WriteSet) -> Result<(), StoreError> {
    match key {
        StateKey::Account(id) => match state.account(id) {
            Some(v) => set.put_value(Table::Accounts, account_key(id), v)?,
            None => set.delete(Table::Accounts, account_key(id)),
        },
        StateKey::Asset(id) => match state.asset(id) {
            Some(v) => set.put_value(Table::Assets, asset_key(id), v)?,
            None => set.delete(Table::Assets, asset_key(id)),
        },
        StateKey::Balance(id) => match state.balance(&id) {
            Some(v) => set.put_value(Table::Balances, *id.as_bytes(), v)?,
            None => set.delete(Table::Balances, *id.as_bytes()),
        },
        StateKey::Slate(id) => match state.slate(&id) {
            Some(v) => set.put_value(Table::Slates, *id.as_bytes(), v)?,
            None => set.delete(Table::Slates, *id.as_bytes()),
        },
        StateKey::Slot(ts) => match state.slot(ts) {
            Some(v) => set.put_value(Table::Slots, slot_key(ts), v)?,
            None => set.delete(Table::Slots, slot_key(ts)),
        },
        StateKey::Transaction(id) => match state.transaction(&id) {
            Some(v) => set.put_value(Table::Transactions, *id.as_bytes(), v)?,
            None => set.delete(Table::Transactions, *id.as_bytes()),
        },
        StateKey::Properties => {
            set.put_value(Table::Properties, PROPERTIES_KEY, state.properties())?
        }
    }
    Ok(())
}

/// Queue the current value (or deletion) of every touched entity.
pub fn write_touched(
    state: &LedgerState,
    keys: &BTreeSet<StateKey>,
    set: &mut WriteSet,
) -> Result<(), LedgerError> {
    for key in keys {
        write_key(state, *key, set)?;
    }
    Ok(())
}

/// Queue every entity of `state`. Used once, for the genesis state.
pub fn write_full(state: &LedgerState, set: &mut WriteSet) -> Result<(), LedgerError> {
    let mut keys = BTreeSet::new();
    keys.extend(state.accounts().map(|a| StateKey::Account(a.id)));
    keys.extend(state.assets().map(|a| StateKey::Asset(a.id)));
    keys.extend(state.balances().map(|b| StateKey::Balance(b.id)));
    keys.extend(state.slates().map(|s| StateKey::Slate(s.id)));
    keys.extend(state.slots_newest_first().map(|s| StateKey::Slot(s.timestamp)));
    keys.extend(state.transactions().map(|t| StateKey::Transaction(t.id)));
    keys.insert(StateKey::Properties);
    write_touched(state, &keys, set)
}

/// Load the persisted ledger state. `None` for an empty store.
pub fn load_state(store: &dyn KvStore) -> Result<Option<LedgerState>, LedgerError> {
    let properties =
        dpos_store::get_value::<ChainProperties>(store, Table::Properties, PROPERTIES_KEY)?;
    let Some(properties) = properties else {
        return Ok(None);
    };

    let mut state = LedgerState::new();
    for (_, v) in scan_values::<AccountEntry>(store, Table::Accounts)? {
        state.load_account(v);
    }
    for (_, v) in scan_values::<AssetEntry>(store, Table::Assets)? {
        state.load_asset(v);
    }
    for (_, v) in scan_values::<BalanceEntry>(store, Table::Balances)? {
        state.load_balance(v);
    }
    for (_, v) in scan_values::<SlateEntry>(store, Table::Slates)? {
        state.load_slate(v);
    }
    for (_, v) in scan_values::<SlotEntry>(store, Table::Slots)? {
        state.load_slot(v);
    }
    for (_, v) in scan_values::<TxEntry>(store, Table::Transactions)? {
        state.load_transaction(v);
    }
    state.load_properties(properties);
    Ok(Some(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture;
    use crate::undo::UndoDelta;
    use dpos_nullables::NullStore;

    #[test]
    fn full_write_then_load_round_trips() {
        let fx = fixture();
        let store = NullStore::new();
        let mut set = WriteSet::new();
        write_full(&fx.state, &mut set).unwrap();
        store.commit(set).unwrap();

        let loaded = load_state(&store).unwrap().unwrap();
        assert_eq!(loaded, fx.state);
    }

    #[test]
    fn empty_store_has_no_state() {
        assert!(load_state(&NullStore::new()).unwrap().is_none());
    }

    #[test]
    fn touched_writes_delete_removed_entities() {
        let mut fx = fixture();
        let store = NullStore::new();
        let mut set = WriteSet::new();
        write_full(&fx.state, &mut set).unwrap();
        store.commit(set).unwrap();

        // Create a slot, persist it, then undo and persist the undo.
        let mut delta = UndoDelta::new();
        fx.state.put_slot(
            SlotEntry {
                timestamp: Timestamp::new(77),
                delegate_id: fx.delegate_id,
                block_id: None,
            },
            &mut delta,
        );
        let keys = delta.touched_keys();
        let mut set = WriteSet::new();
        write_touched(&fx.state, &keys, &mut set).unwrap();
        store.commit(set).unwrap();
        assert_eq!(store.count(Table::Slots).unwrap(), 1);

        fx.state.unapply(delta);
        let mut set = WriteSet::new();
        write_touched(&fx.state, &keys, &mut set).unwrap();
        store.commit(set).unwrap();
        assert_eq!(store.count(Table::Slots).unwrap(), 0);
        assert_eq!(load_state(&store).unwrap().unwrap(), fx.state);
    }
}
