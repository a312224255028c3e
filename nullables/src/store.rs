//! Nullable store: thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use dpos_store::{KvStore, StoreError, Table, WriteOp, WriteSet};

type TableData = BTreeMap<Vec<u8>, Vec<u8>>;

/// An in-memory [`KvStore`].
///
/// Commits are atomic with respect to readers. [`NullStore::fail_next_commit`]
/// makes the next commit fail without applying anything, which lets tests
/// exercise the storage-failure path of the chain database.
#[derive(Default)]
pub struct NullStore {
    tables: Mutex<HashMap<Table, TableData>>,
    fail_next: AtomicBool,
    commits: AtomicU64,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next [`KvStore::commit`] return a backend error.
    pub fn fail_next_commit(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Table, TableData>>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("null store mutex poisoned".into()))
    }
}

impl KvStore for NullStore {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock()?.get(&table).and_then(|t| t.get(key)).cloned())
    }

    fn scan(&self, table: Table) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(self
            .lock()?
            .get(&table)
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn count(&self, table: Table) -> Result<u64, StoreError> {
        Ok(self.lock()?.get(&table).map_or(0, |t| t.len() as u64))
    }

    fn commit(&self, batch: WriteSet) -> Result<(), StoreError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".into()));
        }
        let mut tables = self.lock()?;
        for op in batch.into_ops() {
            match op {
                WriteOp::Put { table, key, value } => {
                    tables.entry(table).or_default().insert(key, value);
                }
                WriteOp::Delete { table, key } => {
                    if let Some(t) = tables.get_mut(&table) {
                        t.remove(&key);
                    }
                }
            }
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpos_store::MetaStore;

    #[test]
    fn put_get_scan() {
        let store = NullStore::new();
        store.put(Table::Accounts, b"b", b"2").unwrap();
        store.put(Table::Accounts, b"a", b"1").unwrap();
        assert_eq!(store.get(Table::Accounts, b"a").unwrap(), Some(b"1".to_vec()));
        let keys: Vec<_> = store
            .scan(Table::Accounts)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(store.count(Table::Accounts).unwrap(), 2);
    }

    #[test]
    fn injected_failure_applies_nothing() {
        let store = NullStore::new();
        store.fail_next_commit();
        let mut set = WriteSet::new();
        set.put(Table::Blocks, b"x".to_vec(), b"y".to_vec());
        assert!(store.commit(set.clone()).is_err());
        assert_eq!(store.get(Table::Blocks, b"x").unwrap(), None);

        // The failure is one-shot.
        store.commit(set).unwrap();
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn meta_store_blanket_impl() {
        let store = NullStore::new();
        assert_eq!(store.get_schema_version().unwrap(), 0);
        store.set_schema_version(3).unwrap();
        assert_eq!(store.get_schema_version().unwrap(), 3);
        assert!(store.get_meta("nope").is_err());
    }
}
