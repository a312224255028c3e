//! The durable key-value backend trait.

use serde::de::DeserializeOwned;

use crate::{codec, StoreError, Table, WriteSet};

/// A durable key-value store with atomic multi-key commits.
pub trait KvStore: Send + Sync {
    /// Point read.
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Every `(key, value)` pair of a table in ascending key order.
    fn scan(&self, table: Table) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    /// Number of entries in a table.
    fn count(&self, table: Table) -> Result<u64, StoreError>;

    /// Apply every operation of `batch` atomically: either all become
    /// durable or none do.
    fn commit(&self, batch: WriteSet) -> Result<(), StoreError>;

    fn contains(&self, table: Table, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(table, key)?.is_some())
    }

    /// Single put, committed immediately.
    fn put(&self, table: Table, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut batch = WriteSet::new();
        batch.put(table, key.to_vec(), value.to_vec());
        self.commit(batch)
    }

    /// Single delete, committed immediately.
    fn delete(&self, table: Table, key: &[u8]) -> Result<(), StoreError> {
        let mut batch = WriteSet::new();
        batch.delete(table, key.to_vec());
        self.commit(batch)
    }
}

/// Point read decoded with bincode.
pub fn get_value<T: DeserializeOwned>(
    store: &dyn KvStore,
    table: Table,
    key: &[u8],
) -> Result<Option<T>, StoreError> {
    store.get(table, key)?.map(|b| codec::decode(&b)).transpose()
}

/// Decode every value of a table.
pub fn scan_values<T: DeserializeOwned>(
    store: &dyn KvStore,
    table: Table,
) -> Result<Vec<(Vec<u8>, T)>, StoreError> {
    store
        .scan(table)?
        .into_iter()
        .map(|(k, v)| Ok((k, codec::decode(&v)?)))
        .collect()
}
