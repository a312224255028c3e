//! Write batching: applies a [`WriteSet`] inside a single LMDB write
//! transaction.
//!
//! If the batch is dropped without calling [`WriteBatch::commit`], all
//! operations are rolled back (the underlying LMDB transaction is aborted).

use heed::RwTxn;

use dpos_store::{StoreError, Table, WriteOp, WriteSet};

use crate::environment::LmdbEnvironment;
use crate::LmdbError;

pub struct WriteBatch<'a> {
    txn: RwTxn<'a>,
    env: &'a LmdbEnvironment,
    ops: usize,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(env: &'a LmdbEnvironment) -> Result<Self, LmdbError> {
        let txn = env.env().write_txn()?;
        Ok(Self { txn, env, ops: 0 })
    }

    pub fn put(&mut self, table: Table, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let db = self.env.db(table)?;
        db.put(&mut self.txn, key, value).map_err(LmdbError::from)?;
        self.ops += 1;
        Ok(())
    }

    /// Deleting an absent key is not an error.
    pub fn delete(&mut self, table: Table, key: &[u8]) -> Result<(), StoreError> {
        let db = self.env.db(table)?;
        db.delete(&mut self.txn, key).map_err(LmdbError::from)?;
        self.ops += 1;
        Ok(())
    }

    /// Queue every operation of `set` in order.
    pub fn apply(&mut self, set: WriteSet) -> Result<(), StoreError> {
        for op in set.into_ops() {
            match op {
                WriteOp::Put { table, key, value } => self.put(table, &key, &value)?,
                WriteOp::Delete { table, key } => self.delete(table, &key)?,
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops == 0
    }

    /// Commit all operations atomically.
    pub fn commit(self) -> Result<(), StoreError> {
        let ops = self.ops;
        self.txn.commit().map_err(LmdbError::from)?;
        tracing::trace!(ops, "committed write batch");
        Ok(())
    }
}
