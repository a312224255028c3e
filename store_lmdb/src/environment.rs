//! LMDB environment setup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use dpos_store::{KvStore, StoreError, Table, WriteSet};

use crate::write_batch::WriteBatch;
use crate::LmdbError;

/// Default LMDB map size: 16 GiB of address space. Pages are only
/// allocated on write.
pub const DEFAULT_MAP_SIZE: usize = 16 * 1024 * 1024 * 1024;

/// Wraps the LMDB environment and one database handle per [`Table`].
pub struct LmdbEnvironment {
    env: Env,
    databases: HashMap<Table, Database<Bytes, Bytes>>,
    path: PathBuf,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path, creating every
    /// table database that does not exist yet.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process for this path;
        // the chain database never opens the same directory twice.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(Table::ALL.len() as u32)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let mut databases = HashMap::with_capacity(Table::ALL.len());
        for table in Table::ALL {
            let db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some(table.name()))?;
            databases.insert(table, db);
        }
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env,
            databases,
            path: path.to_path_buf(),
        })
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn db(&self, table: Table) -> Result<Database<Bytes, Bytes>, LmdbError> {
        self.databases
            .get(&table)
            .copied()
            .ok_or(LmdbError::MissingDatabase(table.name()))
    }

    /// Begin a write batch. Dropping it without committing aborts.
    pub fn write_batch(&self) -> Result<WriteBatch<'_>, LmdbError> {
        WriteBatch::new(self)
    }

    /// Flush OS buffers to disk.
    pub fn sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync()?;
        Ok(())
    }
}

impl KvStore for LmdbEnvironment {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let db = self.db(table)?;
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let value = db.get(&rtxn, key).map_err(LmdbError::from)?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn scan(&self, table: Table) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let db = self.db(table)?;
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut out = Vec::new();
        for item in db.iter(&rtxn).map_err(LmdbError::from)? {
            let (k, v) = item.map_err(LmdbError::from)?;
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    fn count(&self, table: Table) -> Result<u64, StoreError> {
        let db = self.db(table)?;
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(db.len(&rtxn).map_err(LmdbError::from)?)
    }

    fn commit(&self, batch: WriteSet) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut wb = self.write_batch()?;
        wb.apply(batch)?;
        wb.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpos_store::MetaStore;

    fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let env = LmdbEnvironment::open(dir.path(), 64 * 1024 * 1024).expect("failed to open env");
        (dir, env)
    }

    #[test]
    fn open_creates_every_table() {
        let (_dir, env) = temp_env();
        for table in Table::ALL {
            assert_eq!(env.count(table).unwrap(), 0);
        }
    }

    #[test]
    fn put_get_delete() {
        let (_dir, env) = temp_env();
        env.put(Table::Blocks, b"k1", b"v1").unwrap();
        assert_eq!(env.get(Table::Blocks, b"k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(env.get(Table::Accounts, b"k1").unwrap(), None);

        env.delete(Table::Blocks, b"k1").unwrap();
        assert_eq!(env.get(Table::Blocks, b"k1").unwrap(), None);
    }

    #[test]
    fn scan_returns_keys_in_order() {
        let (_dir, env) = temp_env();
        let mut set = WriteSet::new();
        for n in [3u32, 1, 2] {
            set.put(Table::BlockNumbers, n.to_be_bytes(), vec![n as u8]);
        }
        env.commit(set).unwrap();

        let keys: Vec<u32> = env
            .scan(Table::BlockNumbers)
            .unwrap()
            .into_iter()
            .map(|(k, _)| u32::from_be_bytes(k.try_into().unwrap()))
            .collect();
        assert_eq!(keys, vec![1, 2, 3]);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let env = LmdbEnvironment::open(dir.path(), 64 * 1024 * 1024).unwrap();
            env.put(Table::Properties, b"head", b"abc").unwrap();
            env.set_schema_version(1).unwrap();
        }
        let env = LmdbEnvironment::open(dir.path(), 64 * 1024 * 1024).unwrap();
        assert_eq!(env.get(Table::Properties, b"head").unwrap(), Some(b"abc".to_vec()));
        assert_eq!(env.get_schema_version().unwrap(), 1);
    }
}
