//! Metadata storage on top of the [`Table::Meta`] table.

use crate::{KvStore, StoreError, Table};

const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Database metadata (schema version, chain id of the data directory, ...).
///
/// Implemented for every [`KvStore`].
pub trait MetaStore {
    /// Store a metadata value.
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Retrieve a metadata value.
    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Delete a metadata entry.
    fn delete_meta(&self, key: &str) -> Result<(), StoreError>;

    /// Current schema version; 0 for a fresh database.
    fn get_schema_version(&self) -> Result<u32, StoreError>;

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError>;
}

impl<S: KvStore + ?Sized> MetaStore for S {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.put(Table::Meta, key.as_bytes(), value)
    }

    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.get(Table::Meta, key.as_bytes())?
            .ok_or_else(|| StoreError::NotFound(format!("meta key '{}'", key)))
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        self.delete(Table::Meta, key.as_bytes())
    }

    fn get_schema_version(&self) -> Result<u32, StoreError> {
        match self.get(Table::Meta, SCHEMA_VERSION_KEY)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::Corruption("schema_version has unexpected byte length".into())
                })?;
                Ok(u32::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        self.put(Table::Meta, SCHEMA_VERSION_KEY, &version.to_le_bytes())
    }
}
