//! LMDB storage backend for the DPOS chain database.
//!
//! Implements [`dpos_store::KvStore`] using the `heed` LMDB bindings. Each
//! [`dpos_store::Table`] maps to one named LMDB database inside a single
//! environment, so a [`dpos_store::WriteSet`] commits as one LMDB write
//! transaction.

pub mod environment;
pub mod error;
pub mod integrity;
pub mod migration;
pub mod write_batch;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use migration::{Migrator, CURRENT_SCHEMA_VERSION};
pub use write_batch::WriteBatch;
