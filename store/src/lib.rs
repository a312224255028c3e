//! Abstract durable storage for the DPOS chain database.
//!
//! Every backend (LMDB, in-memory for testing) implements [`KvStore`]: point
//! reads, full-table scans and an atomic multi-key commit. The chain
//! database writes each pushed or popped block as a single [`WriteSet`], so
//! a crash never leaves a half-applied block on disk.

pub mod batch;
pub mod codec;
pub mod error;
pub mod kv;
pub mod meta;
pub mod table;

pub use batch::{WriteOp, WriteSet};
pub use codec::{decode, encode};
pub use error::StoreError;
pub use kv::{get_value, scan_values, KvStore};
pub use meta::MetaStore;
pub use table::Table;
