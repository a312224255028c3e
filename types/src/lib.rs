//! Fundamental types for the DPOS chain database.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! identifiers, addresses, keys, amounts, timestamps, chain parameters and the
//! error taxonomy.

pub mod address;
pub mod amount;
pub mod block;
pub mod error;
pub mod hash;
pub mod hex32;
pub mod ids;
pub mod keys;
pub mod network;
pub mod params;
pub mod time;

pub use address::Address;
pub use amount::Amount;
pub use block::{BlockId, BlockRef};
pub use error::ErrorKind;
pub use hash::{BalanceId, ChainId, SlateId, TxId};
pub use ids::{AccountId, AccountRef, AssetId, AssetRef};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use network::NetworkId;
pub use params::ChainParams;
pub use time::{Clock, SystemClock, Timestamp};
