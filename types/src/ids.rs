//! Sequentially assigned ledger identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Account id, assigned sequentially from 1 at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u32);

/// Asset id, assigned sequentially from 1; 0 is the base asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(pub u32);

impl AssetId {
    /// The chain's base asset: fees, delegate pay and votes are denominated in it.
    pub const BASE: Self = Self(0);

    pub fn is_base(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account#{}", self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset#{}", self.0)
    }
}

/// Look an account up by name or id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountRef {
    Id(AccountId),
    Name(String),
}

impl From<AccountId> for AccountRef {
    fn from(id: AccountId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for AccountRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Look an asset up by symbol or id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetRef {
    Id(AssetId),
    Symbol(String),
}

impl From<AssetId> for AssetRef {
    fn from(id: AssetId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for AssetRef {
    fn from(symbol: &str) -> Self {
        Self::Symbol(symbol.to_string())
    }
}
