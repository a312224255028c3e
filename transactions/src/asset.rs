//! User-issued asset operations.

use dpos_types::{AccountId, Amount, AssetId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAssetOp {
    pub symbol: String,
    pub name: String,
    pub issuer: AccountId,
    /// Smallest unit divisor: a power of ten up to 10^8.
    pub precision: u64,
    pub max_supply: Amount,
}

/// Issue new units of an asset into the pool. Only the issuer may do this.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueAssetOp {
    pub asset_id: AssetId,
    pub amount: Amount,
}
