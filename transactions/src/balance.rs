//! Balance operations: moving funds in and out of the transaction pool.
//!
//! A transaction withdraws from balances into a per-asset pool and deposits
//! from that pool into (possibly new) balances. Whatever base asset is left
//! in the pool is the transaction fee.

use dpos_types::{Address, Amount, AssetId, BalanceId, SlateId};
use serde::{Deserialize, Serialize};

/// Take `amount` out of an existing balance into the pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawOp {
    pub balance_id: BalanceId,
    pub amount: Amount,
}

/// Move `amount` of `asset_id` from the pool into the balance owned by
/// `owner` and voting for `slate`. The balance is created on first deposit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositOp {
    pub owner: Address,
    pub asset_id: AssetId,
    pub amount: Amount,
    pub slate: Option<SlateId>,
}

/// Direct balance-to-address transfer. The destination balance has the
/// source's asset and slate; the pool is not touched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOp {
    pub from: BalanceId,
    pub to: Address,
    pub amount: Amount,
}

/// Move a whole balance to the same owner and asset under a different slate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBalanceVoteOp {
    pub balance_id: BalanceId,
    pub slate: Option<SlateId>,
}
