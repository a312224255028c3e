//! Account and delegate operations.

use dpos_types::{AccountId, Amount, PublicKey};
use serde::{Deserialize, Serialize};

/// Register a new named account. With `delegate_pay_rate` set, the account
/// is registered as a delegate in the same step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAccountOp {
    pub name: String,
    pub owner_key: PublicKey,
    pub active_key: PublicKey,
    pub delegate_pay_rate: Option<u8>,
}

/// Replace an account's active key. Requires the owner key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAccountOp {
    pub account_id: AccountId,
    pub active_key: PublicKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterDelegateOp {
    pub account_id: AccountId,
    /// Percentage (0..=100) of the maximum per-block pay the delegate accepts.
    pub pay_rate: u8,
}

/// Rotate the key a delegate signs blocks with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSigningKeyOp {
    pub account_id: AccountId,
    pub signing_key: PublicKey,
}

/// Move accumulated delegate pay into the transaction pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawPayOp {
    pub account_id: AccountId,
    pub amount: Amount,
}
