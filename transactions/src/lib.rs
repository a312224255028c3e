//! Operations, signed transactions and signed blocks.
//!
//! Operation kinds:
//! - **Withdraw / Deposit / Transfer**: move funds between balances via the
//!   transaction pool
//! - **UpdateBalanceVote**: re-point a balance's votes at another slate
//! - **RegisterAccount / UpdateAccount**: named accounts and key rotation
//! - **RegisterDelegate / UpdateSigningKey / WithdrawPay**: block producers
//! - **RegisterAsset / IssueAsset**: user-issued assets
//! - **DefineSlate**: delegate sets for voting

pub mod account;
pub mod asset;
pub mod balance;
pub mod block;
pub mod codec;
pub mod error;
pub mod slate;
pub mod transaction;
pub mod validation;

pub use account::{
    RegisterAccountOp, RegisterDelegateOp, UpdateAccountOp, UpdateSigningKeyOp, WithdrawPayOp,
};
pub use asset::{IssueAssetOp, RegisterAssetOp};
pub use balance::{DepositOp, TransferOp, UpdateBalanceVoteOp, WithdrawOp};
pub use block::{BlockHeader, SignedBlock};
pub use error::TransactionError;
pub use slate::{slate_id, DefineSlateOp};
pub use transaction::{SignedTransaction, TxSignature};

use dpos_types::Amount;
use serde::{Deserialize, Serialize};

/// The unified operation enum wrapping every operation kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Withdraw(WithdrawOp),
    Deposit(DepositOp),
    Transfer(TransferOp),
    RegisterAccount(RegisterAccountOp),
    UpdateAccount(UpdateAccountOp),
    RegisterDelegate(RegisterDelegateOp),
    UpdateSigningKey(UpdateSigningKeyOp),
    WithdrawPay(WithdrawPayOp),
    RegisterAsset(RegisterAssetOp),
    IssueAsset(IssueAssetOp),
    DefineSlate(DefineSlateOp),
    UpdateBalanceVote(UpdateBalanceVoteOp),
}

impl Operation {
    /// Short name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Withdraw(_) => "withdraw",
            Self::Deposit(_) => "deposit",
            Self::Transfer(_) => "transfer",
            Self::RegisterAccount(_) => "register_account",
            Self::UpdateAccount(_) => "update_account",
            Self::RegisterDelegate(_) => "register_delegate",
            Self::UpdateSigningKey(_) => "update_signing_key",
            Self::WithdrawPay(_) => "withdraw_pay",
            Self::RegisterAsset(_) => "register_asset",
            Self::IssueAsset(_) => "issue_asset",
            Self::DefineSlate(_) => "define_slate",
            Self::UpdateBalanceVote(_) => "update_balance_vote",
        }
    }

    /// The amount moved by this operation, for kinds that move one.
    pub fn amount(&self) -> Option<Amount> {
        match self {
            Self::Withdraw(op) => Some(op.amount),
            Self::Deposit(op) => Some(op.amount),
            Self::Transfer(op) => Some(op.amount),
            Self::WithdrawPay(op) => Some(op.amount),
            Self::IssueAsset(op) => Some(op.amount),
            Self::RegisterAccount(_)
            | Self::UpdateAccount(_)
            | Self::RegisterDelegate(_)
            | Self::UpdateSigningKey(_)
            | Self::RegisterAsset(_)
            | Self::DefineSlate(_)
            | Self::UpdateBalanceVote(_) => None,
        }
    }
}
