//! Ledger entities.

use std::collections::BTreeMap;

use dpos_crypto::blake2b_256_multi;
use dpos_transactions::SignedTransaction;
use dpos_types::{
    AccountId, Address, Amount, AssetId, BalanceId, BlockId, PublicKey, SlateId, Timestamp, TxId,
};
use serde::{Deserialize, Serialize};

/// A named account. Accounts are never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub id: AccountId,
    pub name: String,
    pub owner_key: PublicKey,
    pub active_key: PublicKey,
    pub registration_date: Timestamp,
    pub last_update: Timestamp,
    pub delegate_info: Option<DelegateInfo>,
    pub retracted: bool,
}

impl AccountEntry {
    pub fn is_delegate(&self) -> bool {
        self.delegate_info.is_some()
    }

    pub fn owner_address(&self) -> Address {
        Address::from_public_key(&self.owner_key)
    }

    pub fn active_address(&self) -> Address {
        Address::from_public_key(&self.active_key)
    }

    /// Votes for this account as a delegate; zero for non-delegates.
    pub fn votes_for(&self) -> Amount {
        self.delegate_info
            .as_ref()
            .map_or(Amount::ZERO, |d| d.votes_for)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateInfo {
    pub votes_for: Amount,
    /// Percentage (0..=100) of the maximum per-block pay accepted.
    pub pay_rate: u8,
    pub signing_key: PublicKey,
    pub pay_balance: Amount,
    pub total_paid: Amount,
    pub blocks_produced: u32,
    pub blocks_missed: u32,
    pub last_block_num_produced: u32,
}

impl DelegateInfo {
    pub fn new(pay_rate: u8, signing_key: PublicKey) -> Self {
        Self {
            votes_for: Amount::ZERO,
            pay_rate,
            signing_key,
            pay_balance: Amount::ZERO,
            total_paid: Amount::ZERO,
            blocks_produced: 0,
            blocks_missed: 0,
            last_block_num_produced: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub id: AssetId,
    pub symbol: String,
    pub name: String,
    /// `None` for the base asset, which ordinary operations can not issue.
    pub issuer: Option<AccountId>,
    pub precision: u64,
    pub max_supply: Amount,
    pub current_supply: Amount,
    /// Fees paid in this asset and not yet released to delegates.
    pub collected_fees: Amount,
    pub registration_date: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub id: BalanceId,
    pub owner: Address,
    pub asset_id: AssetId,
    pub amount: Amount,
    pub slate: Option<SlateId>,
    pub last_update: Timestamp,
}

/// Id of the balance owned by `owner` in `asset_id` voting for `slate`.
pub fn balance_id(owner: &Address, asset_id: AssetId, slate: Option<SlateId>) -> BalanceId {
    let slate_bytes = slate.map_or([0u8; 32], |s| *s.as_bytes());
    BalanceId::new(blake2b_256_multi(&[
        owner.as_bytes(),
        &asset_id.0.to_be_bytes(),
        &slate_bytes,
    ]))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlateEntry {
    pub id: SlateId,
    pub delegates: Vec<AccountId>,
}

/// One production slot. `block_id` is `None` when the delegate missed it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub timestamp: Timestamp,
    pub delegate_id: AccountId,
    pub block_id: Option<BlockId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxLocation {
    pub block_num: u32,
    pub trx_index: u32,
}

/// Result of applying a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: TxId,
    /// Amount left in the pool per asset, collected as fees.
    pub fees: BTreeMap<AssetId, Amount>,
    pub created_accounts: Vec<AccountId>,
    pub created_assets: Vec<AssetId>,
    pub created_balances: Vec<BalanceId>,
}

impl Receipt {
    pub fn base_fee(&self) -> Amount {
        self.fees.get(&AssetId::BASE).copied().unwrap_or(Amount::ZERO)
    }
}

/// An included transaction and where it was included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEntry {
    pub id: TxId,
    pub transaction: SignedTransaction,
    pub location: TxLocation,
    pub receipt: Receipt,
}

/// Chain-wide properties stored next to the entities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProperties {
    pub head_block_id: BlockId,
    pub head_block_num: u32,
    pub head_timestamp: Timestamp,
    #[serde(with = "dpos_types::hex32")]
    pub random_seed: [u8; 32],
    /// Active delegates of the current round in shuffled slot order.
    pub active_delegates: Vec<AccountId>,
    pub last_account_id: u32,
    pub last_asset_id: u32,
}
