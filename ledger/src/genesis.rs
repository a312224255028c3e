//! Genesis state: the initial delegates, accounts, base asset and balances
//! of a network.
//!
//! The genesis configuration is loaded from JSON. Its canonical encoding
//! hashes to the [`ChainId`], so two networks with different genesis files
//! never accept each other's signatures.

use std::collections::BTreeSet;
use std::path::Path;

use dpos_crypto::blake2b_256;
use dpos_types::{AccountId, Address, Amount, AssetId, ChainId, ChainParams, PublicKey, Timestamp};
use serde::{Deserialize, Serialize};

use crate::entries::{
    balance_id, AccountEntry, AssetEntry, BalanceEntry, ChainProperties, DelegateInfo,
};
use crate::error::LedgerError;
use crate::names::{is_valid_account_name, is_valid_symbol};
use crate::state::LedgerState;
use crate::undo::UndoDelta;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Chain time of the genesis state; must be slot-aligned.
    pub timestamp: Timestamp,
    pub base_asset: GenesisAsset,
    /// Initial delegates. They receive the lowest account ids in order and
    /// form the first round.
    pub delegates: Vec<GenesisDelegate>,
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
    #[serde(default)]
    pub balances: Vec<GenesisBalance>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAsset {
    pub symbol: String,
    pub name: String,
    pub precision: u64,
    pub max_supply: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisDelegate {
    pub name: String,
    pub owner_key: PublicKey,
    /// Defaults to the owner key.
    #[serde(default)]
    pub signing_key: Option<PublicKey>,
    #[serde(default = "default_pay_rate")]
    pub pay_rate: u8,
}

fn default_pay_rate() -> u8 {
    100
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub name: String,
    pub owner_key: PublicKey,
}

/// Initial base-asset balance of the address derived from `owner`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisBalance {
    pub owner: PublicKey,
    pub amount: Amount,
}

impl GenesisConfig {
    pub fn from_json_str(json: &str) -> Result<Self, LedgerError> {
        serde_json::from_str(json).map_err(|e| LedgerError::Genesis(e.to_string()))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, LedgerError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Genesis(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> Result<String, LedgerError> {
        serde_json::to_string_pretty(self).map_err(|e| LedgerError::Genesis(e.to_string()))
    }

    /// Hash of the canonical encoding of this configuration.
    pub fn chain_id(&self) -> Result<ChainId, LedgerError> {
        let bytes = bincode::serialize(self).map_err(|e| LedgerError::Genesis(e.to_string()))?;
        Ok(ChainId::new(blake2b_256(&bytes)))
    }

    fn validate(&self, params: &ChainParams) -> Result<(), LedgerError> {
        let fail = |msg: String| Err(LedgerError::Genesis(msg));

        if self.delegates.is_empty() {
            return fail("at least one delegate is required".into());
        }
        if !self.timestamp.is_aligned(params.block_interval_secs) {
            return fail(format!(
                "timestamp {} is not a multiple of the {}s block interval",
                self.timestamp, params.block_interval_secs
            ));
        }
        if !is_valid_symbol(&self.base_asset.symbol) {
            return fail(format!("invalid base asset symbol '{}'", self.base_asset.symbol));
        }

        let mut names = BTreeSet::new();
        let all_names = self
            .delegates
            .iter()
            .map(|d| &d.name)
            .chain(self.accounts.iter().map(|a| &a.name));
        for name in all_names {
            if !is_valid_account_name(name) || name.contains('.') {
                return fail(format!("invalid genesis account name '{}'", name));
            }
            if !names.insert(name) {
                return fail(format!("duplicate genesis account name '{}'", name));
            }
        }
        if let Some(d) = self.delegates.iter().find(|d| d.pay_rate > 100) {
            return fail(format!("delegate {} has pay rate {} > 100", d.name, d.pay_rate));
        }
        Ok(())
    }

    /// Build the genesis ledger state.
    pub fn build_state(&self, params: &ChainParams) -> Result<LedgerState, LedgerError> {
        self.validate(params)?;

        let mut state = LedgerState::new();
        // Genesis is never popped; the delta is discarded.
        let mut delta = UndoDelta::new();
        let now = self.timestamp;
        let mut next_id = 1u32;

        for d in &self.delegates {
            let signing_key = d.signing_key.unwrap_or(d.owner_key);
            state.put_account(
                AccountEntry {
                    id: AccountId(next_id),
                    name: d.name.clone(),
                    owner_key: d.owner_key,
                    active_key: d.owner_key,
                    registration_date: now,
                    last_update: now,
                    delegate_info: Some(DelegateInfo::new(d.pay_rate, signing_key)),
                    retracted: false,
                },
                &mut delta,
            );
            next_id += 1;
        }
        for a in &self.accounts {
            state.put_account(
                AccountEntry {
                    id: AccountId(next_id),
                    name: a.name.clone(),
                    owner_key: a.owner_key,
                    active_key: a.owner_key,
                    registration_date: now,
                    last_update: now,
                    delegate_info: None,
                    retracted: false,
                },
                &mut delta,
            );
            next_id += 1;
        }

        let mut supply = Amount::ZERO;
        for b in &self.balances {
            supply = supply
                .checked_add(b.amount)
                .ok_or_else(|| LedgerError::Genesis("initial balances overflow".into()))?;
            let owner = Address::from_public_key(&b.owner);
            let id = balance_id(&owner, AssetId::BASE, None);
            let amount = match state.balance(&id) {
                Some(existing) => existing.amount + b.amount,
                None => b.amount,
            };
            state.put_balance(
                BalanceEntry {
                    id,
                    owner,
                    asset_id: AssetId::BASE,
                    amount,
                    slate: None,
                    last_update: now,
                },
                &mut delta,
            );
        }
        if supply > self.base_asset.max_supply {
            return Err(LedgerError::Genesis(format!(
                "initial balances {} exceed max supply {}",
                supply, self.base_asset.max_supply
            )));
        }

        state.put_asset(
            AssetEntry {
                id: AssetId::BASE,
                symbol: self.base_asset.symbol.clone(),
                name: self.base_asset.name.clone(),
                issuer: None,
                precision: self.base_asset.precision,
                max_supply: self.base_asset.max_supply,
                current_supply: supply,
                collected_fees: Amount::ZERO,
                registration_date: now,
            },
            &mut delta,
        );

        let active: Vec<AccountId> = (1..=self.delegates.len() as u32)
            .take(params.num_delegates as usize)
            .map(AccountId)
            .collect();
        let last_account_id = next_id - 1;
        state.update_properties(&mut delta, |p| {
            *p = ChainProperties {
                head_timestamp: now,
                active_delegates: active,
                last_account_id,
                last_asset_id: 0,
                ..ChainProperties::default()
            }
        });

        Ok(state)
    }
}
