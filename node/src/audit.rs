//! Supply and vote audit of the ledger state.
//!
//! For every asset, recomputes the outstanding supply from balances,
//! delegate pay balances (base asset only) and collected fees, and compares
//! it with the recorded `current_supply`. Delegate votes are recomputed with
//! [`VoteTally`].

use dpos_consensus::{VoteMismatch, VoteTally};
use dpos_ledger::LedgerState;
use dpos_types::{Amount, AssetId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyMismatch {
    pub asset_id: AssetId,
    pub symbol: String,
    pub recorded: Amount,
    pub computed: u128,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub assets_checked: usize,
    pub supply_mismatches: Vec<SupplyMismatch>,
    /// Assets whose supply exceeds their maximum.
    pub over_max_supply: Vec<AssetId>,
    pub vote_mismatches: Vec<VoteMismatch>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.supply_mismatches.is_empty()
            && self.over_max_supply.is_empty()
            && self.vote_mismatches.is_empty()
    }
}

pub fn audit_state(state: &LedgerState) -> AuditReport {
    let mut report = AuditReport::default();

    for asset in state.assets() {
        report.assets_checked += 1;
        let mut computed: u128 = state
            .balances()
            .filter(|b| b.asset_id == asset.id)
            .map(|b| b.amount.raw() as u128)
            .sum();
        computed += asset.collected_fees.raw() as u128;
        if asset.id.is_base() {
            computed += state
                .delegates()
                .filter_map(|a| a.delegate_info.as_ref())
                .map(|d| d.pay_balance.raw() as u128)
                .sum::<u128>();
        }

        if computed != asset.current_supply.raw() as u128 {
            report.supply_mismatches.push(SupplyMismatch {
                asset_id: asset.id,
                symbol: asset.symbol.clone(),
                recorded: asset.current_supply,
                computed,
            });
        }
        if asset.current_supply > asset.max_supply {
            report.over_max_supply.push(asset.id);
        }
    }

    report.vote_mismatches = VoteTally::from_state(state).mismatches(state);
    report
}
