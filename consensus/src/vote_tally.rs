//! Delegate vote totals recomputed from balances.
//!
//! The ledger maintains `votes_for` incrementally on every withdraw,
//! deposit, vote change and pay event. The tally recomputes the same totals
//! from scratch: every base-asset balance voting with a slate credits each
//! delegate of the slate, and a delegate's unclaimed pay counts for itself.

use std::collections::HashMap;

use dpos_ledger::LedgerState;
use dpos_types::{AccountId, Amount};

/// Delegate id → recomputed votes.
#[derive(Clone, Debug, Default)]
pub struct VoteTally {
    votes: HashMap<AccountId, u128>,
    total: u128,
}

/// A delegate whose recorded votes differ from the recomputed tally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteMismatch {
    pub delegate: AccountId,
    pub recorded: Amount,
    pub tallied: u128,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_votes(&mut self, delegate: AccountId, amount: u128) {
        let entry = self.votes.entry(delegate).or_insert(0);
        *entry = entry.saturating_add(amount);
        self.total = self.total.saturating_add(amount);
    }

    /// Remove votes, clamped at zero. Entries reaching zero are dropped.
    pub fn remove_votes(&mut self, delegate: AccountId, amount: u128) {
        if let Some(entry) = self.votes.get_mut(&delegate) {
            let removed = amount.min(*entry);
            *entry -= removed;
            self.total = self.total.saturating_sub(removed);
            if *entry == 0 {
                self.votes.remove(&delegate);
            }
        }
    }

    pub fn votes(&self, delegate: AccountId) -> u128 {
        self.votes.get(&delegate).copied().unwrap_or(0)
    }

    pub fn total_votes(&self) -> u128 {
        self.total
    }

    pub fn delegate_count(&self) -> usize {
        self.votes.len()
    }

    /// Recompute every delegate's votes from the ledger.
    pub fn from_state(state: &LedgerState) -> Self {
        let mut tally = Self::new();
        for balance in state.balances() {
            if !balance.asset_id.is_base() {
                continue;
            }
            let Some(slate) = balance.slate.and_then(|s| state.slate(&s)) else {
                continue;
            };
            for delegate in &slate.delegates {
                if state.account(*delegate).is_some_and(|a| a.is_delegate()) {
                    tally.add_votes(*delegate, balance.amount.raw() as u128);
                }
            }
        }
        for account in state.delegates() {
            if let Some(info) = &account.delegate_info {
                tally.add_votes(account.id, info.pay_balance.raw() as u128);
            }
        }
        tally
    }

    /// Delegates whose recorded `votes_for` disagrees with this tally.
    pub fn mismatches(&self, state: &LedgerState) -> Vec<VoteMismatch> {
        state
            .delegates()
            .filter_map(|a| {
                let recorded = a.delegate_info.as_ref()?.votes_for;
                let tallied = self.votes(a.id);
                (recorded.raw() as u128 != tallied).then_some(VoteMismatch {
                    delegate: a.id,
                    recorded,
                    tallied,
                })
            })
            .collect()
    }
}
