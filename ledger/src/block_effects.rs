//! Per-block ledger effects outside of transactions: delegate pay, slot
//! bookkeeping, active delegate list and head/random-seed advancement.
//!
//! Every function records its writes into the block's undo delta so popping
//! the block reverts them with the transactions.

use dpos_crypto::blake2b_256_multi;
use dpos_types::{AccountId, Amount, AssetId, BlockId, ChainParams, Timestamp};
use serde::{Deserialize, Serialize};

use crate::entries::{AccountEntry, SlotEntry};
use crate::error::LedgerError;
use crate::state::LedgerState;
use crate::undo::UndoDelta;

/// What a block's signer was paid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatePay {
    /// Newly issued base shares.
    pub issued: Amount,
    /// Collected fees released by this block.
    pub fees_released: Amount,
    /// Part of the released fees that was destroyed instead of paid.
    pub fees_destroyed: Amount,
    /// Total credited to the delegate's pay balance.
    pub paid: Amount,
}

fn delegate(state: &LedgerState, id: AccountId) -> Result<AccountEntry, LedgerError> {
    state
        .account(id)
        .filter(|a| a.is_delegate())
        .cloned()
        .ok_or_else(|| LedgerError::Inconsistent(format!("{} is not a delegate", id)))
}

/// Pay the signer of a block: new shares scaled by its pay rate, capped by
/// the remaining base supply, plus its pay-rate share of the released fees.
/// The rest of the released fees is destroyed.
pub fn pay_delegate(
    state: &mut LedgerState,
    delegate_id: AccountId,
    params: &ChainParams,
    delta: &mut UndoDelta,
) -> Result<DelegatePay, LedgerError> {
    let mut account = delegate(state, delegate_id)?;
    let mut base = state
        .asset(AssetId::BASE)
        .cloned()
        .ok_or_else(|| LedgerError::Inconsistent("base asset missing".into()))?;
    let Some(info) = account.delegate_info.as_mut() else {
        return Err(LedgerError::Inconsistent(format!("{} has no delegate info", delegate_id)));
    };

    let room = base.max_supply.saturating_sub(base.current_supply);
    let issued = Amount::new(params.max_delegate_pay_per_block)
        .percent(info.pay_rate)
        .min(room);
    let fees_released =
        Amount::new(base.collected_fees.raw() / u64::from(params.fee_release_blocks.max(1)));
    let to_delegate = fees_released.percent(info.pay_rate);
    let fees_destroyed = fees_released.saturating_sub(to_delegate);
    let paid = issued + to_delegate;

    if paid.is_zero() && fees_released.is_zero() {
        return Ok(DelegatePay::default());
    }

    base.collected_fees = base.collected_fees.saturating_sub(fees_released);
    base.current_supply = (base.current_supply + issued).saturating_sub(fees_destroyed);
    info.pay_balance = info.pay_balance + paid;
    info.total_paid = info.total_paid + paid;
    info.votes_for = info.votes_for + paid;

    state.put_asset(base, delta);
    state.put_account(account, delta);

    Ok(DelegatePay {
        issued,
        fees_released,
        fees_destroyed,
        paid,
    })
}

/// Record that `delegate_id` produced `block_id` in the slot at `timestamp`.
pub fn record_produced(
    state: &mut LedgerState,
    delegate_id: AccountId,
    block_num: u32,
    timestamp: Timestamp,
    block_id: BlockId,
    delta: &mut UndoDelta,
) -> Result<(), LedgerError> {
    let mut account = delegate(state, delegate_id)?;
    if let Some(info) = account.delegate_info.as_mut() {
        info.blocks_produced += 1;
        info.last_block_num_produced = block_num;
    }
    state.put_account(account, delta);
    state.put_slot(
        SlotEntry {
            timestamp,
            delegate_id,
            block_id: Some(block_id),
        },
        delta,
    );
    Ok(())
}

/// Record that `delegate_id` missed the slot at `timestamp`.
pub fn record_missed(
    state: &mut LedgerState,
    delegate_id: AccountId,
    timestamp: Timestamp,
    delta: &mut UndoDelta,
) -> Result<(), LedgerError> {
    let mut account = delegate(state, delegate_id)?;
    if let Some(info) = account.delegate_info.as_mut() {
        info.blocks_missed += 1;
    }
    state.put_account(account, delta);
    state.put_slot(
        SlotEntry {
            timestamp,
            delegate_id,
            block_id: None,
        },
        delta,
    );
    Ok(())
}

pub fn set_active_delegates(
    state: &mut LedgerState,
    active: Vec<AccountId>,
    delta: &mut UndoDelta,
) {
    state.update_properties(delta, |p| p.active_delegates = active);
}

/// Seed after a block: `blake2b(block_id || previous seed)`.
pub fn next_random_seed(block_id: &BlockId, seed: &[u8; 32]) -> [u8; 32] {
    blake2b_256_multi(&[block_id.as_bytes(), seed])
}

/// Move the head to the given block and evolve the random seed.
pub fn advance_head(
    state: &mut LedgerState,
    block_id: BlockId,
    block_num: u32,
    timestamp: Timestamp,
    delta: &mut UndoDelta,
) {
    let seed = next_random_seed(&block_id, &state.properties().random_seed);
    state.update_properties(delta, |p| {
        p.head_block_id = block_id;
        p.head_block_num = block_num;
        p.head_timestamp = timestamp;
        p.random_seed = seed;
    });
}
