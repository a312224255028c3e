//! The DPOS scheduler: slot arithmetic, active delegate selection, the
//! per-round shuffle and block signer validation.
//!
//! Time is cut into slots of `block_interval_secs`. Each round of
//! `num_delegates` blocks is produced by the active delegates in a shuffled
//! order; slot `s` belongs to `active[s % active.len()]`.

use dpos_crypto::blake2b_256;
use dpos_ledger::LedgerState;
use dpos_transactions::SignedBlock;
use dpos_types::{AccountId, Amount, BlockId, ChainParams, Timestamp};

use crate::error::ConsensusError;

/// Slot index of `timestamp`.
pub fn slot_number(timestamp: Timestamp, interval_secs: u64) -> u64 {
    timestamp.as_secs() / interval_secs.max(1)
}

/// Delegate allowed to sign the block of `timestamp`'s slot.
pub fn expected_signer(
    active: &[AccountId],
    timestamp: Timestamp,
    interval_secs: u64,
) -> Option<AccountId> {
    if active.is_empty() {
        return None;
    }
    let index = slot_number(timestamp, interval_secs) % active.len() as u64;
    active.get(index as usize).copied()
}

/// Whether a new round starts after block `block_num`.
pub fn is_round_boundary(block_num: u32, num_delegates: u32) -> bool {
    num_delegates != 0 && block_num % num_delegates == 0
}

/// Top `count` non-retracted delegates by votes (descending), ties broken
/// by ascending account id. The result is sorted in that order.
pub fn select_active(state: &LedgerState, count: u32) -> Vec<AccountId> {
    let mut ranked: Vec<(Amount, AccountId)> = state
        .delegates()
        .filter(|a| !a.retracted)
        .filter_map(|a| a.delegate_info.as_ref().map(|d| (d.votes_for, a.id)))
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    ranked
        .into_iter()
        .take(count as usize)
        .map(|(_, id)| id)
        .collect()
}

/// Deterministic Fisher–Yates shuffle seeded with
/// `blake2b(round_end_block || random_seed)`.
///
/// Each draw consumes 8 bytes of the current hash; after four draws the
/// hash is re-hashed.
pub fn shuffle(delegates: &mut [AccountId], round_end_block: &BlockId, random_seed: &[u8; 32]) {
    let mut seed_input = [0u8; 64];
    seed_input[..32].copy_from_slice(round_end_block.as_bytes());
    seed_input[32..].copy_from_slice(random_seed);
    let mut hash = blake2b_256(&seed_input);

    let n = delegates.len();
    let mut word = 0usize;
    for i in 0..n {
        let mut chunk = [0u8; 8];
        chunk.copy_from_slice(&hash[word * 8..word * 8 + 8]);
        let r = u64::from_le_bytes(chunk);
        let choices = (n - i) as u64;
        let j = (r % choices) as usize + i;
        delegates.swap(i, j);

        word = (word + 1) & 3;
        if word == 0 {
            hash = blake2b_256(&hash);
        }
    }
}

/// The active list for the round starting after `round_end_block`.
pub fn next_round(
    state: &LedgerState,
    params: &ChainParams,
    round_end_block: &BlockId,
) -> Vec<AccountId> {
    let mut active = select_active(state, params.num_delegates);
    shuffle(&mut active, round_end_block, &state.properties().random_seed);
    active
}

/// Check a block's timestamp and signer against the head and the active
/// list. Returns the signing delegate.
pub fn validate_block_signer(
    block: &SignedBlock,
    state: &LedgerState,
    params: &ChainParams,
    now: Timestamp,
) -> Result<AccountId, ConsensusError> {
    let timestamp = block.timestamp();
    let interval_secs = params.block_interval_secs;
    if !timestamp.is_aligned(interval_secs) {
        return Err(ConsensusError::MisalignedTimestamp {
            timestamp,
            interval_secs,
        });
    }
    let head = state.properties().head_timestamp;
    if timestamp <= head {
        return Err(ConsensusError::SlotInPast { timestamp, head });
    }
    let max_skew_secs = params.max_clock_skew_secs;
    if timestamp > now.plus_secs(max_skew_secs) {
        return Err(ConsensusError::SlotTooFarFuture {
            timestamp,
            now,
            max_skew_secs,
        });
    }

    let expected = expected_signer(&state.properties().active_delegates, timestamp, interval_secs)
        .ok_or(ConsensusError::NoActiveDelegates)?;
    let signing_key = state
        .account(expected)
        .and_then(|a| a.delegate_info.as_ref())
        .map(|d| d.signing_key)
        .ok_or(ConsensusError::UnknownDelegate(expected))?;
    if !block.is_signed_by(&signing_key)? {
        return Err(ConsensusError::WrongDelegate {
            timestamp,
            expected,
        });
    }
    Ok(expected)
}

/// Slots strictly between the head and `timestamp` that received no block,
/// with the delegate each belonged to. Empty while the head is genesis.
pub fn missed_slots(
    state: &LedgerState,
    params: &ChainParams,
    timestamp: Timestamp,
) -> Vec<(Timestamp, AccountId)> {
    let props = state.properties();
    if props.head_block_num == 0 {
        return Vec::new();
    }
    let interval = params.block_interval_secs.max(1);
    let mut missed = Vec::new();
    let mut slot = props.head_timestamp.plus_secs(interval);
    while slot < timestamp {
        if let Some(id) = expected_signer(&props.active_delegates, slot, interval) {
            missed.push((slot, id));
        }
        slot = slot.plus_secs(interval);
    }
    missed
}

/// Earliest slot strictly after the head, and not before `not_before`, whose
/// signer is one of `delegates`. Searches at most one full round.
pub fn next_producible_timestamp(
    state: &LedgerState,
    params: &ChainParams,
    delegates: &[AccountId],
    not_before: Timestamp,
) -> Option<(Timestamp, AccountId)> {
    let props = state.properties();
    let interval = params.block_interval_secs.max(1);
    let active = &props.active_delegates;
    let start = std::cmp::max(props.head_timestamp.plus_secs(interval), not_before);
    let mut slot = Timestamp::new(start.as_secs().div_ceil(interval) * interval);
    for _ in 0..active.len() {
        if let Some(id) = expected_signer(active, slot, interval) {
            if delegates.contains(&id) {
                return Some((slot, id));
            }
        }
        slot = slot.plus_secs(interval);
    }
    None
}
