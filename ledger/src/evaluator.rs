//! The transaction validator: stateless checks, timing, signatures,
//! duplicates, atomic application of every operation and fees.

use dpos_transactions::validation::validate_transaction;
use dpos_transactions::SignedTransaction;
use dpos_types::{Amount, AssetId, ChainId, ChainParams, Timestamp};

use crate::applier::{self, EvalContext};
use crate::entries::{Receipt, TxEntry, TxLocation};
use crate::error::{OpError, TrxError};
use crate::state::LedgerState;
use crate::undo::UndoDelta;

/// Where and under which rules a transaction is evaluated.
#[derive(Clone, Copy, Debug)]
pub struct EvalEnv<'a> {
    pub chain_id: &'a ChainId,
    pub params: &'a ChainParams,
    /// Expiration is checked against this time: the block timestamp when
    /// applying a block, the local clock for the pending pool.
    pub chain_time: Timestamp,
    /// Whether the relay fee is owed on top of registration fees. Only
    /// transactions entering the pending pool pay it.
    pub enforce_relay_fee: bool,
    pub location: TxLocation,
}

/// Relay fee owed by a transaction of `size` bytes.
pub fn relay_fee(params: &ChainParams, size: usize) -> Amount {
    Amount::new(params.relay_fee_per_kb.saturating_mul(size as u64 / 1024 + 1))
}

/// Validate `trx` and apply it to `state`.
///
/// On success the transaction is in the state's transaction index and the
/// returned delta reverts everything. On failure the state is unchanged.
pub fn validate_and_apply(
    trx: &SignedTransaction,
    env: &EvalEnv<'_>,
    state: &mut LedgerState,
) -> Result<(Receipt, UndoDelta), TrxError> {
    validate_transaction(trx, env.params)?;
    let id = trx.id()?;

    if trx.expiration <= env.chain_time {
        return Err(TrxError::Expired {
            expiration: trx.expiration,
            chain_time: env.chain_time,
        });
    }
    let max_secs = env.params.max_transaction_expiration_secs;
    if trx.expiration > env.chain_time.plus_secs(max_secs) {
        return Err(TrxError::ExpirationTooFar {
            expiration: trx.expiration,
            chain_time: env.chain_time,
            max_secs,
        });
    }

    if state.transaction(&id).is_some() {
        return Err(TrxError::DuplicateTransaction(id));
    }

    let signers = trx.verify_signatures(env.chain_id)?;
    let mut ctx = EvalContext::new(env.params, env.chain_time, signers);
    let mut delta = UndoDelta::new();

    match apply_operations(trx, env, &mut ctx, state, &mut delta) {
        Ok(mut receipt) => {
            receipt.id = id;
            state.put_transaction(
                TxEntry {
                    id,
                    transaction: trx.clone(),
                    location: env.location,
                    receipt: receipt.clone(),
                },
                &mut delta,
            );
            Ok((receipt, delta))
        }
        Err(e) => {
            state.unapply(delta);
            Err(e)
        }
    }
}

fn apply_operations(
    trx: &SignedTransaction,
    env: &EvalEnv<'_>,
    ctx: &mut EvalContext<'_>,
    state: &mut LedgerState,
    delta: &mut UndoDelta,
) -> Result<Receipt, TrxError> {
    for (index, op) in trx.operations.iter().enumerate() {
        match applier::apply(op, ctx, state) {
            Ok(d) => delta.append(d),
            Err(OpError::MissingSignature(authority)) => {
                return Err(TrxError::MissingSignature { index, authority })
            }
            Err(source) => return Err(TrxError::Operation { index, source }),
        }
    }

    let mut required = ctx.required_fee();
    if env.enforce_relay_fee {
        required = required + relay_fee(env.params, trx.encoded_size()?);
    }
    let paid = Amount::new(ctx.pool(AssetId::BASE).max(0) as u64);
    if paid < required {
        return Err(TrxError::InsufficientFee { required, paid });
    }

    let mut receipt = Receipt {
        created_accounts: ctx.created_accounts.clone(),
        created_assets: ctx.created_assets.clone(),
        created_balances: ctx.created_balances.clone(),
        ..Receipt::default()
    };

    // Deposits never overdraw the pool, so every leftover is non-negative.
    let leftovers: Vec<(AssetId, i128)> = ctx.pool_entries().filter(|(_, v)| *v > 0).collect();
    for (asset_id, left) in leftovers {
        let fee = Amount::new(left as u64);
        let mut asset = state.asset(asset_id).cloned().ok_or_else(|| TrxError::Operation {
            index: trx.operations.len().saturating_sub(1),
            source: OpError::unknown("asset", asset_id),
        })?;
        asset.collected_fees = asset.collected_fees + fee;
        state.put_asset(asset, delta);
        receipt.fees.insert(asset_id, fee);
    }

    Ok(receipt)
}
