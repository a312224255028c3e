//! Stateless transaction and block validation.
//!
//! These checks need nothing but the object itself and the chain
//! parameters. Stateful checks (balances, authorities, duplicates, fees) are
//! done by the ledger evaluator.

use std::collections::BTreeSet;

use dpos_types::ChainParams;

use crate::block::SignedBlock;
use crate::error::TransactionError;
use crate::transaction::SignedTransaction;
use crate::Operation;

/// Validate a transaction's basic structure: operation count, encoded size,
/// signature count and per-operation shape.
pub fn validate_transaction(
    trx: &SignedTransaction,
    params: &ChainParams,
) -> Result<(), TransactionError> {
    if trx.operations.is_empty() {
        return Err(TransactionError::malformed("transaction has no operations"));
    }

    let size = trx.encoded_size()?;
    if size > params.max_transaction_size {
        return Err(TransactionError::malformed(format!(
            "transaction is {} bytes, limit is {}",
            size, params.max_transaction_size
        )));
    }

    if trx.signatures.len() > params.max_signatures {
        return Err(TransactionError::malformed(format!(
            "{} signatures, limit is {}",
            trx.signatures.len(),
            params.max_signatures
        )));
    }

    let mut keys = BTreeSet::new();
    for sig in &trx.signatures {
        if !keys.insert(sig.public_key) {
            return Err(TransactionError::malformed("duplicate signing key"));
        }
    }

    for (index, op) in trx.operations.iter().enumerate() {
        validate_operation(op, params).map_err(|reason| {
            TransactionError::malformed(format!("operation {}: {}", index, reason))
        })?;
    }

    Ok(())
}

fn validate_operation(op: &Operation, params: &ChainParams) -> Result<(), String> {
    if let Some(amount) = op.amount() {
        if amount.is_zero() {
            return Err(format!("{} amount must be positive", op.name()));
        }
    }

    match op {
        Operation::RegisterAccount(op) => {
            if let Some(rate) = op.delegate_pay_rate {
                if rate > 100 {
                    return Err(format!("pay rate {} exceeds 100", rate));
                }
            }
        }
        Operation::RegisterDelegate(op) if op.pay_rate > 100 => {
            return Err(format!("pay rate {} exceeds 100", op.pay_rate));
        }
        Operation::DefineSlate(op) => {
            if op.delegates.is_empty() {
                return Err("slate has no delegates".into());
            }
            if op.delegates.len() > params.num_delegates as usize {
                return Err(format!(
                    "slate lists {} delegates, limit is {}",
                    op.delegates.len(),
                    params.num_delegates
                ));
            }
            let distinct: BTreeSet<_> = op.delegates.iter().collect();
            if distinct.len() != op.delegates.len() {
                return Err("slate lists a delegate twice".into());
            }
        }
        Operation::RegisterAsset(op) if op.max_supply.is_zero() => {
            return Err("max supply must be positive".into());
        }
        _ => {}
    }

    Ok(())
}

/// Validate a block's structure: limits, transaction digest and the
/// structure of every transaction.
pub fn validate_block_structure(
    block: &SignedBlock,
    params: &ChainParams,
) -> Result<(), TransactionError> {
    if block.block_num() == 0 {
        return Err(TransactionError::malformed("block number 0 is reserved for genesis"));
    }

    if block.transactions.len() > params.max_block_transactions {
        return Err(TransactionError::malformed(format!(
            "{} transactions, limit is {}",
            block.transactions.len(),
            params.max_block_transactions
        )));
    }

    let size = block.encoded_size()?;
    if size > params.max_block_size {
        return Err(TransactionError::malformed(format!(
            "block is {} bytes, limit is {}",
            size, params.max_block_size
        )));
    }

    if !block.digest_matches()? {
        return Err(TransactionError::malformed("transaction digest mismatch"));
    }

    for trx in &block.transactions {
        validate_transaction(trx, params)?;
    }

    Ok(())
}
