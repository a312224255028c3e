//! Parallel pre-verification of transaction signatures.
//!
//! Signature checks are independent of ledger state, so a block's
//! transactions are verified across the rayon pool before any of them is
//! applied. A forged signature rejects the block without touching the
//! ledger.

use rayon::prelude::*;

use dpos_ledger::TrxError;
use dpos_transactions::SignedTransaction;
use dpos_types::ChainId;

/// Index and error of the first transaction with an invalid signature.
pub fn verify_signatures_parallel(
    transactions: &[SignedTransaction],
    chain_id: &ChainId,
) -> Result<(), (usize, TrxError)> {
    match transactions
        .par_iter()
        .enumerate()
        .find_map_first(|(index, trx)| trx.verify_signatures(chain_id).err().map(|e| (index, e)))
    {
        Some((index, e)) => Err((index, TrxError::from(e))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpos_crypto::keypair_from_seed;
    use dpos_types::Timestamp;

    #[test]
    fn reports_lowest_failing_index() {
        let chain_id = ChainId::new([1; 32]);
        let key = keypair_from_seed(&[3; 32]);
        let other = keypair_from_seed(&[4; 32]);
        let mut txs: Vec<SignedTransaction> = (0..8)
            .map(|i| {
                SignedTransaction::new(Timestamp::new(100 + i), Vec::new())
                    .signed(&key, &chain_id)
                    .unwrap()
            })
            .collect();
        assert!(verify_signatures_parallel(&txs, &chain_id).is_ok());

        txs[5].signatures[0].public_key = other.public;
        txs[6].signatures[0].public_key = other.public;
        let (index, err) = verify_signatures_parallel(&txs, &chain_id).unwrap_err();
        assert_eq!(index, 5);
        assert!(matches!(err, TrxError::InvalidSignature(_)));
    }
}
