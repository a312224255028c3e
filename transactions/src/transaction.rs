//! Signed transactions.

use std::collections::BTreeSet;

use dpos_crypto::{blake2b_256_multi, hash_transaction, sign_message, verify_signature};
use dpos_types::{Address, ChainId, KeyPair, PublicKey, Signature, Timestamp, TxId};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::TransactionError;
use crate::Operation;

/// One signature over the transaction digest, with the key that made it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
    pub public_key: PublicKey,
    pub signature: Signature,
}

/// An ordered list of operations applied atomically, with the signatures
/// that authorize them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub expiration: Timestamp,
    pub operations: Vec<Operation>,
    pub signatures: Vec<TxSignature>,
}

/// The part of a transaction covered by its id and signatures.
#[derive(Serialize)]
struct UnsignedView<'a> {
    expiration: Timestamp,
    operations: &'a [Operation],
}

impl SignedTransaction {
    pub fn new(expiration: Timestamp, operations: Vec<Operation>) -> Self {
        Self {
            expiration,
            operations,
            signatures: Vec::new(),
        }
    }

    fn unsigned_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        codec::encode(&UnsignedView {
            expiration: self.expiration,
            operations: &self.operations,
        })
    }

    /// Transaction id: hash of the unsigned part. Adding signatures does not
    /// change it.
    pub fn id(&self) -> Result<TxId, TransactionError> {
        Ok(hash_transaction(&self.unsigned_bytes()?))
    }

    /// The message every signature covers: the unsigned part bound to a chain.
    pub fn digest(&self, chain_id: &ChainId) -> Result<[u8; 32], TransactionError> {
        let unsigned = self.unsigned_bytes()?;
        Ok(blake2b_256_multi(&[chain_id.as_bytes(), &unsigned]))
    }

    /// Append a signature by `keypair`.
    pub fn sign(&mut self, keypair: &KeyPair, chain_id: &ChainId) -> Result<(), TransactionError> {
        let digest = self.digest(chain_id)?;
        self.signatures.push(TxSignature {
            public_key: keypair.public,
            signature: sign_message(&digest, &keypair.private),
        });
        Ok(())
    }

    /// Builder form of [`SignedTransaction::sign`].
    pub fn signed(
        mut self,
        keypair: &KeyPair,
        chain_id: &ChainId,
    ) -> Result<Self, TransactionError> {
        self.sign(keypair, chain_id)?;
        Ok(self)
    }

    /// Verify every attached signature and return the addresses that signed.
    pub fn verify_signatures(
        &self,
        chain_id: &ChainId,
    ) -> Result<BTreeSet<Address>, TransactionError> {
        let digest = self.digest(chain_id)?;
        let mut signers = BTreeSet::new();
        for sig in &self.signatures {
            if !verify_signature(&digest, &sig.signature, &sig.public_key) {
                return Err(TransactionError::InvalidSignature { tx_id: self.id()? });
            }
            signers.insert(Address::from_public_key(&sig.public_key));
        }
        Ok(signers)
    }

    /// Size of the full signed encoding in bytes.
    pub fn encoded_size(&self) -> Result<usize, TransactionError> {
        codec::encoded_size(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IssueAssetOp, WithdrawPayOp};
    use dpos_crypto::keypair_from_seed;
    use dpos_types::{AccountId, Amount, AssetId};

    fn sample() -> SignedTransaction {
        SignedTransaction::new(
            Timestamp::new(1_000),
            vec![Operation::IssueAsset(IssueAssetOp {
                asset_id: AssetId(1),
                amount: Amount::new(5),
            })],
        )
    }

    #[test]
    fn id_ignores_signatures() {
        let chain = ChainId::new([1; 32]);
        let kp = keypair_from_seed(&[9; 32]);
        let unsigned = sample();
        let signed = sample().signed(&kp, &chain).unwrap();
        assert_eq!(unsigned.id().unwrap(), signed.id().unwrap());
    }

    #[test]
    fn id_depends_on_operations() {
        let mut other = sample();
        other.operations.push(Operation::WithdrawPay(WithdrawPayOp {
            account_id: AccountId(1),
            amount: Amount::new(1),
        }));
        assert_ne!(sample().id().unwrap(), other.id().unwrap());
    }

    #[test]
    fn signatures_verify_and_yield_signers() {
        let chain = ChainId::new([1; 32]);
        let kp = keypair_from_seed(&[9; 32]);
        let trx = sample().signed(&kp, &chain).unwrap();
        let signers = trx.verify_signatures(&chain).unwrap();
        assert!(signers.contains(&Address::from_public_key(&kp.public)));
    }

    #[test]
    fn signature_does_not_replay_on_other_chain() {
        let kp = keypair_from_seed(&[9; 32]);
        let trx = sample().signed(&kp, &ChainId::new([1; 32])).unwrap();
        assert!(matches!(
            trx.verify_signatures(&ChainId::new([2; 32])),
            Err(TransactionError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn tampered_operation_breaks_signature() {
        let chain = ChainId::new([1; 32]);
        let kp = keypair_from_seed(&[9; 32]);
        let mut trx = sample().signed(&kp, &chain).unwrap();
        trx.expiration = Timestamp::new(2_000);
        assert!(trx.verify_signatures(&chain).is_err());
    }
}
