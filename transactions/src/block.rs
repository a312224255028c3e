//! Signed blocks.

use dpos_crypto::{blake2b_256, hash_block_header, sign_message, verify_signature};
use dpos_types::{BlockId, KeyPair, PublicKey, Signature, Timestamp, TxId};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::TransactionError;
use crate::transaction::SignedTransaction;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub block_num: u32,
    pub previous: BlockId,
    pub timestamp: Timestamp,
    /// Hash over the ids of the block's transactions, in order.
    #[serde(with = "dpos_types::hex32")]
    pub transaction_digest: [u8; 32],
}

/// A block as produced by a delegate: header, transactions and the
/// delegate's signature over the header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlock {
    pub header: BlockHeader,
    pub transactions: Vec<SignedTransaction>,
    pub signature: Signature,
}

/// Digest committing to an ordered list of transactions.
pub fn transaction_digest(
    transactions: &[SignedTransaction],
) -> Result<[u8; 32], TransactionError> {
    let mut bytes = Vec::with_capacity(transactions.len() * 32);
    for trx in transactions {
        bytes.extend_from_slice(trx.id()?.as_bytes());
    }
    Ok(blake2b_256(&bytes))
}

impl BlockHeader {
    /// The message the delegate signs.
    pub fn digest(&self) -> Result<[u8; 32], TransactionError> {
        Ok(blake2b_256(&codec::encode(self)?))
    }
}

impl SignedBlock {
    /// Assemble and sign a block on top of `previous`.
    pub fn build(
        block_num: u32,
        previous: BlockId,
        timestamp: Timestamp,
        transactions: Vec<SignedTransaction>,
        signer: &KeyPair,
    ) -> Result<Self, TransactionError> {
        let header = BlockHeader {
            block_num,
            previous,
            timestamp,
            transaction_digest: transaction_digest(&transactions)?,
        };
        let signature = sign_message(&header.digest()?, &signer.private);
        Ok(Self {
            header,
            transactions,
            signature,
        })
    }

    /// Block id: hash of the signed header.
    pub fn id(&self) -> Result<BlockId, TransactionError> {
        let mut bytes = codec::encode(&self.header)?;
        bytes.extend_from_slice(self.signature.as_bytes());
        Ok(hash_block_header(&bytes))
    }

    pub fn block_num(&self) -> u32 {
        self.header.block_num
    }

    pub fn previous(&self) -> BlockId {
        self.header.previous
    }

    pub fn timestamp(&self) -> Timestamp {
        self.header.timestamp
    }

    /// Whether `key` produced the block signature.
    pub fn is_signed_by(&self, key: &PublicKey) -> Result<bool, TransactionError> {
        Ok(verify_signature(&self.header.digest()?, &self.signature, key))
    }

    /// Whether the header's digest matches the carried transactions.
    pub fn digest_matches(&self) -> Result<bool, TransactionError> {
        Ok(transaction_digest(&self.transactions)? == self.header.transaction_digest)
    }

    pub fn transaction_ids(&self) -> Result<Vec<TxId>, TransactionError> {
        self.transactions.iter().map(|t| t.id()).collect()
    }

    pub fn encoded_size(&self) -> Result<usize, TransactionError> {
        codec::encoded_size(self)
    }
}
