//! Blake2b hashing for blocks and transactions.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use dpos_types::{BlockId, TxId};

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    blake2b_256_multi(&[data])
}

/// Hash the concatenation of `parts` without allocating it.
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let hasher = parts
        .iter()
        .fold(Blake2b256::new(), |h, part| h.chain_update(part));
    hasher.finalize().into()
}

/// Hash a canonically encoded signed block header to produce its `BlockId`.
pub fn hash_block_header(header_bytes: &[u8]) -> BlockId {
    BlockId::new(blake2b_256(header_bytes))
}

/// Hash a canonically encoded unsigned transaction to produce its `TxId`.
pub fn hash_transaction(tx_bytes: &[u8]) -> TxId {
    TxId::new(blake2b_256(tx_bytes))
}
