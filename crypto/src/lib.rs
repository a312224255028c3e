//! Cryptographic primitives for the DPOS chain database.
//!
//! - **Ed25519** for transaction and block signatures
//! - **Blake2b-256** for block ids, transaction ids and derived ids

pub mod hash;
pub mod keys;
pub mod sign;

pub use hash::{blake2b_256, blake2b_256_multi, hash_block_header, hash_transaction};
pub use keys::{
    generate_keypair, keypair_from_private, keypair_from_seed, public_from_private, CryptoError,
};
pub use sign::{sign_message, verify_signature};
