//! Owner address type.

use serde::{Deserialize, Serialize};
use std::fmt;

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use crate::keys::PublicKey;

/// An owner address: the Blake2b-256 hash of an Ed25519 public key.
///
/// Balances are owned by addresses, so a balance can be funded before the
/// owner ever registers an account.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(#[serde(with = "crate::hex32")] [u8; 32]);

impl Address {
    /// Display prefix for addresses.
    pub const PREFIX: &'static str = "DPOS";

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the address owned by a public key.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(public_key.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<&PublicKey> for Address {
    fn from(key: &PublicKey) -> Self {
        Self::from_public_key(key)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}{})", Self::PREFIX, hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, hex::encode(self.0))
    }
}
