//! 32-byte content-derived identifiers: transactions, balances, slates and chains.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! digest_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(#[serde(with = "crate::hex32")] [u8; 32]);

        impl $name {
            pub const ZERO: Self = Self([0u8; 32]);

            pub fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            pub fn from_hex(s: &str) -> Result<Self, String> {
                crate::hex32::parse(s).map(Self)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(&self.0[..4]))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }
    };
}

digest_id!(
    /// Transaction id: hash of the canonical encoding of the unsigned transaction.
    TxId
);

digest_id!(
    /// Balance id: hash of the owning condition `(owner, asset, slate)`.
    BalanceId
);

digest_id!(
    /// Slate id: hash of the sorted delegate id list.
    SlateId
);

digest_id!(
    /// Chain id: hash of the genesis configuration. Mixed into every
    /// transaction signature so signatures never replay across networks.
    ChainId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_id_is_zero() {
        assert_eq!(TxId::default(), TxId::ZERO);
        assert!(BalanceId::default().is_zero());
    }

    #[test]
    fn hex_round_trip() {
        let id = SlateId::new([0xab; 32]);
        assert_eq!(SlateId::from_hex(&id.to_string()).unwrap(), id);
    }
}
