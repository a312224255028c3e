//! Block identifier type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte block id: the Blake2b-256 hash of a signed block header.
///
/// The all-zero id names the genesis state (block number 0), which has no
/// header of its own.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(#[serde(with = "crate::hex32")] [u8; 32]);

impl Default for BlockId {
    fn default() -> Self {
        Self::ZERO
    }
}

impl BlockId {
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

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId(")?;
        for b in &self.0[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "\u{2026})")
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Look a block up either by id or by its number on the canonical chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockRef {
    Id(BlockId),
    Number(u32),
}

impl From<BlockId> for BlockRef {
    fn from(id: BlockId) -> Self {
        Self::Id(id)
    }
}

impl From<u32> for BlockRef {
    fn from(num: u32) -> Self {
        Self::Number(num)
    }
}
