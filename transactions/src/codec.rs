//! Canonical binary encoding used for hashing, signing and size limits.
//!
//! bincode with its default (fixed-width little-endian) configuration;
//! every node must produce identical bytes for identical values.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::TransactionError;

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, TransactionError> {
    Ok(bincode::serialize(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TransactionError> {
    Ok(bincode::deserialize(bytes)?)
}

pub fn encoded_size<T: Serialize>(value: &T) -> Result<usize, TransactionError> {
    Ok(bincode::serialized_size(value)? as usize)
}
