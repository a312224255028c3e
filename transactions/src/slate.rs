//! Delegate slates: a named set of delegates a balance votes for.

use dpos_crypto::blake2b_256;
use dpos_types::{AccountId, SlateId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefineSlateOp {
    pub delegates: Vec<AccountId>,
}

/// Id of the slate holding `delegates`, independent of their order.
pub fn slate_id(delegates: &[AccountId]) -> SlateId {
    let mut sorted: Vec<u32> = delegates.iter().map(|d| d.0).collect();
    sorted.sort_unstable();
    let mut bytes = Vec::with_capacity(sorted.len() * 4);
    for id in sorted {
        bytes.extend_from_slice(&id.to_be_bytes());
    }
    SlateId::new(blake2b_256(&bytes))
}
