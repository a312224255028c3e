//! The error taxonomy shared across crates.
//!
//! Every error enum in the workspace maps itself onto one [`ErrorKind`] so the
//! outer layers (RPC, P2P) can decide how to react without matching on every
//! variant.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What class of failure an error belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed block or transaction encoding. Never retried.
    Structural,
    /// Expired transaction or out-of-window slot timestamp. The caller may
    /// resubmit with corrected timing.
    Temporal,
    /// Missing or invalid signature, wrong delegate signer.
    Authorization,
    /// Insufficient balance, supply exceeded, unknown entity.
    LedgerSemantic,
    /// An invalid block was hit during a chain switch; the switch was rolled
    /// back and the fork is permanently rejected.
    ConsensusStructural,
    /// Durable storage failure. Fatal to the process.
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Temporal => "temporal",
            Self::Authorization => "authorization",
            Self::LedgerSemantic => "ledger-semantic",
            Self::ConsensusStructural => "consensus-structural",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
