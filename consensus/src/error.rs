use dpos_transactions::TransactionError;
use dpos_types::{AccountId, BlockId, ErrorKind, Timestamp};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("block at {timestamp} is not signed by the slot's delegate {expected}")]
    WrongDelegate {
        timestamp: Timestamp,
        expected: AccountId,
    },

    #[error("block timestamp {timestamp} is not after the head timestamp {head}")]
    SlotInPast { timestamp: Timestamp, head: Timestamp },

    #[error("block timestamp {timestamp} is more than {max_skew_secs}s ahead of {now}")]
    SlotTooFarFuture {
        timestamp: Timestamp,
        now: Timestamp,
        max_skew_secs: u64,
    },

    #[error("block timestamp {timestamp} is not a multiple of the {interval_secs}s interval")]
    MisalignedTimestamp {
        timestamp: Timestamp,
        interval_secs: u64,
    },

    #[error("the active delegate list is empty")]
    NoActiveDelegates,

    #[error("active delegate {0} is not a registered delegate")]
    UnknownDelegate(AccountId),

    #[error("block {0} is not in the fork database")]
    UnknownBlock(BlockId),

    #[error("block {0} has no path to the canonical chain")]
    Unlinked(BlockId),

    #[error(transparent)]
    Codec(#[from] TransactionError),
}

impl ConsensusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WrongDelegate { .. } => ErrorKind::Authorization,
            Self::SlotInPast { .. } | Self::SlotTooFarFuture { .. } => ErrorKind::Temporal,
            Self::MisalignedTimestamp { .. } | Self::Codec(_) => ErrorKind::Structural,
            Self::NoActiveDelegates
            | Self::UnknownDelegate(_)
            | Self::UnknownBlock(_)
            | Self::Unlinked(_) => ErrorKind::ConsensusStructural,
        }
    }
}
