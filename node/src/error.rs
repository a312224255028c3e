use dpos_consensus::ConsensusError;
use dpos_ledger::{LedgerError, TrxError};
use dpos_store::StoreError;
use dpos_transactions::TransactionError;
use dpos_types::{BlockId, ErrorKind, Timestamp};
use thiserror::Error;

/// Why a block was not accepted.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("malformed block: {0}")]
    Malformed(#[from] TransactionError),

    #[error("block {block_num} is too old: head is {head_num}")]
    TooOld { block_num: u32, head_num: u32 },

    #[error("block {block_num} is too far ahead of head {head_num}")]
    TooFarAhead { block_num: u32, head_num: u32 },

    #[error("block {block_num} does not follow its parent: expected number {expected}")]
    BadNumber { block_num: u32, expected: u32 },

    #[error(
        "block {block_num} does not follow the head: expected previous {expected}, got {previous}"
    )]
    NotNext {
        block_num: u32,
        expected: BlockId,
        previous: BlockId,
    },

    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    #[error("transaction {index} of block {block_id}: {source}")]
    Transaction {
        block_id: BlockId,
        index: usize,
        source: TrxError,
    },

    #[error("block {block_id} is invalid: {reason}")]
    Invalid { block_id: BlockId, reason: String },

    /// A chain switch hit an invalid block and was rolled back.
    #[error("fork through {block_id} rejected: {source}")]
    InvalidFork {
        block_id: BlockId,
        source: Box<BlockError>,
    },

    #[error("the genesis state can not be popped")]
    CannotPopGenesis,

    #[error("production slot {timestamp} expired at {now}")]
    ProductionSlotExpired { timestamp: Timestamp, now: Timestamp },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("chain database is poisoned by an earlier storage failure")]
    Poisoned,
}

impl BlockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed(e) => e.kind(),
            Self::TooOld { .. } | Self::TooFarAhead { .. } | Self::ProductionSlotExpired { .. } => {
                ErrorKind::Temporal
            }
            Self::NotNext { .. } | Self::BadNumber { .. } | Self::Invalid { .. } => {
                ErrorKind::Structural
            }
            Self::Consensus(e) => e.kind(),
            Self::Transaction { source, .. } => source.kind(),
            Self::InvalidFork { .. } | Self::CannotPopGenesis => ErrorKind::ConsensusStructural,
            Self::Ledger(e) => e.kind(),
            Self::Storage(_) | Self::Poisoned => ErrorKind::Storage,
        }
    }

    /// Temporary failures leave the block untried instead of invalid.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Consensus(ConsensusError::SlotTooFarFuture { .. })
        )
    }

    /// The innermost error of a rejected fork.
    pub fn root_cause(&self) -> &BlockError {
        match self {
            Self::InvalidFork { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("block error: {0}")]
    Block(#[from] BlockError),

    #[error("malformed stored object: {0}")]
    Transaction(#[from] TransactionError),

    #[error("config error: {0}")]
    Config(String),

    #[error("data directory belongs to chain {stored}, genesis is chain {expected}")]
    ChainMismatch { stored: String, expected: String },

    #[error("stored block {0} is missing")]
    MissingBlock(BlockId),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
