use dpos_transactions::TransactionError;
use dpos_types::{Amount, ErrorKind, Timestamp, TxId};
use thiserror::Error;

/// Failure of a single operation. The state is unchanged when one is
/// returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpError {
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Amount, available: Amount },

    #[error("unknown {kind}: {id}")]
    UnknownEntity { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("supply exceeded: {current} + {requested} > {max}")]
    SupplyExceeded {
        current: Amount,
        requested: Amount,
        max: Amount,
    },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("missing signature of {0}")]
    MissingSignature(String),

    #[error("malformed operation: {0}")]
    Malformed(String),
}

impl OpError {
    pub fn unknown(kind: &'static str, id: impl ToString) -> Self {
        Self::UnknownEntity {
            kind,
            id: id.to_string(),
        }
    }

    pub fn exists(kind: &'static str, id: impl ToString) -> Self {
        Self::AlreadyExists {
            kind,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientBalance { .. }
            | Self::UnknownEntity { .. }
            | Self::AlreadyExists { .. }
            | Self::SupplyExceeded { .. } => ErrorKind::LedgerSemantic,
            Self::Unauthorized(_) | Self::MissingSignature(_) => ErrorKind::Authorization,
            Self::Malformed(_) => ErrorKind::Structural,
        }
    }
}

/// Failure of a whole transaction. The state is unchanged when one is
/// returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrxError {
    #[error("malformed transaction: {0}")]
    Malformed(String),

    #[error("transaction expired at {expiration}, chain time is {chain_time}")]
    Expired {
        expiration: Timestamp,
        chain_time: Timestamp,
    },

    #[error("expiration {expiration} is more than {max_secs}s past chain time {chain_time}")]
    ExpirationTooFar {
        expiration: Timestamp,
        chain_time: Timestamp,
        max_secs: u64,
    },

    #[error("invalid signature on transaction {0}")]
    InvalidSignature(TxId),

    #[error("operation {index} needs a signature of {authority}")]
    MissingSignature { index: usize, authority: String },

    #[error("duplicate transaction {0}")]
    DuplicateTransaction(TxId),

    #[error("operation {index} failed: {source}")]
    Operation {
        index: usize,
        #[source]
        source: OpError,
    },

    #[error("insufficient fee: required {required}, paid {paid}")]
    InsufficientFee { required: Amount, paid: Amount },

    #[error("pending pool is full ({0} transactions)")]
    PoolFull(usize),
}

impl TrxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed(_) => ErrorKind::Structural,
            Self::Expired { .. } | Self::ExpirationTooFar { .. } => ErrorKind::Temporal,
            Self::InvalidSignature(_) | Self::MissingSignature { .. } => ErrorKind::Authorization,
            Self::Operation { source, .. } => source.kind(),
            Self::DuplicateTransaction(_) | Self::InsufficientFee { .. } | Self::PoolFull(_) => {
                ErrorKind::LedgerSemantic
            }
        }
    }
}

impl From<TransactionError> for TrxError {
    fn from(e: TransactionError) -> Self {
        match e {
            TransactionError::InvalidSignature { tx_id } => TrxError::InvalidSignature(tx_id),
            other => TrxError::Malformed(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid genesis: {0}")]
    Genesis(String),

    #[error("inconsistent ledger state: {0}")]
    Inconsistent(String),

    #[error("codec error: {0}")]
    Codec(#[from] TransactionError),

    #[error("storage error: {0}")]
    Storage(#[from] dpos_store::StoreError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Genesis(_) | Self::Codec(_) => ErrorKind::Structural,
            Self::Inconsistent(_) => ErrorKind::ConsensusStructural,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}
