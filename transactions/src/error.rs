use dpos_types::{ErrorKind, TxId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("malformed: {reason}")]
    Malformed { reason: String },

    #[error("invalid signature on transaction {tx_id}")]
    InvalidSignature { tx_id: TxId },

    #[error("invalid block signature")]
    InvalidBlockSignature,

    #[error("codec error: {0}")]
    Codec(String),
}

impl TransactionError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed { .. } | Self::Codec(_) => ErrorKind::Structural,
            Self::InvalidSignature { .. } | Self::InvalidBlockSignature => ErrorKind::Authorization,
        }
    }
}

impl From<bincode::Error> for TransactionError {
    fn from(e: bincode::Error) -> Self {
        TransactionError::Codec(e.to_string())
    }
}
