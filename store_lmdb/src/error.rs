use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database '{0}' is not open")]
    MissingDatabase(&'static str),

    #[error("schema error: {0}")]
    Schema(String),
}

impl From<heed::Error> for LmdbError {
    fn from(e: heed::Error) -> Self {
        LmdbError::Heed(e.to_string())
    }
}

impl From<bincode::Error> for LmdbError {
    fn from(e: bincode::Error) -> Self {
        LmdbError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for LmdbError {
    fn from(e: std::io::Error) -> Self {
        LmdbError::Heed(e.to_string())
    }
}

impl From<LmdbError> for dpos_store::StoreError {
    fn from(e: LmdbError) -> Self {
        match e {
            LmdbError::NotFound(what) => dpos_store::StoreError::NotFound(what),
            LmdbError::Serialization(msg) => dpos_store::StoreError::Serialization(msg),
            other => dpos_store::StoreError::Backend(other.to_string()),
        }
    }
}
