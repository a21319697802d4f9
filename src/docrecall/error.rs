use crate::model::Table;
use thiserror::Error;

/// Tagged failure returned uniformly by every [`TableStore`](crate::store::TableStore)
/// backend. The engine branches on these variants, never on backend error codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Table '{table}' has reached its storage allocation")]
    CapacityExhausted { table: Table },

    #[error("Uniqueness constraint violated in table '{table}'")]
    Conflict { table: Table },

    #[error("Table '{table}' does not exist")]
    MissingTable { table: Table },

    #[error("Store is unavailable")]
    Unavailable,

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// An unavailable store is reported once, when it goes down. Every later
    /// occurrence is routine and logged at `debug`.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable)
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Compression failed: {0}")]
    Compression(#[from] std::io::Error),

    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Structured value could not be (de)serialized: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum RecallError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Could not create table '{table}': {reason}")]
    Schema { table: Table, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Api Error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, RecallError>;
