use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),

    #[error("record {0} is closed and can no longer change")]
    RecordClosed(String),

    #[error("record {key} rejected: {reason}")]
    InvariantViolation { key: String, reason: String },
}
