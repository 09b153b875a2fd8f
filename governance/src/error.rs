use govproxy_store::StoreError;
use govproxy_types::{Network, Origin};
use thiserror::Error;

use crate::collaborators::{SentimentError, SubmissionError};

/// Problems with the vote period policy table.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy table {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse policy table: {0}")]
    Parse(String),

    #[error("unsupported policy table version {found} (expected {expected})")]
    UnsupportedVersion { found: i64, expected: u32 },

    #[error("unknown network in policy table: {0}")]
    UnknownNetwork(String),

    #[error("unknown origin name in policy table: {network}.{name}")]
    UnknownOriginName { network: Network, name: String },

    #[error("invalid policy entry for {network}.{origin}: {reason}")]
    InvalidEntry {
        network: Network,
        origin: Origin,
        reason: String,
    },

    #[error("no policy entry for origin {origin} on {network}")]
    UnknownOrigin { network: Network, origin: Origin },
}

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("sentiment unavailable: {0}")]
    Sentiment(#[from] SentimentError),

    #[error("vote submission failed: {0}")]
    Submission(#[from] SubmissionError),

    #[error("referendum {0} is not tracked")]
    RecordNotFound(String),

    #[error("referendum {0} is already closed")]
    AlreadyClosed(String),

    #[error("evaluation task failed: {0}")]
    Task(String),
}
