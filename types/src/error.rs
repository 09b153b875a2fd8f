//! Top-level error type shared across crates.

use thiserror::Error;

/// Common error type for parsing and validating domain values.
#[derive(Debug, Error)]
pub enum GovProxyError {
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("unknown origin: {0}")]
    UnknownOrigin(String),

    #[error("invalid vote decision: {0}")]
    InvalidDecision(String),
}
