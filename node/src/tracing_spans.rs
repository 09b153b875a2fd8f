//! Pre-built [`tracing::Span`] constructors for node operations.
//!
//! Record evaluations get their `evaluate` span inside the engine; these
//! cover the work around it.

use tracing::{info_span, Span};

/// One scheduler pass: feed poll, engine tick, metrics.
pub fn tick_span(network: &str) -> Span {
    info_span!("tick", network = %network)
}

/// Polling the referendum feed for ongoing referenda.
pub fn feed_poll_span(network: &str) -> Span {
    info_span!("feed_poll", network = %network)
}

/// Startup checks on the data directory and record store.
pub fn startup_span(data_dir: &str) -> Span {
    info_span!("startup", data_dir = %data_dir)
}
