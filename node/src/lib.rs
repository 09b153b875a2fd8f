//! Governance proxy voter node that runs the decision engine against the chain.
//!
//! The node is the runtime around the engine that:
//! - Loads its configuration and the vote period policy table
//! - Opens, migrates, and checks the LMDB record store
//! - Polls the referendum feed and hands new referenda to the engine
//! - Ticks the engine on a fixed interval and records metrics
//! - Serves the operator RPC surface
//! - Stops starting new evaluations on SIGINT/SIGTERM and lets running ones finish

pub mod clients;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod shutdown;
pub mod tracing_spans;

pub use clients::{HttpReferendumFeed, HttpSentimentProvider, HttpVoteSubmitter};
pub use config::NodeConfig;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::{HttpVoteNode, VoteNode};
pub use shutdown::ShutdownController;
