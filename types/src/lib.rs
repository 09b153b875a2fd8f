//! Fundamental types for the governance proxy voter.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! networks, governance origins, referendum identifiers, timestamps, vote decisions,
//! convictions, and internal sentiment tallies.

pub mod error;
pub mod network;
pub mod origin;
pub mod referendum;
pub mod time;
pub mod vote;

pub use error::GovProxyError;
pub use network::Network;
pub use origin::Origin;
pub use referendum::{RecordKey, ReferendumId};
pub use time::{Timestamp, SECS_PER_DAY};
pub use vote::{Conviction, DecisionRule, Tally, VoteDecision, VoteReceipt};
