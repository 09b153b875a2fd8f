//! Interfaces to the external systems the engine depends on.
//!
//! Production implementations live in `govproxy-node` (HTTP clients);
//! deterministic ones in `govproxy-nullables`.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use govproxy_types::{
    Conviction, DecisionRule, Origin, RecordKey, Tally, Timestamp, VoteDecision, VoteReceipt,
};

/// A referendum as reported by the discovery feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferendumInfo {
    pub key: RecordKey,
    pub origin: Origin,
    pub submitted_at: Timestamp,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SentimentError {
    #[error("sentiment provider unavailable: {0}")]
    Unavailable(String),

    #[error("sentiment query timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    /// The vote may be retried later with the same decision.
    #[error("transient submission failure: {0}")]
    Transient(String),

    /// The chain refused the vote. Never retried.
    #[error("vote rejected by chain: {0}")]
    Rejected(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("referendum feed unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the internal community tally for a referendum.
pub trait SentimentProvider: Send + Sync {
    /// The tally as of now.
    fn current_tally(
        &self,
        key: RecordKey,
    ) -> impl Future<Output = Result<Tally, SentimentError>> + Send;

    /// Rule used by the default [`SentimentProvider::decide`].
    fn decision_rule(&self) -> DecisionRule {
        DecisionRule::default()
    }

    /// Map a tally to the decision that would be voted on chain.
    fn decide(&self, tally: &Tally) -> VoteDecision {
        tally.decide(&self.decision_rule())
    }
}

/// Submits signed votes for the proxy account.
pub trait VoteSubmitter: Send + Sync {
    /// Submit (or replace) the proxy's vote on `key`.
    fn submit_vote(
        &self,
        key: RecordKey,
        decision: VoteDecision,
        conviction: Conviction,
    ) -> impl Future<Output = Result<VoteReceipt, SubmissionError>> + Send;

    /// The proxy's current on-chain vote on `key`, if any.
    fn recorded_vote(
        &self,
        key: RecordKey,
    ) -> impl Future<Output = Result<Option<VoteDecision>, SubmissionError>> + Send;
}

/// Lists referenda currently open on chain.
pub trait ReferendumFeed: Send + Sync {
    fn ongoing(&self) -> impl Future<Output = Result<Vec<ReferendumInfo>, FeedError>> + Send;
}
