//! Referendum vote scheduling for the governance proxy.
//!
//! For every open referendum the [`DecisionEngine`] decides when to sample
//! internal sentiment, when to cast the first on-chain vote, and whether a
//! corrective second vote is due. Timing comes from the per-network,
//! per-origin [`PolicyTable`]. Sentiment, vote submission, and referendum
//! discovery are external collaborators reached through the traits in
//! [`collaborators`].
//!
//! Key principle: each on-chain vote is cast at most once. The decision is
//! persisted before submission, and the chain is consulted before any
//! resubmission after a failed or interrupted attempt.

pub mod clock;
pub mod collaborators;
pub mod engine;
pub mod error;
pub mod keyed_lock;
pub mod policy;

pub use clock::{Clock, SystemClock};
pub use collaborators::{
    FeedError, ReferendumFeed, ReferendumInfo, SentimentError, SentimentProvider,
    SubmissionError, VoteSubmitter,
};
pub use engine::{DecisionEngine, EngineConfig, EvaluationOutcome, TickReport};
pub use error::{GovernanceError, PolicyError};
pub use keyed_lock::KeyedLocks;
pub use policy::{PolicyEntry, PolicyTable};
