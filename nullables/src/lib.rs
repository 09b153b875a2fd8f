//! Nullable infrastructure for deterministic testing.
//!
//! Inspired by the "A-frame architecture" pattern from RsNano.
//! Every external dependency of the scheduler (clock, storage, sentiment,
//! vote submission, referendum discovery) is abstracted behind a trait.
//! This crate provides test-friendly implementations that:
//! - Return deterministic, scripted values
//! - Record every call for later assertions
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod feed;
pub mod sentiment;
pub mod store;
pub mod submitter;

pub use clock::NullClock;
pub use feed::NullReferendumFeed;
pub use sentiment::NullSentimentProvider;
pub use store::{NullMetaStore, NullReferendumStore};
pub use submitter::{NullVoteSubmitter, SubmitOutcome, Submission};
