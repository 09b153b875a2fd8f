//! Abstract storage traits for the governance proxy voter.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits and on the
//! [`ReferendumRecord`] model, which is the durable audit trail of what was
//! decided for each referendum and when.

pub mod error;
pub mod meta;
pub mod referendum;

pub use error::StoreError;
pub use meta::MetaStore;
pub use referendum::{
    CloseReason, PendingVote, PhaseTransition, RecordPhase, ReferendumRecord, ReferendumStore,
    VoteSlot,
};
