//! Referendum records and the storage trait that persists them.
//!
//! A record is created the first time a referendum is observed, mutated
//! only by the decision engine, and never deleted: once closed it stays in
//! the store as the audit trail of both votes.

use serde::{Deserialize, Serialize};
use std::fmt;

use govproxy_types::{Origin, RecordKey, Tally, Timestamp, VoteDecision, VoteReceipt};

use crate::StoreError;

/// Lifecycle phase of a referendum's voting state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordPhase {
    /// Created, not yet evaluated.
    New,
    /// Waiting until the referendum is old enough for the internal vote.
    AwaitingFirstWindow,
    /// First on-chain vote acknowledged.
    FirstVoteCast,
    /// Second sentiment sample taken, corrective vote may be required.
    AwaitingRevoteWindow,
    /// Corrective vote acknowledged.
    RevoteCast,
    /// Second sample matched the first decision; no corrective vote.
    ConfirmedNoRevote,
    /// No further action is possible.
    Closed,
}

impl RecordPhase {
    /// Position in the forward-only ordering. The two revote outcomes are
    /// alternative branches and share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::New => 0,
            Self::AwaitingFirstWindow => 1,
            Self::FirstVoteCast => 2,
            Self::AwaitingRevoteWindow => 3,
            Self::RevoteCast | Self::ConfirmedNoRevote => 4,
            Self::Closed => 5,
        }
    }

    /// Whether moving from `self` to `next` keeps the phase moving forward.
    pub fn can_advance_to(&self, next: RecordPhase) -> bool {
        if next.rank() == self.rank() {
            return next == *self;
        }
        next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::AwaitingFirstWindow => "awaiting_first_window",
            Self::FirstVoteCast => "first_vote_cast",
            Self::AwaitingRevoteWindow => "awaiting_revote_window",
            Self::RevoteCast => "revote_cast",
            Self::ConfirmedNoRevote => "confirmed_no_revote",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for RecordPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a record was closed. Every closed record carries exactly one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// The voting period ran its course with every due vote cast.
    Completed,
    /// A voting window elapsed before its vote could be cast.
    WindowMissed,
    /// The chain rejected a vote; never retried.
    VoteRejected { reason: String },
    /// An operator closed the record by hand.
    ForcedByOperator { note: String },
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::WindowMissed => f.write_str("voting window missed"),
            Self::VoteRejected { reason } => write!(f, "vote rejected by chain: {reason}"),
            Self::ForcedByOperator { note } => write!(f, "closed by operator: {note}"),
        }
    }
}

/// Which of the two possible votes a pending submission belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteSlot {
    First,
    Second,
}

/// A vote decided but not yet acknowledged by the chain.
///
/// Persisted before the first submission attempt so that retries reuse the
/// same decision and a crash after submission can be reconciled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingVote {
    pub slot: VoteSlot,
    pub decision: VoteDecision,
    pub tally: Tally,
    /// Number of submission attempts started so far.
    pub attempts: u32,
    pub first_attempt_at: Timestamp,
    /// Start of the most recent attempt; the vote time if the chain later
    /// turns out to hold this vote.
    pub last_attempt_at: Timestamp,
}

/// One entry of a record's phase history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub phase: RecordPhase,
    pub at: Timestamp,
}

/// Durable per-referendum scheduling state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferendumRecord {
    pub key: RecordKey,
    pub origin: Origin,
    /// On-chain introduction time.
    pub submitted_at: Timestamp,
    pub phase: RecordPhase,

    pub first_tally_snapshot: Option<Tally>,
    pub first_vote_decision: Option<VoteDecision>,
    pub first_voted_at: Option<Timestamp>,
    pub first_vote_receipt: Option<VoteReceipt>,

    pub second_tally_snapshot: Option<Tally>,
    pub second_vote_decision: Option<VoteDecision>,
    pub second_voted_at: Option<Timestamp>,
    pub second_vote_receipt: Option<VoteReceipt>,
    /// Revote checks that found sentiment unavailable. Only grows.
    pub revote_deferrals: u32,

    pub pending_vote: Option<PendingVote>,

    pub closed_at: Option<Timestamp>,
    pub close_reason: Option<CloseReason>,

    pub transitions: Vec<PhaseTransition>,
}

impl ReferendumRecord {
    /// A fresh record in [`RecordPhase::New`].
    pub fn new(key: RecordKey, origin: Origin, submitted_at: Timestamp) -> Self {
        Self {
            key,
            origin,
            submitted_at,
            phase: RecordPhase::New,
            first_tally_snapshot: None,
            first_vote_decision: None,
            first_voted_at: None,
            first_vote_receipt: None,
            second_tally_snapshot: None,
            second_vote_decision: None,
            second_voted_at: None,
            second_vote_receipt: None,
            revote_deferrals: 0,
            pending_vote: None,
            closed_at: None,
            close_reason: None,
            transitions: Vec::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }

    /// Whole days since on-chain submission.
    pub fn age_days(&self, now: Timestamp) -> u64 {
        self.submitted_at.age_days(now)
    }

    /// Move to `phase`, appending to the history. Callers must only move forward.
    pub fn advance(&mut self, phase: RecordPhase, now: Timestamp) {
        debug_assert!(self.phase.can_advance_to(phase));
        if self.phase != phase {
            self.phase = phase;
            self.transitions.push(PhaseTransition { phase, at: now });
        }
    }

    /// Close the record with `reason`. An undelivered `pending_vote` is kept
    /// as part of the audit trail.
    pub fn close(&mut self, reason: CloseReason, now: Timestamp) {
        self.closed_at = Some(now);
        self.close_reason = Some(reason);
        self.advance(RecordPhase::Closed, now);
    }

    /// Check that `next` is a legal successor of `self` (the stored version).
    ///
    /// Every backend runs this inside its write transaction before `save`
    /// commits, so no caller can regress the phase, rewrite a write-once
    /// vote field, or modify a closed record.
    pub fn check_successor(&self, next: &ReferendumRecord) -> Result<(), StoreError> {
        let violation = |reason: &str| StoreError::InvariantViolation {
            key: self.key.to_string(),
            reason: reason.to_string(),
        };

        if self.key != next.key {
            return Err(violation("key changed"));
        }
        if self.origin != next.origin {
            return Err(violation("origin is immutable"));
        }
        if self.submitted_at != next.submitted_at {
            return Err(violation("submitted_at is immutable"));
        }
        if self.is_closed() {
            if self == next {
                return Ok(());
            }
            return Err(StoreError::RecordClosed(self.key.to_string()));
        }
        if !self.phase.can_advance_to(next.phase) {
            return Err(violation("phase may only move forward"));
        }
        if !next.transitions.starts_with(&self.transitions) {
            return Err(violation("phase history is append-only"));
        }

        if next.revote_deferrals < self.revote_deferrals {
            return Err(violation("revote_deferrals may not decrease"));
        }

        write_once(&self.first_tally_snapshot, &next.first_tally_snapshot)
            .map_err(|_| violation("first_tally_snapshot is write-once"))?;
        write_once(&self.first_vote_decision, &next.first_vote_decision)
            .map_err(|_| violation("first_vote_decision is write-once"))?;
        write_once(&self.first_voted_at, &next.first_voted_at)
            .map_err(|_| violation("first_voted_at is write-once"))?;
        write_once(&self.first_vote_receipt, &next.first_vote_receipt)
            .map_err(|_| violation("first_vote_receipt is write-once"))?;
        write_once(&self.second_tally_snapshot, &next.second_tally_snapshot)
            .map_err(|_| violation("second_tally_snapshot is write-once"))?;
        write_once(&self.second_vote_decision, &next.second_vote_decision)
            .map_err(|_| violation("second_vote_decision is write-once"))?;
        write_once(&self.second_voted_at, &next.second_voted_at)
            .map_err(|_| violation("second_voted_at is write-once"))?;
        write_once(&self.second_vote_receipt, &next.second_vote_receipt)
            .map_err(|_| violation("second_vote_receipt is write-once"))?;

        if next.second_voted_at.is_some() {
            if next.first_voted_at.is_none() {
                return Err(violation("second vote requires a first vote"));
            }
            if next.second_vote_decision == next.first_vote_decision {
                return Err(violation("second vote must differ from the first"));
            }
        }
        if next.is_closed() != (next.phase == RecordPhase::Closed) {
            return Err(violation("closed_at and the closed phase must agree"));
        }
        if next.is_closed() && next.close_reason.is_none() {
            return Err(violation("a closed record needs a close reason"));
        }
        Ok(())
    }
}

/// `Err(())` if `before` was set and `after` differs from it.
fn write_once<T: PartialEq>(before: &Option<T>, after: &Option<T>) -> Result<(), ()> {
    match before {
        Some(value) if after.as_ref() != Some(value) => Err(()),
        _ => Ok(()),
    }
}

/// Trait for durable storage of referendum records.
pub trait ReferendumStore: Send + Sync {
    /// Return the record for `key`, creating it in [`RecordPhase::New`] if absent.
    ///
    /// Idempotent: an existing record is returned unchanged, whatever
    /// `origin` and `submitted_at` are supplied.
    fn get_or_create(
        &self,
        key: RecordKey,
        origin: Origin,
        submitted_at: Timestamp,
    ) -> Result<ReferendumRecord, StoreError>;

    /// Get a record by key.
    fn get(&self, key: &RecordKey) -> Result<Option<ReferendumRecord>, StoreError>;

    /// Atomically replace the stored record with `record`.
    ///
    /// Fails with [`StoreError::NotFound`] if the record was never created,
    /// and with an invariant error if `record` is not a legal successor.
    fn save(&self, record: &ReferendumRecord) -> Result<(), StoreError>;

    /// All records whose `closed_at` is unset. Order is unspecified.
    fn list_open(&self) -> Result<Vec<ReferendumRecord>, StoreError>;

    /// Every record, open or closed, in key order.
    fn list_all(&self) -> Result<Vec<ReferendumRecord>, StoreError>;
}
