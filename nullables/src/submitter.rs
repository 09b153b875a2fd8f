//! Nullable vote submitter: a scripted chain.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use govproxy_governance::{SubmissionError, VoteSubmitter};
use govproxy_types::{Conviction, RecordKey, VoteDecision, VoteReceipt};

/// How the next `submit_vote` call behaves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Vote included; a receipt is returned.
    Accept,
    /// Nothing reaches the chain.
    Transient(String),
    /// The chain refuses the vote.
    Reject(String),
    /// The vote is included but the acknowledgement is lost.
    LandedButLost,
}

/// One call to `submit_vote`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub key: RecordKey,
    pub decision: VoteDecision,
    pub conviction: Conviction,
}

/// A vote submitter backed by an in-memory "chain".
///
/// Unscripted calls succeed. Every call is recorded, including failed ones.
#[derive(Default)]
pub struct NullVoteSubmitter {
    script: Mutex<VecDeque<SubmitOutcome>>,
    submissions: Mutex<Vec<Submission>>,
    chain: Mutex<HashMap<RecordKey, VoteDecision>>,
    history_unavailable: AtomicBool,
    hang: AtomicBool,
}

impl NullVoteSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the behaviour of the next submission.
    pub fn script(&self, outcome: SubmitOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Every `submit_vote` call so far.
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    /// Calls to `submit_vote` for `key`.
    pub fn submissions_for(&self, key: RecordKey) -> Vec<VoteDecision> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.key == key)
            .map(|s| s.decision)
            .collect()
    }

    /// The proxy's vote on `key` as the chain sees it.
    pub fn on_chain(&self, key: RecordKey) -> Option<VoteDecision> {
        self.chain.lock().unwrap().get(&key).copied()
    }

    /// Make `recorded_vote` fail.
    pub fn set_history_unavailable(&self, unavailable: bool) {
        self.history_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every submission block forever.
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }
}

impl VoteSubmitter for NullVoteSubmitter {
    async fn submit_vote(
        &self,
        key: RecordKey,
        decision: VoteDecision,
        conviction: Conviction,
    ) -> Result<VoteReceipt, SubmissionError> {
        let n = {
            let mut submissions = self.submissions.lock().unwrap();
            submissions.push(Submission {
                key,
                decision,
                conviction,
            });
            submissions.len()
        };
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SubmitOutcome::Accept);
        match outcome {
            SubmitOutcome::Accept => {
                self.chain.lock().unwrap().insert(key, decision);
                Ok(VoteReceipt::submitted(format!("0x{n:064x}")))
            }
            SubmitOutcome::Transient(reason) => Err(SubmissionError::Transient(reason)),
            SubmitOutcome::Reject(reason) => Err(SubmissionError::Rejected(reason)),
            SubmitOutcome::LandedButLost => {
                self.chain.lock().unwrap().insert(key, decision);
                Err(SubmissionError::Transient("connection reset".into()))
            }
        }
    }

    async fn recorded_vote(&self, key: RecordKey) -> Result<Option<VoteDecision>, SubmissionError> {
        if self.history_unavailable.load(Ordering::SeqCst) {
            return Err(SubmissionError::Transient("chain history unavailable".into()));
        }
        Ok(self.on_chain(key))
    }
}
