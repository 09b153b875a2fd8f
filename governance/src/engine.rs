//! Decision engine: the per-referendum vote scheduling state machine.
//!
//! ```text
//! New -> AwaitingFirstWindow -> FirstVoteCast -> AwaitingRevoteWindow
//!     -> { RevoteCast | ConfirmedNoRevote } -> Closed
//! ```
//!
//! Each tick evaluates every open record independently. A record keeps
//! stepping through phases within one evaluation until it has to wait for
//! time to pass or for a collaborator to recover. Every phase change is
//! saved before the next step starts.
//!
//! Votes go through a [`PendingVote`] that is saved *before* the first
//! submission attempt. Retries reuse its decision, and a pending vote that
//! was already attempted is reconciled against the chain before it is sent
//! again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::Instrument;

use govproxy_store::{
    CloseReason, PendingVote, RecordPhase, ReferendumRecord, ReferendumStore, VoteSlot,
};
use govproxy_types::{Conviction, RecordKey, Tally, Timestamp, VoteDecision, VoteReceipt};

use crate::collaborators::{
    ReferendumInfo, SentimentError, SentimentProvider, SubmissionError, VoteSubmitter,
};
use crate::keyed_lock::KeyedLocks;
use crate::policy::{PolicyEntry, PolicyTable};
use crate::GovernanceError;

/// Tunables for the engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Upper bound on any single collaborator call.
    pub call_timeout: Duration,
    /// Records evaluated in parallel within one tick.
    pub max_concurrent_evaluations: usize,
    /// Conviction attached to every submitted vote.
    pub conviction: Conviction,
}

/// Collaborator calls one evaluation can make in the worst case: a sample
/// or reconciliation plus a submission, once per vote slot.
pub const MAX_CALLS_PER_EVALUATION: u32 = 4;

impl EngineConfig {
    /// Upper bound on the time one evaluation spends waiting on
    /// collaborators.
    pub fn evaluation_deadline(&self) -> Duration {
        self.call_timeout * MAX_CALLS_PER_EVALUATION
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            max_concurrent_evaluations: 8,
            conviction: Conviction::None,
        }
    }
}

/// What happened to one record during one evaluation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvaluationOutcome {
    pub first_votes: u32,
    pub revotes: u32,
    /// Votes found on chain after an interrupted submission.
    pub reconciled: u32,
    pub sentiment_deferrals: u32,
    pub transient_failures: u32,
    pub rejections: u32,
    pub closed: Option<CloseReason>,
    /// The record's origin has no policy entry; nothing was done.
    pub skipped_unknown_origin: bool,
}

/// Aggregate of one tick over all open records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub evaluated: u32,
    pub first_votes: u32,
    pub revotes: u32,
    pub reconciled: u32,
    pub sentiment_deferrals: u32,
    pub transient_failures: u32,
    pub rejections: u32,
    pub closed: u32,
    pub skipped: u32,
    /// Evaluations aborted by a persistence or task failure.
    pub errors: u32,
    /// Records skipped because shutdown was requested first.
    pub not_started: u32,
}

impl TickReport {
    fn absorb(&mut self, outcome: &EvaluationOutcome) {
        self.evaluated += 1;
        self.first_votes += outcome.first_votes;
        self.revotes += outcome.revotes;
        self.reconciled += outcome.reconciled;
        self.sentiment_deferrals += outcome.sentiment_deferrals;
        self.transient_failures += outcome.transient_failures;
        self.rejections += outcome.rejections;
        if outcome.closed.is_some() {
            self.closed += 1;
        }
        if outcome.skipped_unknown_origin {
            self.skipped += 1;
        }
    }

    /// Total votes acknowledged during the tick.
    pub fn votes(&self) -> u32 {
        self.first_votes + self.revotes + self.reconciled
    }
}

enum Step {
    Continue,
    Done,
}

enum Reconciliation {
    /// The pending vote is on chain.
    Landed,
    /// The chain does not show the pending vote; it must be (re)submitted.
    Absent,
    /// The chain could not be asked.
    Unknown,
}

pub struct DecisionEngine<S, P, V> {
    store: Arc<S>,
    policy: Arc<PolicyTable>,
    sentiment: Arc<P>,
    submitter: Arc<V>,
    locks: KeyedLocks,
    limiter: Arc<Semaphore>,
    config: EngineConfig,
}

impl<S, P, V> DecisionEngine<S, P, V>
where
    S: ReferendumStore + 'static,
    P: SentimentProvider + 'static,
    V: VoteSubmitter + 'static,
{
    pub fn new(
        store: Arc<S>,
        policy: Arc<PolicyTable>,
        sentiment: Arc<P>,
        submitter: Arc<V>,
        config: EngineConfig,
    ) -> Self {
        let permits = config.max_concurrent_evaluations.max(1);
        Self {
            store,
            policy,
            sentiment,
            submitter,
            locks: KeyedLocks::new(),
            limiter: Arc::new(Semaphore::new(permits)),
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start tracking a referendum reported by the discovery feed.
    ///
    /// Fails with [`PolicyError::UnknownOrigin`](crate::PolicyError::UnknownOrigin)
    /// before touching the store if the origin has no policy entry on the
    /// referendum's network. Already tracked referenda are returned unchanged.
    pub fn observe(&self, info: &ReferendumInfo) -> Result<ReferendumRecord, GovernanceError> {
        self.policy.lookup(info.key.network, info.origin)?;
        Ok(self
            .store
            .get_or_create(info.key, info.origin, info.submitted_at)?)
    }

    /// Evaluate every open record once.
    ///
    /// Records run concurrently up to `max_concurrent_evaluations`. Failures
    /// of individual records are counted in the report and do not stop the
    /// others; only a failure to list the open records fails the tick.
    pub async fn tick(self: &Arc<Self>, now: Timestamp) -> Result<TickReport, GovernanceError> {
        let (_never, stop) = watch::channel(false);
        self.tick_until(now, stop).await
    }

    /// Like [`tick`](Self::tick), but stops starting evaluations once `stop`
    /// reads `true`.
    ///
    /// Evaluations already holding a permit run to their last save; records
    /// still waiting for one are left for a later tick and counted in
    /// [`TickReport::not_started`].
    pub async fn tick_until(
        self: &Arc<Self>,
        now: Timestamp,
        stop: watch::Receiver<bool>,
    ) -> Result<TickReport, GovernanceError> {
        let open = self.store.list_open()?;
        let mut report = TickReport::default();
        let mut tasks = JoinSet::new();

        for record in open {
            let engine = Arc::clone(self);
            let key = record.key;
            let mut stop = stop.clone();
            tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = stop_requested(&mut stop) => None,
                    permit = Arc::clone(&engine.limiter).acquire_owned() => Some(permit),
                };
                let Some(permit) = permit else {
                    return (key, None);
                };
                let Ok(_permit) = permit else {
                    return (key, Some(Err(GovernanceError::Task("evaluation limiter closed".into()))));
                };
                let stopping = *stop.borrow();
                if stopping {
                    return (key, None);
                }
                (key, Some(engine.evaluate(key, now).await))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Some(Ok(outcome)))) => report.absorb(&outcome),
                Ok((_, None)) => report.not_started += 1,
                Ok((key, Some(Err(e)))) => {
                    report.errors += 1;
                    tracing::error!(%key, error = %e, "evaluation aborted");
                }
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(error = %e, "evaluation task failed");
                }
            }
        }

        if report.not_started > 0 {
            tracing::info!(
                not_started = report.not_started,
                "shutdown requested, remaining records left for the next run"
            );
        }
        Ok(report)
    }

    /// Evaluate a single record under its lock.
    pub async fn evaluate(
        &self,
        key: RecordKey,
        now: Timestamp,
    ) -> Result<EvaluationOutcome, GovernanceError> {
        let span = tracing::info_span!(
            "evaluate",
            network = %key.network,
            referendum = key.referendum_id.as_u32()
        );
        async move {
            let _guard = self.locks.lock(key).await;
            let mut outcome = EvaluationOutcome::default();

            let mut record = self
                .store
                .get(&key)?
                .ok_or_else(|| GovernanceError::RecordNotFound(key.to_string()))?;
            if record.is_closed() {
                return Ok(outcome);
            }

            let entry = match self.policy.lookup(key.network, record.origin) {
                Ok(entry) => *entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping referendum without a policy entry");
                    outcome.skipped_unknown_origin = true;
                    return Ok(outcome);
                }
            };

            while let Step::Continue = self.step(&mut record, &entry, now, &mut outcome).await? {}
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    /// Close a record by hand. Vote fields are left untouched.
    pub async fn force_close(
        &self,
        key: RecordKey,
        note: String,
        now: Timestamp,
    ) -> Result<ReferendumRecord, GovernanceError> {
        let _guard = self.locks.lock(key).await;
        let mut record = self
            .store
            .get(&key)?
            .ok_or_else(|| GovernanceError::RecordNotFound(key.to_string()))?;
        if record.is_closed() {
            return Err(GovernanceError::AlreadyClosed(key.to_string()));
        }
        record.close(CloseReason::ForcedByOperator { note: note.clone() }, now);
        self.store.save(&record)?;
        tracing::warn!(%key, %note, "referendum closed by operator");
        Ok(record)
    }

    async fn step(
        &self,
        record: &mut ReferendumRecord,
        entry: &PolicyEntry,
        now: Timestamp,
        outcome: &mut EvaluationOutcome,
    ) -> Result<Step, GovernanceError> {
        let age = record.age_days(now);
        let internal = u64::from(entry.internal_vote_period_days);
        let revote = u64::from(entry.revote_period_days);
        let decision = u64::from(entry.decision_period_days);

        match record.phase {
            RecordPhase::New => {
                record.advance(RecordPhase::AwaitingFirstWindow, now);
                self.persist(record)?;
                Ok(Step::Continue)
            }

            RecordPhase::AwaitingFirstWindow => {
                let past_window = age >= decision;
                if record.pending_vote.is_some() {
                    return self
                        .deliver_pending(record, past_window, now, outcome)
                        .await;
                }
                if past_window {
                    tracing::warn!(age_days = age, "first voting window missed");
                    self.close(record, CloseReason::WindowMissed, now, outcome)?;
                    return Ok(Step::Done);
                }
                if age < internal {
                    return Ok(Step::Done);
                }

                let Some(tally) = self.sample(record.key, outcome).await else {
                    return Ok(Step::Done);
                };
                let first = self.sentiment.decide(&tally);
                tracing::info!(%tally, decision = %first, age_days = age, "first vote decided");
                record.first_tally_snapshot = Some(tally);
                record.pending_vote = Some(pending(VoteSlot::First, first, tally, now));
                self.submit_pending(record, now, outcome).await
            }

            RecordPhase::FirstVoteCast => {
                if age > decision {
                    // A revote check that kept failing is a missed window;
                    // one that never came due leaves the first vote standing.
                    let reason = if record.revote_deferrals > 0 {
                        tracing::warn!(
                            age_days = age,
                            deferrals = record.revote_deferrals,
                            "sentiment unavailable for the whole revote window"
                        );
                        CloseReason::WindowMissed
                    } else {
                        tracing::info!(age_days = age, "decision period over before revote check");
                        CloseReason::Completed
                    };
                    self.close(record, reason, now, outcome)?;
                    return Ok(Step::Done);
                }
                if age < revote {
                    return Ok(Step::Done);
                }

                let Some(tally) = self.sample(record.key, outcome).await else {
                    record.revote_deferrals += 1;
                    self.persist(record)?;
                    return Ok(Step::Done);
                };
                let second = self.sentiment.decide(&tally);
                record.second_tally_snapshot = Some(tally);
                record.advance(RecordPhase::AwaitingRevoteWindow, now);
                if Some(second) != record.first_vote_decision {
                    tracing::info!(%tally, decision = %second, "sentiment changed, revote due");
                    record.pending_vote = Some(pending(VoteSlot::Second, second, tally, now));
                } else {
                    tracing::debug!(%tally, decision = %second, "sentiment unchanged");
                }
                self.persist(record)?;
                Ok(Step::Continue)
            }

            RecordPhase::AwaitingRevoteWindow => {
                if record.pending_vote.is_none() {
                    record.advance(RecordPhase::ConfirmedNoRevote, now);
                    self.persist(record)?;
                    return Ok(Step::Continue);
                }
                self.deliver_pending(record, age > decision, now, outcome)
                    .await
            }

            RecordPhase::RevoteCast | RecordPhase::ConfirmedNoRevote => {
                self.close(record, CloseReason::Completed, now, outcome)?;
                Ok(Step::Done)
            }

            RecordPhase::Closed => Ok(Step::Done),
        }
    }

    /// Drive an existing pending vote: reconcile a previous attempt, give up
    /// once the window has passed, otherwise submit.
    async fn deliver_pending(
        &self,
        record: &mut ReferendumRecord,
        past_window: bool,
        now: Timestamp,
        outcome: &mut EvaluationOutcome,
    ) -> Result<Step, GovernanceError> {
        let Some(pending) = record.pending_vote.clone() else {
            return Ok(Step::Done);
        };

        if pending.attempts > 0 {
            match self.reconcile(record.key, &pending).await {
                Reconciliation::Landed => {
                    tracing::info!(
                        slot = ?pending.slot,
                        decision = %pending.decision,
                        "pending vote found on chain"
                    );
                    let voted_at = pending.last_attempt_at;
                    acknowledge(record, &pending, VoteReceipt::reconciled(), voted_at, now);
                    outcome.reconciled += 1;
                    self.persist(record)?;
                    return Ok(Step::Continue);
                }
                Reconciliation::Absent => {}
                Reconciliation::Unknown if !past_window => {
                    outcome.transient_failures += 1;
                    return Ok(Step::Done);
                }
                Reconciliation::Unknown => {}
            }
        }

        if past_window {
            tracing::warn!(
                slot = ?pending.slot,
                decision = %pending.decision,
                attempts = pending.attempts,
                "voting window closed before the vote was acknowledged"
            );
            self.close(record, CloseReason::WindowMissed, now, outcome)?;
            return Ok(Step::Done);
        }

        self.submit_pending(record, now, outcome).await
    }

    /// Persist one more attempt on the pending vote, then submit it.
    async fn submit_pending(
        &self,
        record: &mut ReferendumRecord,
        now: Timestamp,
        outcome: &mut EvaluationOutcome,
    ) -> Result<Step, GovernanceError> {
        let Some(mut pending) = record.pending_vote.clone() else {
            return Ok(Step::Done);
        };
        pending.attempts += 1;
        pending.last_attempt_at = now;
        record.pending_vote = Some(pending.clone());
        self.persist(record)?;

        let submission = self.submitter.submit_vote(
            record.key,
            pending.decision,
            self.config.conviction,
        );
        let result = match tokio::time::timeout(self.config.call_timeout, submission).await {
            Ok(result) => result,
            Err(_) => Err(SubmissionError::Transient(format!(
                "timed out after {:?}",
                self.config.call_timeout
            ))),
        };

        match result {
            Ok(receipt) => {
                tracing::info!(
                    slot = ?pending.slot,
                    decision = %pending.decision,
                    extrinsic = receipt.extrinsic_hash.as_deref().unwrap_or("-"),
                    "vote submitted"
                );
                acknowledge(record, &pending, receipt, now, now);
                match pending.slot {
                    VoteSlot::First => outcome.first_votes += 1,
                    VoteSlot::Second => outcome.revotes += 1,
                }
                self.persist(record)?;
                Ok(Step::Continue)
            }
            Err(SubmissionError::Transient(reason)) => {
                tracing::warn!(
                    attempt = pending.attempts,
                    %reason,
                    "vote submission failed, retrying next tick"
                );
                outcome.transient_failures += 1;
                Ok(Step::Done)
            }
            Err(SubmissionError::Rejected(reason)) => {
                tracing::error!(decision = %pending.decision, %reason, "vote rejected by chain");
                outcome.rejections += 1;
                self.close(record, CloseReason::VoteRejected { reason }, now, outcome)?;
                Ok(Step::Done)
            }
        }
    }

    async fn sample(&self, key: RecordKey, outcome: &mut EvaluationOutcome) -> Option<Tally> {
        let query = self.sentiment.current_tally(key);
        let result = match tokio::time::timeout(self.config.call_timeout, query).await {
            Ok(result) => result,
            Err(_) => Err(SentimentError::Timeout(self.config.call_timeout)),
        };
        match result {
            Ok(tally) => Some(tally),
            Err(e) => {
                tracing::warn!(error = %e, "sentiment unavailable, deferring");
                outcome.sentiment_deferrals += 1;
                None
            }
        }
    }

    async fn reconcile(&self, key: RecordKey, pending: &PendingVote) -> Reconciliation {
        let query = self.submitter.recorded_vote(key);
        match tokio::time::timeout(self.config.call_timeout, query).await {
            Ok(Ok(Some(on_chain))) if on_chain == pending.decision => Reconciliation::Landed,
            Ok(Ok(_)) => Reconciliation::Absent,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "could not read on-chain vote");
                Reconciliation::Unknown
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.config.call_timeout, "on-chain vote query timed out");
                Reconciliation::Unknown
            }
        }
    }

    fn close(
        &self,
        record: &mut ReferendumRecord,
        reason: CloseReason,
        now: Timestamp,
        outcome: &mut EvaluationOutcome,
    ) -> Result<(), GovernanceError> {
        record.close(reason.clone(), now);
        self.persist(record)?;
        tracing::info!(%reason, "referendum closed");
        outcome.closed = Some(reason);
        Ok(())
    }

    fn persist(&self, record: &ReferendumRecord) -> Result<(), GovernanceError> {
        self.store.save(record).map_err(|e| {
            tracing::error!(key = %record.key, error = %e, "failed to persist record");
            GovernanceError::from(e)
        })
    }
}

/// Resolves once `stop` reads `true`. Never resolves if the sender is gone.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    loop {
        let stopping = *stop.borrow_and_update();
        if stopping {
            return;
        }
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn pending(slot: VoteSlot, decision: VoteDecision, tally: Tally, now: Timestamp) -> PendingVote {
    PendingVote {
        slot,
        decision,
        tally,
        attempts: 0,
        first_attempt_at: now,
        last_attempt_at: now,
    }
}

/// Record `pending` as cast at `voted_at`; the phase change is stamped `now`.
fn acknowledge(
    record: &mut ReferendumRecord,
    pending: &PendingVote,
    receipt: VoteReceipt,
    voted_at: Timestamp,
    now: Timestamp,
) {
    record.pending_vote = None;
    match pending.slot {
        VoteSlot::First => {
            record.first_vote_decision = Some(pending.decision);
            record.first_voted_at = Some(voted_at);
            record.first_vote_receipt = Some(receipt);
            record.advance(RecordPhase::FirstVoteCast, now);
        }
        VoteSlot::Second => {
            record.second_vote_decision = Some(pending.decision);
            record.second_voted_at = Some(voted_at);
            record.second_vote_receipt = Some(receipt);
            record.advance(RecordPhase::RevoteCast, now);
        }
    }
}
