//! Decision engine behaviour against deterministic collaborators:
//! referendum discovery → sentiment sampling → vote submission → persistence.
//!
//! Every scenario runs on the Kusama Treasurer policy
//! (internal vote at day 5, revote check at day 10, decision period 14 days).

use std::sync::Arc;
use std::time::Duration;

use govproxy_governance::{
    DecisionEngine, EngineConfig, GovernanceError, PolicyEntry, PolicyError, PolicyTable,
    ReferendumInfo,
};
use govproxy_nullables::{
    NullClock, NullReferendumStore, NullSentimentProvider, NullVoteSubmitter, SubmitOutcome,
};
use govproxy_store::{CloseReason, RecordPhase, ReferendumStore};
use govproxy_store_lmdb::LmdbEnvironment;
use govproxy_types::{
    Conviction, Network, Origin, RecordKey, ReferendumId, Tally, Timestamp, VoteDecision,
    SECS_PER_DAY,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const T0: u64 = 1_700_000_000;

type NullEngine = DecisionEngine<NullReferendumStore, NullSentimentProvider, NullVoteSubmitter>;

struct Harness {
    engine: Arc<NullEngine>,
    store: Arc<NullReferendumStore>,
    sentiment: Arc<NullSentimentProvider>,
    submitter: Arc<NullVoteSubmitter>,
    clock: NullClock,
}

fn policy() -> Arc<PolicyTable> {
    Arc::new(
        PolicyTable::from_entries([
            (Network::Kusama, Origin::Treasurer, PolicyEntry::new(14, 5, 10)),
            (Network::Kusama, Origin::SmallTipper, PolicyEntry::new(7, 2, 5)),
        ])
        .unwrap(),
    )
}

fn config() -> EngineConfig {
    EngineConfig {
        call_timeout: Duration::from_millis(50),
        max_concurrent_evaluations: 4,
        conviction: Conviction::Locked1x,
    }
}

fn harness() -> Harness {
    let store = Arc::new(NullReferendumStore::new());
    let sentiment = Arc::new(NullSentimentProvider::new());
    let submitter = Arc::new(NullVoteSubmitter::new());
    let engine = Arc::new(DecisionEngine::new(
        Arc::clone(&store),
        policy(),
        Arc::clone(&sentiment),
        Arc::clone(&submitter),
        config(),
    ));
    Harness {
        engine,
        store,
        sentiment,
        submitter,
        clock: NullClock::new(T0),
    }
}

fn key(index: u32) -> RecordKey {
    RecordKey::new(Network::Kusama, ReferendumId::new(index))
}

fn treasurer(index: u32) -> ReferendumInfo {
    ReferendumInfo {
        key: key(index),
        origin: Origin::Treasurer,
        submitted_at: Timestamp::new(T0),
    }
}

fn day(n: u64) -> Timestamp {
    Timestamp::new(T0 + n * SECS_PER_DAY)
}

const AYE: Tally = Tally {
    aye: 5,
    nay: 1,
    abstain: 0,
};
const NAY: Tally = Tally {
    aye: 1,
    nay: 4,
    abstain: 0,
};

impl Harness {
    async fn tick_at(&self, now: Timestamp) -> govproxy_governance::TickReport {
        self.clock.set(now.as_secs());
        self.engine.tick(self.clock.now()).await.unwrap()
    }

    fn record(&self, index: u32) -> govproxy_store::ReferendumRecord {
        self.store.get(&key(index)).unwrap().unwrap()
    }
}

// ---------------------------------------------------------------------------
// 1. Lifecycle scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unchanged_sentiment_closes_without_revote() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);

    h.tick_at(day(0)).await;
    assert_eq!(h.record(1).phase, RecordPhase::AwaitingFirstWindow);
    assert!(h.submitter.submissions().is_empty());

    let report = h.tick_at(day(5)).await;
    assert_eq!(report.first_votes, 1);
    let record = h.record(1);
    assert_eq!(record.phase, RecordPhase::FirstVoteCast);
    assert_eq!(record.first_vote_decision, Some(VoteDecision::Aye));
    assert_eq!(record.first_voted_at, Some(day(5)));
    assert_eq!(record.first_tally_snapshot, Some(AYE));

    let report = h.tick_at(day(10)).await;
    assert_eq!(report.revotes, 0);
    assert_eq!(report.closed, 1);

    let record = h.record(1);
    assert_eq!(record.close_reason, Some(CloseReason::Completed));
    assert_eq!(record.second_tally_snapshot, Some(AYE));
    assert_eq!(record.second_vote_decision, None);
    assert_eq!(record.second_voted_at, None);
    assert!(record
        .transitions
        .iter()
        .any(|t| t.phase == RecordPhase::ConfirmedNoRevote));
    assert_eq!(h.submitter.submissions_for(key(1)), vec![VoteDecision::Aye]);
}

#[tokio::test]
async fn flipped_sentiment_casts_revote() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.tick_at(day(5)).await;

    h.sentiment.set_tally(key(1), NAY);
    let report = h.tick_at(day(10)).await;
    assert_eq!(report.revotes, 1);

    let record = h.record(1);
    assert_eq!(record.phase, RecordPhase::Closed);
    assert_eq!(record.close_reason, Some(CloseReason::Completed));
    assert_eq!(record.first_vote_decision, Some(VoteDecision::Aye));
    assert_eq!(record.second_vote_decision, Some(VoteDecision::Nay));
    assert_eq!(record.second_voted_at, Some(day(10)));
    assert!(record
        .transitions
        .iter()
        .any(|t| t.phase == RecordPhase::RevoteCast));
    assert_eq!(
        h.submitter.submissions_for(key(1)),
        vec![VoteDecision::Aye, VoteDecision::Nay]
    );
    assert_eq!(h.submitter.on_chain(key(1)), Some(VoteDecision::Nay));
}

#[tokio::test]
async fn changed_tally_with_same_decision_does_not_revote() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), Tally::new(3, 1, 0));
    h.tick_at(day(5)).await;

    h.sentiment.set_tally(key(1), Tally::new(10, 2, 5));
    h.tick_at(day(10)).await;

    assert_eq!(h.submitter.submissions_for(key(1)).len(), 1);
    assert_eq!(h.record(1).close_reason, Some(CloseReason::Completed));
}

#[tokio::test]
async fn unavailable_sentiment_defers_first_vote() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.sentiment.set_unavailable(key(1));

    let report = h.tick_at(day(5)).await;
    assert_eq!(report.sentiment_deferrals, 1);
    assert!(h.submitter.submissions().is_empty());
    assert_eq!(h.record(1).phase, RecordPhase::AwaitingFirstWindow);

    h.sentiment.set_available(key(1));
    h.tick_at(day(6)).await;
    let record = h.record(1);
    assert_eq!(record.phase, RecordPhase::FirstVoteCast);
    assert_eq!(record.first_voted_at, Some(day(6)));
}

#[tokio::test]
async fn nothing_happens_before_the_internal_window() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);

    h.tick_at(day(4).plus_secs(SECS_PER_DAY - 1)).await;
    assert_eq!(h.sentiment.calls(), 0);
    assert!(h.submitter.submissions().is_empty());
}

#[tokio::test]
async fn conviction_is_forwarded() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.tick_at(day(5)).await;

    let submissions = h.submitter.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].conviction, Conviction::Locked1x);
}

// ---------------------------------------------------------------------------
// 2. Origin policy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_origin_is_rejected_without_record() {
    let h = harness();
    let info = ReferendumInfo {
        key: key(9),
        origin: Origin::Root,
        submitted_at: Timestamp::new(T0),
    };
    let err = h.engine.observe(&info).unwrap_err();
    assert!(matches!(
        err,
        GovernanceError::Policy(PolicyError::UnknownOrigin {
            network: Network::Kusama,
            origin: Origin::Root
        })
    ));
    assert!(h.store.is_empty());

    h.tick_at(day(20)).await;
    assert!(h.submitter.submissions().is_empty());
}

#[tokio::test]
async fn record_whose_origin_lost_its_policy_is_skipped() {
    let store = Arc::new(NullReferendumStore::new());
    store
        .get_or_create(key(1), Origin::Root, Timestamp::new(T0))
        .unwrap();
    let sentiment = Arc::new(NullSentimentProvider::new());
    sentiment.set_tally(key(1), AYE);
    let submitter = Arc::new(NullVoteSubmitter::new());
    let engine = Arc::new(DecisionEngine::new(
        Arc::clone(&store),
        policy(),
        sentiment,
        Arc::clone(&submitter),
        config(),
    ));

    let report = engine.tick(day(6)).await.unwrap();
    assert_eq!(report.skipped, 1);
    assert!(submitter.submissions().is_empty());
    assert_eq!(
        store.get(&key(1)).unwrap().unwrap().phase,
        RecordPhase::New
    );
}

#[tokio::test]
async fn observing_twice_keeps_original_fields() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    let replay = ReferendumInfo {
        key: key(1),
        origin: Origin::SmallTipper,
        submitted_at: day(3),
    };
    let record = h.engine.observe(&replay).unwrap();
    assert_eq!(record.origin, Origin::Treasurer);
    assert_eq!(record.submitted_at, Timestamp::new(T0));
}

// ---------------------------------------------------------------------------
// 3. Idempotence, concurrency, restart safety
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_tick_submits_nothing_new() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);

    h.tick_at(day(5)).await;
    let report = h.tick_at(day(5)).await;
    assert_eq!(report.votes(), 0);
    assert_eq!(h.submitter.submissions().len(), 1);

    h.sentiment.set_tally(key(1), NAY);
    h.tick_at(day(10)).await;
    h.tick_at(day(10)).await;
    assert_eq!(h.submitter.submissions().len(), 2);
}

#[tokio::test]
async fn concurrent_ticks_vote_once_per_record() {
    let h = harness();
    for i in 0..16 {
        h.engine.observe(&treasurer(i)).unwrap();
        h.sentiment.set_tally(key(i), AYE);
    }

    let a = {
        let engine = Arc::clone(&h.engine);
        tokio::spawn(async move { engine.tick(day(5)).await.unwrap() })
    };
    let b = {
        let engine = Arc::clone(&h.engine);
        tokio::spawn(async move { engine.tick(day(5)).await.unwrap() })
    };
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    assert_eq!(a.first_votes + b.first_votes, 16);
    for i in 0..16 {
        assert_eq!(h.submitter.submissions_for(key(i)).len(), 1, "record {i}");
    }
}

#[tokio::test]
async fn restart_does_not_resubmit() {
    let dir = tempfile::tempdir().unwrap();
    let sentiment = Arc::new(NullSentimentProvider::new());
    let submitter = Arc::new(NullVoteSubmitter::new());
    sentiment.set_tally(key(1), AYE);

    {
        let env = LmdbEnvironment::open_default(dir.path()).unwrap();
        let engine = Arc::new(DecisionEngine::new(
            Arc::new(env.referendum_store()),
            policy(),
            Arc::clone(&sentiment),
            Arc::clone(&submitter),
            config(),
        ));
        engine.observe(&treasurer(1)).unwrap();
        let report = engine.tick(day(5)).await.unwrap();
        assert_eq!(report.first_votes, 1);
        env.force_sync().unwrap();
    }

    let env = LmdbEnvironment::open_default(dir.path()).unwrap();
    let engine = Arc::new(DecisionEngine::new(
        Arc::new(env.referendum_store()),
        policy(),
        Arc::clone(&sentiment),
        Arc::clone(&submitter),
        config(),
    ));
    engine.observe(&treasurer(1)).unwrap();
    engine.tick(day(5)).await.unwrap();
    engine.tick(day(6)).await.unwrap();

    assert_eq!(submitter.submissions_for(key(1)), vec![VoteDecision::Aye]);
    let record = env.referendum_store().get(&key(1)).unwrap().unwrap();
    assert_eq!(record.phase, RecordPhase::FirstVoteCast);
}

// ---------------------------------------------------------------------------
// 4. Submission failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transient_failure_retries_same_decision_without_requery() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.submitter.script(SubmitOutcome::Transient("pool full".into()));

    let report = h.tick_at(day(5)).await;
    assert_eq!(report.transient_failures, 1);
    let record = h.record(1);
    assert_eq!(record.phase, RecordPhase::AwaitingFirstWindow);
    assert_eq!(record.first_voted_at, None);
    let pending = record.pending_vote.unwrap();
    assert_eq!(pending.decision, VoteDecision::Aye);
    assert_eq!(pending.attempts, 1);

    // A different tally must not change the decision already taken.
    h.sentiment.set_tally(key(1), NAY);
    h.tick_at(day(5).plus_secs(300)).await;

    assert_eq!(h.sentiment.calls(), 1);
    assert_eq!(
        h.submitter.submissions_for(key(1)),
        vec![VoteDecision::Aye, VoteDecision::Aye]
    );
    let record = h.record(1);
    assert_eq!(record.first_vote_decision, Some(VoteDecision::Aye));
    assert_eq!(record.first_tally_snapshot, Some(AYE));
    assert_eq!(record.pending_vote, None);
}

#[tokio::test]
async fn rejection_closes_record_and_is_never_retried() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.submitter.script(SubmitOutcome::Reject("AlreadyDelegating".into()));

    let report = h.tick_at(day(5)).await;
    assert_eq!(report.rejections, 1);
    assert_eq!(report.closed, 1);

    let record = h.record(1);
    assert_eq!(
        record.close_reason,
        Some(CloseReason::VoteRejected {
            reason: "AlreadyDelegating".into()
        })
    );
    assert_eq!(record.first_voted_at, None);

    h.tick_at(day(6)).await;
    h.tick_at(day(11)).await;
    assert_eq!(h.submitter.submissions().len(), 1);
}

#[tokio::test]
async fn lost_acknowledgement_is_reconciled_from_chain() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.submitter.script(SubmitOutcome::LandedButLost);

    h.tick_at(day(5)).await;
    assert_eq!(h.record(1).phase, RecordPhase::AwaitingFirstWindow);

    let report = h.tick_at(day(5).plus_secs(300)).await;
    assert_eq!(report.reconciled, 1);
    assert_eq!(h.submitter.submissions().len(), 1);

    let record = h.record(1);
    assert_eq!(record.phase, RecordPhase::FirstVoteCast);
    assert_eq!(record.first_vote_decision, Some(VoteDecision::Aye));
    assert!(record.first_vote_receipt.unwrap().reconciled);
}

#[tokio::test]
async fn unreadable_chain_history_defers_resubmission() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.submitter.script(SubmitOutcome::Transient("timeout".into()));
    h.tick_at(day(5)).await;

    h.submitter.set_history_unavailable(true);
    h.tick_at(day(6)).await;
    assert_eq!(h.submitter.submissions().len(), 1);

    h.submitter.set_history_unavailable(false);
    h.tick_at(day(7)).await;
    assert_eq!(h.submitter.submissions().len(), 2);
    assert_eq!(h.record(1).phase, RecordPhase::FirstVoteCast);
}

#[tokio::test]
async fn hung_submitter_times_out_as_transient() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.submitter.set_hang(true);

    let report = h.tick_at(day(5)).await;
    assert_eq!(report.transient_failures, 1);
    assert_eq!(h.record(1).pending_vote.unwrap().attempts, 1);
}

#[tokio::test]
async fn hung_sentiment_times_out_as_deferral() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.sentiment.set_hang(true);

    let report = h.tick_at(day(5)).await;
    assert_eq!(report.sentiment_deferrals, 1);
    assert_eq!(h.record(1).phase, RecordPhase::AwaitingFirstWindow);
    assert!(h.submitter.submissions().is_empty());
}

// ---------------------------------------------------------------------------
// 5. Persistence failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_save_before_submission_sends_nothing() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.store.fail_saves_after(0);

    let report = h.tick_at(day(5)).await;
    assert_eq!(report.errors, 1);
    assert!(h.submitter.submissions().is_empty());
    assert_eq!(h.record(1).phase, RecordPhase::New);

    h.store.heal();
    h.tick_at(day(5)).await;
    assert_eq!(h.submitter.submissions().len(), 1);
}

#[tokio::test]
async fn failed_save_after_submission_is_reconciled() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.tick_at(day(0)).await;

    // The attempt is persisted, the vote lands, the acknowledgement save fails.
    h.store.fail_saves_after(1);
    let report = h.tick_at(day(5)).await;
    assert_eq!(report.errors, 1);
    assert_eq!(h.submitter.on_chain(key(1)), Some(VoteDecision::Aye));
    assert_eq!(h.record(1).phase, RecordPhase::AwaitingFirstWindow);

    h.store.heal();
    let report = h.tick_at(day(5)).await;
    assert_eq!(report.reconciled, 1);
    assert_eq!(h.submitter.submissions().len(), 1);
    assert_eq!(h.record(1).phase, RecordPhase::FirstVoteCast);
}

// ---------------------------------------------------------------------------
// 6. Window ceilings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_window_missed_when_first_seen_late() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);

    let report = h.tick_at(day(14)).await;
    assert_eq!(report.closed, 1);
    assert_eq!(h.sentiment.calls(), 0);
    assert!(h.submitter.submissions().is_empty());
    assert_eq!(h.record(1).close_reason, Some(CloseReason::WindowMissed));
}

#[tokio::test]
async fn sentiment_outage_until_ceiling_misses_window() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_unavailable(key(1));

    for d in 5..14 {
        h.tick_at(day(d)).await;
    }
    assert_eq!(h.record(1).phase, RecordPhase::AwaitingFirstWindow);

    h.tick_at(day(14)).await;
    let record = h.record(1);
    assert_eq!(record.close_reason, Some(CloseReason::WindowMissed));
    assert_eq!(record.first_voted_at, None);
}

#[tokio::test]
async fn revote_window_includes_decision_day() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.tick_at(day(5)).await;

    h.sentiment.set_tally(key(1), NAY);
    let report = h.tick_at(day(14)).await;
    assert_eq!(report.revotes, 1);
    assert_eq!(h.record(1).second_voted_at, Some(day(14)));
}

#[tokio::test]
async fn revote_check_never_reached_closes_completed() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.tick_at(day(5)).await;

    h.sentiment.set_tally(key(1), NAY);
    h.tick_at(day(15)).await;

    let record = h.record(1);
    assert_eq!(record.close_reason, Some(CloseReason::Completed));
    assert_eq!(record.second_tally_snapshot, None);
    assert_eq!(h.submitter.submissions().len(), 1);
}

#[tokio::test]
async fn revote_outage_until_ceiling_misses_window() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.tick_at(day(5)).await;

    h.sentiment.set_unavailable(key(1));
    for d in 10..=14 {
        let report = h.tick_at(day(d)).await;
        assert_eq!(report.sentiment_deferrals, 1);
    }
    let record = h.record(1);
    assert_eq!(record.phase, RecordPhase::FirstVoteCast);
    assert_eq!(record.revote_deferrals, 5);

    h.tick_at(day(15)).await;
    let record = h.record(1);
    assert_eq!(record.close_reason, Some(CloseReason::WindowMissed));
    assert_eq!(record.first_vote_decision, Some(VoteDecision::Aye));
    assert_eq!(record.second_tally_snapshot, None);
    assert_eq!(h.submitter.submissions().len(), 1);
}

#[tokio::test]
async fn revote_outage_that_recovers_still_checks_sentiment() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.tick_at(day(5)).await;

    h.sentiment.set_unavailable(key(1));
    h.tick_at(day(10)).await;
    h.sentiment.set_available(key(1));
    h.tick_at(day(11)).await;

    let record = h.record(1);
    assert_eq!(record.close_reason, Some(CloseReason::Completed));
    assert_eq!(record.revote_deferrals, 1);
    assert_eq!(record.second_tally_snapshot, Some(AYE));
}

#[tokio::test]
async fn undelivered_revote_misses_window() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.tick_at(day(5)).await;

    h.sentiment.set_tally(key(1), NAY);
    h.submitter.script(SubmitOutcome::Transient("pool full".into()));
    h.tick_at(day(10)).await;
    assert_eq!(h.record(1).phase, RecordPhase::AwaitingRevoteWindow);

    h.tick_at(day(15)).await;
    let record = h.record(1);
    assert_eq!(record.close_reason, Some(CloseReason::WindowMissed));
    assert_eq!(record.second_voted_at, None);
    assert_eq!(record.pending_vote.unwrap().decision, VoteDecision::Nay);
    assert_eq!(h.submitter.on_chain(key(1)), Some(VoteDecision::Aye));
}

// ---------------------------------------------------------------------------
// 7. Operator actions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn force_close_keeps_vote_fields_and_stops_scheduling() {
    let h = harness();
    h.engine.observe(&treasurer(1)).unwrap();
    h.sentiment.set_tally(key(1), AYE);
    h.tick_at(day(5)).await;

    let closed = h
        .engine
        .force_close(key(1), "duplicate proposal".into(), day(6))
        .await
        .unwrap();
    assert_eq!(closed.first_vote_decision, Some(VoteDecision::Aye));
    assert_eq!(
        closed.close_reason,
        Some(CloseReason::ForcedByOperator {
            note: "duplicate proposal".into()
        })
    );

    h.sentiment.set_tally(key(1), NAY);
    h.tick_at(day(10)).await;
    assert_eq!(h.submitter.submissions().len(), 1);

    let again = h.engine.force_close(key(1), "again".into(), day(11)).await;
    assert!(matches!(again, Err(GovernanceError::AlreadyClosed(_))));
    let missing = h.engine.force_close(key(77), "nope".into(), day(11)).await;
    assert!(matches!(missing, Err(GovernanceError::RecordNotFound(_))));
}

// ---------------------------------------------------------------------------
// 8. Many records
// ---------------------------------------------------------------------------

#[tokio::test]
async fn records_progress_independently() {
    let h = harness();
    for i in 0..12 {
        h.engine.observe(&treasurer(i)).unwrap();
        if i % 3 == 0 {
            h.sentiment.set_unavailable(key(i));
        } else {
            h.sentiment.set_tally(key(i), AYE);
        }
    }

    let report = h.tick_at(day(5)).await;
    assert_eq!(report.evaluated, 12);
    assert_eq!(report.first_votes, 8);
    assert_eq!(report.sentiment_deferrals, 4);

    for i in 0..12 {
        let expected = if i % 3 == 0 {
            RecordPhase::AwaitingFirstWindow
        } else {
            RecordPhase::FirstVoteCast
        };
        assert_eq!(h.record(i).phase, expected, "record {i}");
    }
}

// ---------------------------------------------------------------------------
// 9. Shutdown
// ---------------------------------------------------------------------------

fn serial_engine(call_timeout: Duration) -> Harness {
    let store = Arc::new(NullReferendumStore::new());
    let sentiment = Arc::new(NullSentimentProvider::new());
    let submitter = Arc::new(NullVoteSubmitter::new());
    let engine = Arc::new(DecisionEngine::new(
        Arc::clone(&store),
        policy(),
        Arc::clone(&sentiment),
        Arc::clone(&submitter),
        EngineConfig {
            call_timeout,
            max_concurrent_evaluations: 1,
            conviction: Conviction::None,
        },
    ));
    Harness {
        engine,
        store,
        sentiment,
        submitter,
        clock: NullClock::new(T0),
    }
}

#[tokio::test]
async fn stopped_tick_starts_no_evaluation() {
    let h = harness();
    for i in 0..3 {
        h.engine.observe(&treasurer(i)).unwrap();
        h.sentiment.set_tally(key(i), AYE);
    }

    let (tx, rx) = tokio::sync::watch::channel(false);
    tx.send_replace(true);
    let report = h.engine.tick_until(day(5), rx).await.unwrap();

    assert_eq!(report.evaluated, 0);
    assert_eq!(report.not_started, 3);
    assert_eq!(h.sentiment.calls(), 0);
    assert!(h.submitter.submissions().is_empty());
    assert_eq!(h.record(0).phase, RecordPhase::New);
}

#[tokio::test]
async fn stop_mid_tick_lets_running_evaluation_finish_and_skips_the_rest() {
    let h = serial_engine(Duration::from_millis(400));
    for i in 0..8 {
        h.engine.observe(&treasurer(i)).unwrap();
        h.sentiment.set_tally(key(i), AYE);
    }
    h.submitter.set_hang(true);

    let (tx, rx) = tokio::sync::watch::channel(false);
    let engine = Arc::clone(&h.engine);
    let tick = tokio::spawn(async move { engine.tick_until(day(5), rx).await });

    // First evaluation times out at 400ms; the second is mid-submission.
    tokio::time::sleep(Duration::from_millis(600)).await;
    tx.send_replace(true);
    let report = tick.await.unwrap().unwrap();

    assert_eq!(report.evaluated, 2);
    assert_eq!(report.transient_failures, 2);
    assert_eq!(report.not_started, 6);
    assert_eq!(h.submitter.submissions().len(), 2);

    // Both started votes kept their pending decision for the next run.
    let pending = (0..8)
        .filter(|&i| h.record(i).pending_vote.is_some())
        .count();
    assert_eq!(pending, 2);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.submitter.submissions().len(), 2);
}
