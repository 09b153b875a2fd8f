use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use govproxy_governance::{DecisionEngine, EngineConfig, PolicyEntry, PolicyTable, ReferendumInfo};
use govproxy_nullables::{
    NullReferendumStore, NullSentimentProvider, NullVoteSubmitter, SubmitOutcome,
};
use govproxy_store::{RecordPhase, ReferendumStore};
use govproxy_types::{
    Network, Origin, RecordKey, ReferendumId, Tally, Timestamp, SECS_PER_DAY,
};

/// What the collaborators do on one simulated day.
#[derive(Clone, Debug)]
enum Day {
    Quiet,
    Sentiment(u64, u64, u64),
    SentimentDown,
    SubmitTransient,
    SubmitLost,
}

fn day_strategy() -> impl Strategy<Value = Day> {
    prop_oneof![
        2 => Just(Day::Quiet),
        4 => (0u64..10, 0u64..10, 0u64..4).prop_map(|(a, n, x)| Day::Sentiment(a, n, x)),
        1 => Just(Day::SentimentDown),
        1 => Just(Day::SubmitTransient),
        1 => Just(Day::SubmitLost),
    ]
}

proptest! {
    /// Validation accepts exactly the tables with `0 < internal < revote <= decision`.
    #[test]
    fn policy_ordering_is_enforced(
        decision in 0u32..60,
        internal in 0u32..60,
        revote in 0u32..60,
    ) {
        let entry = PolicyEntry::new(decision, internal, revote);
        let ordered = internal > 0 && internal < revote && revote <= decision;
        prop_assert_eq!(entry.validate().is_ok(), ordered);
        let table = PolicyTable::from_entries([(Network::Polkadot, Origin::Root, entry)]);
        prop_assert_eq!(table.is_ok(), ordered);
    }

    /// Whatever the collaborators do, a record's phase never regresses, at
    /// most two votes are cast, the first only inside its window, and a
    /// second vote always differs from the first.
    #[test]
    fn vote_invariants_hold_under_random_collaborators(
        days in proptest::collection::vec(day_strategy(), 18),
        ticks_per_day in 1usize..3,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let key = RecordKey::new(Network::Kusama, ReferendumId::new(1));
        let store = Arc::new(NullReferendumStore::new());
        let sentiment = Arc::new(NullSentimentProvider::new());
        let submitter = Arc::new(NullVoteSubmitter::new());
        let policy = Arc::new(
            PolicyTable::from_entries([(Network::Kusama, Origin::Treasurer, PolicyEntry::new(14, 5, 10))])
                .unwrap(),
        );
        let engine = Arc::new(DecisionEngine::new(
            Arc::clone(&store),
            policy,
            Arc::clone(&sentiment),
            Arc::clone(&submitter),
            EngineConfig {
                call_timeout: Duration::from_millis(50),
                ..EngineConfig::default()
            },
        ));
        let t0 = 1_000_000u64;
        engine
            .observe(&ReferendumInfo {
                key,
                origin: Origin::Treasurer,
                submitted_at: Timestamp::new(t0),
            })
            .unwrap();

        let mut last_rank = 0;
        for (d, behaviour) in days.iter().enumerate() {
            match behaviour {
                Day::Quiet => {}
                Day::Sentiment(a, n, x) => {
                    sentiment.set_available(key);
                    sentiment.set_tally(key, Tally::new(*a, *n, *x));
                }
                Day::SentimentDown => sentiment.set_unavailable(key),
                Day::SubmitTransient => submitter.script(SubmitOutcome::Transient("busy".into())),
                Day::SubmitLost => submitter.script(SubmitOutcome::LandedButLost),
            }
            for t in 0..ticks_per_day {
                let now = Timestamp::new(t0 + d as u64 * SECS_PER_DAY + t as u64 * 600);
                runtime.block_on(engine.tick(now)).unwrap();

                let record = store.get(&key).unwrap().unwrap();
                prop_assert!(record.phase.rank() >= last_rank);
                last_rank = record.phase.rank();
            }
        }

        let record = store.get(&key).unwrap().unwrap();
        let votes = submitter.submissions_for(key);
        let distinct_slots = usize::from(record.first_voted_at.is_some())
            + usize::from(record.second_voted_at.is_some());
        prop_assert!(distinct_slots <= 2);

        if let Some(at) = record.first_voted_at {
            prop_assert!(record.submitted_at.age_days(at) >= 5);
            prop_assert!(record.submitted_at.age_days(at) < 14);
        }
        if let (Some(first), Some(second)) = (record.first_vote_decision, record.second_vote_decision) {
            prop_assert_ne!(first, second);
            let at = record.second_voted_at.unwrap();
            prop_assert!(record.submitted_at.age_days(at) >= 10);
            prop_assert!(record.submitted_at.age_days(at) <= 14);
        }
        // Consecutive submissions of the same slot reuse one decision, so the
        // chain never sees more than two distinct decisions in sequence.
        let mut changes = 0;
        for pair in votes.windows(2) {
            if pair[0] != pair[1] {
                changes += 1;
            }
        }
        prop_assert!(changes <= 1, "submissions: {:?}", votes);
        // After day 17 the record must be closed.
        prop_assert_eq!(record.phase, RecordPhase::Closed);
        prop_assert!(record.close_reason.is_some());
    }
}
