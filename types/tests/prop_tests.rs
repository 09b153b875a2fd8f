use proptest::prelude::*;

use govproxy_types::{
    DecisionRule, Network, RecordKey, ReferendumId, Tally, Timestamp, VoteDecision, SECS_PER_DAY,
};

fn any_network() -> impl Strategy<Value = Network> {
    prop_oneof![Just(Network::Polkadot), Just(Network::Kusama)]
}

proptest! {
    /// RecordKey byte encoding is lossless.
    #[test]
    fn record_key_bytes_roundtrip(network in any_network(), index in any::<u32>()) {
        let key = RecordKey::new(network, ReferendumId::new(index));
        prop_assert_eq!(RecordKey::from_bytes(&key.to_bytes()), Some(key));
    }

    /// RecordKey byte order matches the derived Ord.
    #[test]
    fn record_key_byte_order_matches_ord(
        na in any_network(), ia in any::<u32>(),
        nb in any_network(), ib in any::<u32>(),
    ) {
        let a = RecordKey::new(na, ReferendumId::new(ia));
        let b = RecordKey::new(nb, ReferendumId::new(ib));
        prop_assert_eq!(a.cmp(&b), a.to_bytes().cmp(&b.to_bytes()));
    }

    /// Age never decreases as time moves forward.
    #[test]
    fn age_is_monotonic(start in 0u64..1u64 << 40, a in 0u64..1u64 << 30, b in 0u64..1u64 << 30) {
        let submitted = Timestamp::new(start);
        let (early, late) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            submitted.age_days(submitted.plus_secs(early)) <= submitted.age_days(submitted.plus_secs(late))
        );
    }

    /// `plus_days(n)` is exactly `n` days old.
    #[test]
    fn plus_days_has_matching_age(start in 0u64..1u64 << 40, days in 0u64..10_000) {
        let submitted = Timestamp::new(start);
        prop_assert_eq!(submitted.age_days(submitted.plus_days(days)), days);
        prop_assert_eq!(submitted.plus_days(days).as_secs() - start, days * SECS_PER_DAY);
    }

    /// A non-abstain decision always means that side strictly leads.
    #[test]
    fn decision_requires_strict_lead(aye in 0u64..1_000, nay in 0u64..1_000, abstain in 0u64..1_000) {
        let tally = Tally::new(aye, nay, abstain);
        match tally.decide(&DecisionRule::default()) {
            VoteDecision::Aye => prop_assert!(aye > nay && aye > abstain),
            VoteDecision::Nay => prop_assert!(nay > aye && nay > abstain),
            VoteDecision::Abstain => prop_assert!(
                tally.total() == 0 || !(aye > nay && aye > abstain) && !(nay > aye && nay > abstain)
            ),
        }
    }

    /// Timestamp bincode serialization roundtrip.
    #[test]
    fn timestamp_bincode_roundtrip(secs in any::<u64>()) {
        let ts = Timestamp::new(secs);
        let encoded = bincode::serialize(&ts).unwrap();
        let decoded: Timestamp = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, ts);
    }
}
