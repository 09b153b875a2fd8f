//! Nullable sentiment provider: scripted tallies per referendum.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use govproxy_governance::{SentimentError, SentimentProvider};
use govproxy_types::{DecisionRule, RecordKey, Tally};

/// A sentiment provider whose answers are set by the test.
///
/// A referendum with no scripted tally is reported as unavailable.
#[derive(Default)]
pub struct NullSentimentProvider {
    tallies: Mutex<HashMap<RecordKey, Tally>>,
    unavailable: Mutex<HashSet<RecordKey>>,
    hang: AtomicBool,
    calls: AtomicUsize,
    rule: DecisionRule,
}

impl NullSentimentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `rule` for the tally-to-decision mapping.
    pub fn with_rule(rule: DecisionRule) -> Self {
        Self {
            rule,
            ..Self::default()
        }
    }

    pub fn set_tally(&self, key: RecordKey, tally: Tally) {
        self.tallies.lock().unwrap().insert(key, tally);
    }

    /// Fail queries for `key` until [`NullSentimentProvider::set_available`].
    pub fn set_unavailable(&self, key: RecordKey) {
        self.unavailable.lock().unwrap().insert(key);
    }

    pub fn set_available(&self, key: RecordKey) {
        self.unavailable.lock().unwrap().remove(&key);
    }

    /// Make every query block forever.
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// Number of `current_tally` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SentimentProvider for NullSentimentProvider {
    async fn current_tally(&self, key: RecordKey) -> Result<Tally, SentimentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.unavailable.lock().unwrap().contains(&key) {
            return Err(SentimentError::Unavailable(format!("{key} offline")));
        }
        self.tallies
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .ok_or_else(|| SentimentError::Unavailable(format!("no tally for {key}")))
    }

    fn decision_rule(&self) -> DecisionRule {
        self.rule
    }
}
