//! What the RPC layer needs from the engine.

use std::future::Future;

use govproxy_governance::{DecisionEngine, GovernanceError, SentimentProvider, VoteSubmitter};
use govproxy_store::{ReferendumRecord, ReferendumStore, StoreError};
use govproxy_types::{RecordKey, Timestamp};

/// Read access to records plus the operator's forced close.
pub trait RecordControl: Send + Sync + 'static {
    /// Every record in key order, or only the open ones.
    fn records(&self, open_only: bool) -> Result<Vec<ReferendumRecord>, StoreError>;

    fn record(&self, key: &RecordKey) -> Result<Option<ReferendumRecord>, StoreError>;

    fn force_close(
        &self,
        key: RecordKey,
        note: String,
        now: Timestamp,
    ) -> impl Future<Output = Result<ReferendumRecord, GovernanceError>> + Send;
}

impl<S, P, V> RecordControl for DecisionEngine<S, P, V>
where
    S: ReferendumStore + 'static,
    P: SentimentProvider + 'static,
    V: VoteSubmitter + 'static,
{
    fn records(&self, open_only: bool) -> Result<Vec<ReferendumRecord>, StoreError> {
        if open_only {
            self.store().list_open()
        } else {
            self.store().list_all()
        }
    }

    fn record(&self, key: &RecordKey) -> Result<Option<ReferendumRecord>, StoreError> {
        self.store().get(key)
    }

    fn force_close(
        &self,
        key: RecordKey,
        note: String,
        now: Timestamp,
    ) -> impl Future<Output = Result<ReferendumRecord, GovernanceError>> + Send {
        DecisionEngine::force_close(self, key, note, now)
    }
}
