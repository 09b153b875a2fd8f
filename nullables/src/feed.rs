//! Nullable referendum feed: a fixed list of ongoing referenda.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use govproxy_governance::{FeedError, ReferendumFeed, ReferendumInfo};

#[derive(Default)]
pub struct NullReferendumFeed {
    ongoing: Mutex<Vec<ReferendumInfo>>,
    unavailable: AtomicBool,
    polls: AtomicUsize,
}

impl NullReferendumFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(referenda: impl IntoIterator<Item = ReferendumInfo>) -> Self {
        let feed = Self::new();
        for info in referenda {
            feed.push(info);
        }
        feed
    }

    /// Announce another ongoing referendum.
    pub fn push(&self, info: ReferendumInfo) {
        self.ongoing.lock().unwrap().push(info);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of times `ongoing` was called.
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl ReferendumFeed for NullReferendumFeed {
    async fn ongoing(&self) -> Result<Vec<ReferendumInfo>, FeedError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FeedError::Unavailable("null feed offline".into()));
        }
        Ok(self.ongoing.lock().unwrap().clone())
    }
}
