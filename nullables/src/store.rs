//! Nullable store: thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use govproxy_store::{MetaStore, ReferendumRecord, ReferendumStore, StoreError};
use govproxy_types::{Origin, RecordKey, Timestamp};

/// An in-memory referendum store for testing.
///
/// Applies the same successor check as the LMDB backend, and can be told to
/// start failing saves to exercise persistence-error paths.
pub struct NullReferendumStore {
    records: Mutex<BTreeMap<RecordKey, ReferendumRecord>>,
    /// Saves still allowed to succeed; negative means unlimited.
    save_allowance: AtomicI64,
    saves: AtomicUsize,
}

impl NullReferendumStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            save_allowance: AtomicI64::new(-1),
            saves: AtomicUsize::new(0),
        }
    }

    /// Let the next `n` saves succeed, then fail every save after them.
    pub fn fail_saves_after(&self, n: i64) {
        self.save_allowance.store(n, Ordering::SeqCst);
    }

    /// Make saves succeed again.
    pub fn heal(&self) {
        self.save_allowance.store(-1, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NullReferendumStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferendumStore for NullReferendumStore {
    fn get_or_create(
        &self,
        key: RecordKey,
        origin: Origin,
        submitted_at: Timestamp,
    ) -> Result<ReferendumRecord, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .entry(key)
            .or_insert_with(|| ReferendumRecord::new(key, origin, submitted_at))
            .clone())
    }

    fn get(&self, key: &RecordKey) -> Result<Option<ReferendumRecord>, StoreError> {
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    fn save(&self, record: &ReferendumRecord) -> Result<(), StoreError> {
        let allowance = self.save_allowance.load(Ordering::SeqCst);
        if allowance == 0 {
            return Err(StoreError::Backend("null store refusing writes".into()));
        }

        let mut records = self.records.lock().unwrap();
        let stored = records
            .get(&record.key)
            .ok_or_else(|| StoreError::NotFound(record.key.to_string()))?;
        stored.check_successor(record)?;
        records.insert(record.key, record.clone());

        if allowance > 0 {
            self.save_allowance.fetch_sub(1, Ordering::SeqCst);
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn list_open(&self) -> Result<Vec<ReferendumRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| !r.is_closed())
            .cloned()
            .collect())
    }

    fn list_all(&self) -> Result<Vec<ReferendumRecord>, StoreError> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }
}

/// An in-memory metadata store for testing.
#[derive(Default)]
pub struct NullMetaStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl NullMetaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetaStore for NullMetaStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govproxy_store::RecordPhase;
    use govproxy_types::{Network, ReferendumId};

    fn key() -> RecordKey {
        RecordKey::new(Network::Polkadot, ReferendumId::new(3))
    }

    #[test]
    fn get_or_create_keeps_existing_fields() {
        let store = NullReferendumStore::new();
        store
            .get_or_create(key(), Origin::Root, Timestamp::new(1))
            .unwrap();
        let again = store
            .get_or_create(key(), Origin::BigTipper, Timestamp::new(2))
            .unwrap();
        assert_eq!(again.origin, Origin::Root);
        assert_eq!(again.submitted_at, Timestamp::new(1));
    }

    #[test]
    fn save_allowance_is_enforced() {
        let store = NullReferendumStore::new();
        let mut record = store
            .get_or_create(key(), Origin::Root, Timestamp::new(1))
            .unwrap();
        store.fail_saves_after(1);

        record.advance(RecordPhase::AwaitingFirstWindow, Timestamp::new(2));
        store.save(&record).unwrap();
        assert!(matches!(store.save(&record), Err(StoreError::Backend(_))));

        store.heal();
        store.save(&record).unwrap();
        assert_eq!(store.saves(), 2);
    }

    #[test]
    fn meta_store_roundtrip() {
        let meta = NullMetaStore::new();
        assert_eq!(meta.schema_version().unwrap(), 0);
        meta.set_schema_version(1).unwrap();
        assert_eq!(meta.schema_version().unwrap(), 1);
    }
}
