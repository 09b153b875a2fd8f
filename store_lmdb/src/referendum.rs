//! LMDB implementation of ReferendumStore.
//!
//! Records live in `referenda`, keyed by [`RecordKey::to_bytes`] with a
//! bincode value. `open_referenda` holds one empty-valued entry per record
//! whose `closed_at` is unset, so the scheduler's per-tick scan never walks
//! the closed history. Both databases are updated in the same write
//! transaction.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn};

use govproxy_store::{ReferendumRecord, ReferendumStore, StoreError};
use govproxy_types::{Origin, RecordKey, Timestamp};

use crate::LmdbError;

pub struct LmdbReferendumStore {
    pub(crate) env: Arc<Env>,
    pub(crate) referenda_db: Database<Bytes, Bytes>,
    pub(crate) open_index_db: Database<Bytes, Bytes>,
}

impl LmdbReferendumStore {
    fn read(
        &self,
        rtxn: &RoTxn<'_>,
        key: &RecordKey,
    ) -> Result<Option<ReferendumRecord>, LmdbError> {
        match self.referenda_db.get(rtxn, &key.to_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }
}

impl ReferendumStore for LmdbReferendumStore {
    fn get_or_create(
        &self,
        key: RecordKey,
        origin: Origin,
        submitted_at: Timestamp,
    ) -> Result<ReferendumRecord, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let kb = key.to_bytes();

        if let Some(bytes) = self.referenda_db.get(&wtxn, &kb).map_err(LmdbError::from)? {
            let existing: ReferendumRecord =
                bincode::deserialize(bytes).map_err(LmdbError::from)?;
            return Ok(existing);
        }

        let record = ReferendumRecord::new(key, origin, submitted_at);
        let value = bincode::serialize(&record).map_err(LmdbError::from)?;
        self.referenda_db
            .put(&mut wtxn, &kb, &value)
            .map_err(LmdbError::from)?;
        self.open_index_db
            .put(&mut wtxn, &kb, &[])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;

        tracing::debug!(%key, %origin, "created referendum record");
        Ok(record)
    }

    fn get(&self, key: &RecordKey) -> Result<Option<ReferendumRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.read(&rtxn, key)?)
    }

    fn save(&self, record: &ReferendumRecord) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let kb = record.key.to_bytes();

        let stored: ReferendumRecord = match self
            .referenda_db
            .get(&wtxn, &kb)
            .map_err(LmdbError::from)?
        {
            Some(bytes) => bincode::deserialize(bytes).map_err(LmdbError::from)?,
            None => return Err(StoreError::NotFound(record.key.to_string())),
        };
        stored.check_successor(record)?;

        let value = bincode::serialize(record).map_err(LmdbError::from)?;
        self.referenda_db
            .put(&mut wtxn, &kb, &value)
            .map_err(LmdbError::from)?;
        if record.is_closed() {
            self.open_index_db
                .delete(&mut wtxn, &kb)
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn list_open(&self) -> Result<Vec<ReferendumRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.open_index_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for entry in iter {
            let (kb, _) = entry.map_err(LmdbError::from)?;
            let key = RecordKey::from_bytes(kb).ok_or_else(|| {
                StoreError::Corruption(format!("malformed open-index key ({} bytes)", kb.len()))
            })?;
            match self.read(&rtxn, &key)? {
                Some(record) if !record.is_closed() => results.push(record),
                Some(_) => {
                    tracing::warn!(%key, "open index points at a closed record");
                }
                None => {
                    return Err(StoreError::Corruption(format!(
                        "open index points at missing record {key}"
                    )))
                }
            }
        }
        Ok(results)
    }

    fn list_all(&self) -> Result<Vec<ReferendumRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.referenda_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for entry in iter {
            let (_, val) = entry.map_err(LmdbError::from)?;
            let record: ReferendumRecord =
                bincode::deserialize(val).map_err(LmdbError::from)?;
            results.push(record);
        }
        Ok(results)
    }
}
