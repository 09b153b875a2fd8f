//! LMDB implementation of MetaStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use govproxy_store::MetaStore;
use govproxy_store::StoreError;

use crate::LmdbError;

pub struct LmdbMetaStore {
    pub(crate) env: Arc<Env>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl MetaStore for LmdbMetaStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.meta_db
            .put(&mut wtxn, key.as_bytes(), value)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .meta_db
            .get(&rtxn, key.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(val.map(|bytes| bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govproxy_store::meta::LAST_TICK_KEY;

    #[test]
    fn meta_roundtrip_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let env = crate::LmdbEnvironment::open_default(dir.path()).unwrap();
        let meta = env.meta_store();

        assert_eq!(meta.get_meta(LAST_TICK_KEY).unwrap(), None);
        meta.put_meta(LAST_TICK_KEY, &7u64.to_be_bytes()).unwrap();
        assert_eq!(
            meta.get_meta(LAST_TICK_KEY).unwrap(),
            Some(7u64.to_be_bytes().to_vec())
        );
    }

    #[test]
    fn schema_version_defaults_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let env = crate::LmdbEnvironment::open_default(dir.path()).unwrap();
        let meta = env.meta_store();

        assert_eq!(meta.schema_version().unwrap(), 0);
        meta.set_schema_version(3).unwrap();
        assert_eq!(meta.schema_version().unwrap(), 3);
    }

    #[test]
    fn malformed_schema_version_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let env = crate::LmdbEnvironment::open_default(dir.path()).unwrap();
        let meta = env.meta_store();

        meta.put_meta(govproxy_store::meta::SCHEMA_VERSION_KEY, &[1, 2])
            .unwrap();
        assert!(matches!(
            meta.schema_version(),
            Err(StoreError::Corruption(_))
        ));
    }
}
