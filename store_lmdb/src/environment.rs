//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::meta::LmdbMetaStore;
use crate::referendum::LmdbReferendumStore;
use crate::LmdbError;

/// Default maximum number of named databases.
pub const DEFAULT_MAX_DBS: u32 = 8;

/// Default memory map size (1 GiB). Referendum records are small; this is
/// effectively unbounded for the voter's workload.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    pub(crate) referenda_db: Database<Bytes, Bytes>,
    pub(crate) open_index_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process for this path
        // and never concurrently from another `Env` in the same process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let referenda_db = env.create_database(&mut wtxn, Some("referenda"))?;
        let open_index_db = env.create_database(&mut wtxn, Some("open_referenda"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env: Arc::new(env),
            referenda_db,
            open_index_db,
            meta_db,
        })
    }

    /// Open with the default database count and map size.
    pub fn open_default(path: &Path) -> Result<Self, LmdbError> {
        Self::open(path, DEFAULT_MAX_DBS, DEFAULT_MAP_SIZE)
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn referendum_store(&self) -> LmdbReferendumStore {
        LmdbReferendumStore {
            env: Arc::clone(&self.env),
            referenda_db: self.referenda_db,
            open_index_db: self.open_index_db,
        }
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }

    /// Flush all buffers to disk.
    pub fn force_sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync()?;
        Ok(())
    }
}
