//! Record store schema versioning.
//!
//! The meta store holds the layout version of the bincode values in
//! `referenda`. A fresh store is stamped with [`CURRENT_SCHEMA_VERSION`]. A
//! store stamped by a newer voter is refused, because its records may not
//! decode and a half-read record could lead to a second vote.

use govproxy_store::MetaStore;

use crate::LmdbError;

/// Layout of [`ReferendumRecord`](govproxy_store::ReferendumRecord) this
/// build reads and writes.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// What [`Migrator::run`] found before it returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaState {
    /// No version stored; the store was just created.
    Fresh,
    /// Already at [`CURRENT_SCHEMA_VERSION`].
    Current,
}

/// Checks and stamps the schema version on startup.
pub struct Migrator;

impl Migrator {
    pub fn run(meta: &impl MetaStore) -> Result<SchemaState, LmdbError> {
        let stored = meta
            .schema_version()
            .map_err(|e| LmdbError::Schema(e.to_string()))?;

        let state = match stored {
            0 => {
                meta.set_schema_version(CURRENT_SCHEMA_VERSION)
                    .map_err(|e| LmdbError::Schema(e.to_string()))?;
                SchemaState::Fresh
            }
            CURRENT_SCHEMA_VERSION => SchemaState::Current,
            newer if newer > CURRENT_SCHEMA_VERSION => {
                return Err(LmdbError::Schema(format!(
                    "record store uses schema v{newer}, this voter reads up to v{CURRENT_SCHEMA_VERSION}"
                )));
            }
            older => {
                return Err(LmdbError::Schema(format!(
                    "no upgrade path from schema v{older} to v{CURRENT_SCHEMA_VERSION}"
                )));
            }
        };

        tracing::info!(version = CURRENT_SCHEMA_VERSION, ?state, "record store schema ready");
        Ok(state)
    }
}
