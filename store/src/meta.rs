//! Metadata storage trait.

use crate::StoreError;

/// Key-value bookkeeping that doesn't belong to any referendum record
/// (schema version, last completed tick, ...).
pub trait MetaStore {
    /// Store a metadata value, replacing any previous one.
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Retrieve a metadata value, `None` if it was never written.
    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Current database schema version; `0` for a fresh database.
    fn schema_version(&self) -> Result<u32, StoreError> {
        match self.get_meta(SCHEMA_VERSION_KEY)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::Corruption("schema_version has unexpected byte length".into())
                })?;
                Ok(u32::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    /// Record the database schema version.
    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        self.put_meta(SCHEMA_VERSION_KEY, &version.to_le_bytes())
    }
}

/// Meta key holding the little-endian `u32` schema version.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Meta key holding the big-endian `u64` seconds of the last completed tick.
pub const LAST_TICK_KEY: &str = "last_tick";
