//! LMDB storage backend for the governance proxy voter.
//!
//! Implements the storage traits from `govproxy-store` using the `heed` LMDB
//! bindings. Each logical store maps to one or more LMDB databases within a
//! single environment.

pub mod environment;
pub mod error;
pub mod integrity;
pub mod meta;
pub mod migration;
pub mod referendum;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use meta::LmdbMetaStore;
pub use migration::{Migrator, SchemaState, CURRENT_SCHEMA_VERSION};
pub use referendum::LmdbReferendumStore;
