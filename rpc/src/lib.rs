//! Operator HTTP surface for the governance proxy voter.
//!
//! Provides endpoints for:
//! - Listing referendum records (all, or only open ones)
//! - Inspecting a single record with its computed age
//! - Closing a record by hand
//! - Prometheus metrics exposition

pub mod control;
pub mod error;
pub mod handlers;
pub mod server;

pub use control::RecordControl;
pub use error::RpcError;
pub use server::{router, RpcServer, RpcState};
