use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("policy error: {0}")]
    Policy(#[from] govproxy_governance::PolicyError),

    #[error("governance error: {0}")]
    Governance(#[from] govproxy_governance::GovernanceError),

    #[error("store error: {0}")]
    Store(#[from] govproxy_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] govproxy_store_lmdb::LmdbError),

    #[error("referendum feed error: {0}")]
    Feed(#[from] govproxy_governance::FeedError),

    #[error("database integrity check failed: {0}")]
    Integrity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RPC server error: {0}")]
    Rpc(String),

    #[error("node already started")]
    AlreadyStarted,
}
