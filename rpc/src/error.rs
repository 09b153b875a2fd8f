//! RPC error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use govproxy_governance::GovernanceError;
use govproxy_store::StoreError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("record {0} is already closed")]
    AlreadyClosed(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("server error: {0}")]
    Server(String),
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RecordNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyClosed(_) => StatusCode::CONFLICT,
            Self::Store(_) | Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for RpcError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => RpcError::RecordNotFound(key),
            StoreError::RecordClosed(key) => RpcError::AlreadyClosed(key),
            other => RpcError::Store(other.to_string()),
        }
    }
}

impl From<GovernanceError> for RpcError {
    fn from(e: GovernanceError) -> Self {
        match e {
            GovernanceError::RecordNotFound(key) => RpcError::RecordNotFound(key),
            GovernanceError::AlreadyClosed(key) => RpcError::AlreadyClosed(key),
            GovernanceError::Store(e) => e.into(),
            other => RpcError::Server(other.to_string()),
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "rpc request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn governance_errors_map_to_client_statuses() {
        let e: RpcError = GovernanceError::RecordNotFound("kusama/#1".into()).into();
        assert_eq!(e.status(), StatusCode::NOT_FOUND);

        let e: RpcError = GovernanceError::AlreadyClosed("kusama/#1".into()).into();
        assert_eq!(e.status(), StatusCode::CONFLICT);

        let e: RpcError = GovernanceError::Store(StoreError::Backend("disk".into())).into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
