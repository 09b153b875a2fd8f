//! Axum-based RPC server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use prometheus::Registry;
use tokio::net::TcpListener;

use govproxy_governance::Clock;

use crate::control::RecordControl;
use crate::error::RpcError;
use crate::handlers;

/// Shared state behind every route.
pub struct RpcState<C> {
    pub control: Arc<C>,
    pub clock: Arc<dyn Clock>,
    /// Registry rendered at `/metrics`.
    pub registry: Registry,
}

/// Build the operator router.
pub fn router<C: RecordControl>(state: Arc<RpcState<C>>) -> Router {
    Router::new()
        .route("/records", get(handlers::list_records::<C>))
        .route("/records/:network/:id", get(handlers::get_record::<C>))
        .route("/records/:network/:id/close", post(handlers::close_record::<C>))
        .route("/metrics", get(handlers::metrics::<C>))
        .with_state(state)
}

/// The operator API on a bound socket.
pub struct RpcServer<C> {
    listener: TcpListener,
    state: Arc<RpcState<C>>,
}

impl<C: RecordControl> RpcServer<C> {
    /// Bind `0.0.0.0:{port}`; port 0 picks a free one.
    pub async fn bind(port: u16, state: Arc<RpcState<C>>) -> Result<Self, RpcError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| RpcError::Server(format!("bind port {port}: {e}")))?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RpcError> {
        self.listener
            .local_addr()
            .map_err(|e| RpcError::Server(e.to_string()))
    }

    /// Serve until `stop` resolves, then finish in-flight requests.
    pub async fn serve<F>(self, stop: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state);
        axum::serve(self.listener, app)
            .with_graceful_shutdown(stop)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}
