//! Stop signal shared by the scheduler, the engine, and the RPC server.
//!
//! The flag is a `tokio::sync::watch` channel rather than a one-shot event,
//! so a tick that is already running can keep checking it: records it has
//! not started yet are skipped once the flag is set, while evaluations in
//! progress run to their last save.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;

/// Owner of the node's stop flag. Clones share the same flag.
#[derive(Clone)]
pub struct ShutdownController {
    flag: Arc<watch::Sender<bool>>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    /// A receiver that reads `true` once stopping has been requested.
    ///
    /// Receivers taken after the request see it immediately.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.flag.subscribe()
    }

    /// Request a stop. Idempotent.
    pub fn shutdown(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.flag.borrow()
    }

    /// Block until SIGINT or SIGTERM arrives, then request a stop.
    pub async fn wait_for_signal(&self) {
        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cannot listen for SIGTERM, SIGINT only");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        let received = tokio::select! {
            _ = signal::ctrl_c() => "SIGINT",
            _ = terminate => "SIGTERM",
        };
        tracing::info!(signal = received, "stop requested");
        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once `rx` reads `true`, or when its controller is dropped.
pub async fn stopped(rx: &mut watch::Receiver<bool>) {
    loop {
        let stopping = *rx.borrow_and_update();
        if stopping || rx.changed().await.is_err() {
            return;
        }
    }
}
