//! Listener lifecycle: bind, serve on a background task, and stop within a
//! bounded grace period.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::ListenerError;

/// A running webhook listener.
#[derive(Debug)]
pub struct WebhookServer {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// How the listener stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Drained within the grace period.
    Graceful,
    /// Still busy when the grace period ran out; the task was aborted.
    Aborted,
}

/// Bind `addr` and serve `router` on a new task.
///
/// Binding happens on the task itself, so a port that is already taken is
/// reported on `errors` like any other runtime failure.
pub fn spawn(
    addr: SocketAddr,
    router: Router,
    errors: mpsc::Sender<ListenerError>,
) -> WebhookServer {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                let _ = errors.try_send(ListenerError::Bind { addr, source });
                return;
            }
        };
        serve(listener, router, shutdown_rx, errors).await;
    });
    WebhookServer {
        shutdown: Some(shutdown_tx),
        task,
    }
}

/// Serve `router` on an already bound listener.
pub fn spawn_on(
    listener: TcpListener,
    router: Router,
    errors: mpsc::Sender<ListenerError>,
) -> WebhookServer {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(serve(listener, router, shutdown_rx, errors));
    WebhookServer {
        shutdown: Some(shutdown_tx),
        task,
    }
}

async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: oneshot::Receiver<()>,
    errors: mpsc::Sender<ListenerError>,
) {
    match listener.local_addr() {
        Ok(addr) => info!(address = %addr, "webhook listening"),
        Err(e) => warn!(error = %e, "webhook listener has no local address"),
    }

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.await;
        })
        .await;

    if let Err(e) = result {
        error!(error = %e, "webhook server stopped");
        let _ = errors.try_send(ListenerError::Serve(e));
    }
}

impl WebhookServer {
    /// Stop accepting connections and wait up to `grace` for in-flight
    /// requests. Whatever is left after that is aborted.
    pub async fn shutdown(mut self, grace: Duration) -> StopOutcome {
        info!("shutting down HTTP server");
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(_) => {
                info!("HTTP server stopped");
                StopOutcome::Graceful
            }
            Err(_) => {
                warn!(
                    grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                    "HTTP server did not stop in time, aborting"
                );
                self.task.abort();
                StopOutcome::Aborted
            }
        }
    }

    /// Whether the serving task has already exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
