//! Event bridge: the coordination loop between the chat session, the
//! webhook listener, and the operator.
//!
//! A single `tokio::select!` loop fans in session lifecycle signals,
//! interrupts, listener failures, and shutdown requests. It is the only
//! writer of the readiness flag and the only caller of `close`. Whichever
//! trigger fires first drives the one and only shutdown sequence.

pub mod readiness;
pub mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::irc::{ChatSink, SessionSignals};
use crate::webhook::server::StopOutcome;
use crate::webhook::{ListenerError, WebhookServer};

pub use readiness::{readiness, Readiness, ReadinessWriter};
pub use shutdown::{spawn_signal_forwarder, ShutdownReason, ShutdownTrigger};

/// Lifecycle of the chat session as seen by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// No connection.
    Disconnected,
    /// Dialed, waiting for registration to complete.
    Connecting,
    /// Registered and relaying.
    Connected,
    /// Shutdown sequence in progress.
    Disconnecting,
    /// Shutdown finished.
    Terminated,
}

/// Everything the bridge coordinates.
pub struct BridgeDeps {
    /// Outbound side of the chat session.
    pub chat: Arc<dyn ChatSink>,
    /// Write side of the readiness flag.
    pub readiness: ReadinessWriter,
    /// Channels to join on connect, in order.
    pub join_order: Vec<String>,
    /// Session lifecycle signals.
    pub signals: SessionSignals,
    /// One message per OS interrupt.
    pub interrupts: mpsc::Receiver<()>,
    /// Fatal errors from the webhook listener.
    pub listener_errors: mpsc::Receiver<ListenerError>,
    /// The running webhook listener.
    pub server: WebhookServer,
    /// How long the listener gets to drain on shutdown.
    pub shutdown_grace: Duration,
    /// Trigger used to enqueue shutdown requests.
    pub shutdown: ShutdownTrigger,
    /// Receiving end of [`BridgeDeps::shutdown`].
    pub shutdown_rx: mpsc::Receiver<ShutdownReason>,
}

impl std::fmt::Debug for BridgeDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeDeps")
            .field("join_order", &self.join_order)
            .field("shutdown_grace", &self.shutdown_grace)
            .finish_non_exhaustive()
    }
}

/// Outcome of a completed bridge run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// First shutdown trigger that was accepted.
    pub reason: ShutdownReason,
    /// How the webhook listener stopped.
    pub listener: StopOutcome,
    /// State the bridge ended in; always [`BridgeState::Terminated`].
    pub final_state: BridgeState,
}

/// Run the coordination loop until a shutdown completes.
pub async fn run_bridge(deps: BridgeDeps) -> ShutdownReport {
    let BridgeDeps {
        chat,
        readiness,
        join_order,
        mut signals,
        mut interrupts,
        mut listener_errors,
        server,
        shutdown_grace,
        shutdown,
        mut shutdown_rx,
    } = deps;

    let mut state = BridgeState::Connecting;
    info!(?state, "event bridge started");

    let reason = loop {
        // Pending shutdowns win, then disconnects, so nothing is joined or
        // marked ready once teardown has been requested.
        tokio::select! {
            biased;

            Some(reason) = shutdown_rx.recv() => {
                break reason;
            }
            Some(()) = signals.disconnected.recv() => {
                readiness.set(false);
                state = transition(state, BridgeState::Disconnected);
                shutdown.trigger(ShutdownReason::Disconnected);
            }
            Some(()) = signals.connected.recv() => {
                readiness.set(true);
                state = transition(state, BridgeState::Connected);
                // Network policy may require the pre-join channels first.
                for channel in &join_order {
                    if let Err(e) = chat.join(channel) {
                        warn!(channel = %channel, error = %e, "join failed");
                    }
                }
            }
            Some(()) = interrupts.recv() => {
                info!("** interrupt **");
                shutdown.trigger(ShutdownReason::Interrupt);
            }
            Some(e) = listener_errors.recv() => {
                error!(error = %e, "api server error");
                shutdown.trigger(ShutdownReason::ListenerFailed);
            }
        }
    };

    info!(?reason, "shutting down");
    state = transition(state, BridgeState::Disconnecting);
    readiness.set(false);
    chat.close();
    let listener = server.shutdown(shutdown_grace).await;
    state = transition(state, BridgeState::Terminated);

    ShutdownReport {
        reason,
        listener,
        final_state: state,
    }
}

fn transition(from: BridgeState, to: BridgeState) -> BridgeState {
    if from != to {
        debug!(?from, ?to, "bridge state");
    }
    to
}
