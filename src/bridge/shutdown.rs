//! Shutdown requests and interrupt forwarding.

use tokio::sync::mpsc;
use tracing::debug;

/// Why the bridge is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// An interrupt or termination signal arrived.
    Interrupt,
    /// The chat session disconnected.
    Disconnected,
    /// The webhook listener failed.
    ListenerFailed,
    /// Something else asked for a shutdown.
    Requested,
}

/// Cloneable, non-blocking way to request a shutdown.
///
/// Backed by a single-slot channel: the first request is kept and later
/// ones are dropped without blocking or panicking.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: mpsc::Sender<ShutdownReason>,
}

impl ShutdownTrigger {
    /// Create a trigger and the receiver the bridge waits on.
    pub fn channel() -> (Self, mpsc::Receiver<ShutdownReason>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Request a shutdown. Returns `false` if one was already pending.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        match self.tx.try_send(reason) {
            Ok(()) => true,
            Err(e) => {
                debug!(?reason, error = %e, "shutdown already requested");
                false
            }
        }
    }
}

/// Forward SIGINT (and SIGTERM on unix) into `interrupts` until the
/// receiver goes away.
///
/// On unix the handlers are installed before this returns, so a signal
/// raised afterwards is never lost to the default disposition.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
#[cfg(unix)]
pub fn spawn_signal_forwarder(
    interrupts: mpsc::Sender<()>,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;
    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = int.recv() => tracing::info!("received SIGINT"),
                Some(()) = term.recv() => tracing::info!("received SIGTERM"),
                else => return,
            }
            if interrupts.send(()).await.is_err() {
                return;
            }
        }
    }))
}

/// Forward ctrl-c into `interrupts` until the receiver goes away.
///
/// # Errors
///
/// Never fails on this platform; the signature matches unix.
#[cfg(not(unix))]
pub fn spawn_signal_forwarder(
    interrupts: mpsc::Sender<()>,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
                return;
            }
            if interrupts.send(()).await.is_err() {
                return;
            }
        }
    }))
}
