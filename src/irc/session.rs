//! Chat session wiring.
//!
//! Registers the bot's four handlers on the connection's event stream
//! before dialing, then translates those events into bridge signals.
//! Handlers only ever do non-blocking channel sends.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::client::{self, IrcHandle};
use super::{ChatSink, IrcEvent, SessionError};
use crate::config::{is_channel_name, IrcConfig};
use crate::credentials::RecoverySecret;

/// Reply to the `!botlist` command.
pub const BOTLIST_REPLY: &str =
    r#"confann announces conference joins. It answers to "!botlist", and "!botlist" alone."#;

/// Lifecycle signals delivered to the event bridge.
#[derive(Debug)]
pub struct SessionSignals {
    /// Fires when registration completes.
    pub connected: mpsc::UnboundedReceiver<()>,
    /// Fires at most once, when the connection ends.
    pub disconnected: mpsc::UnboundedReceiver<()>,
}

/// Sending half of [`SessionSignals`].
#[derive(Debug)]
pub struct SignalSenders {
    connected: mpsc::UnboundedSender<()>,
    disconnected: OnceSignal,
}

impl SignalSenders {
    /// Report that registration completed.
    pub fn connected(&self) {
        let _ = self.connected.send(());
    }

    /// Report the end of the connection. Returns `true` only the first time.
    pub fn disconnected(&self) -> bool {
        self.disconnected.fire()
    }
}

/// Create a linked pair of signal senders and receivers.
pub fn signal_channel() -> (SignalSenders, SessionSignals) {
    let (connected_tx, connected_rx) = mpsc::unbounded_channel();
    let (disconnected_tx, disconnected_rx) = mpsc::unbounded_channel();
    (
        SignalSenders {
            connected: connected_tx,
            disconnected: OnceSignal::new(disconnected_tx),
        },
        SessionSignals {
            connected: connected_rx,
            disconnected: disconnected_rx,
        },
    )
}

/// A signal that is delivered at most once no matter how often it fires.
#[derive(Debug)]
pub struct OnceSignal {
    fired: AtomicBool,
    tx: mpsc::UnboundedSender<()>,
}

impl OnceSignal {
    /// Wrap a sender.
    pub fn new(tx: mpsc::UnboundedSender<()>) -> Self {
        Self {
            fired: AtomicBool::new(false),
            tx,
        }
    }

    /// Deliver the signal. Returns `true` only for the first call.
    pub fn fire(&self) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let _ = self.tx.send(());
        true
    }
}

/// A connected chat session.
#[derive(Debug, Clone)]
pub struct ChatSession {
    handle: IrcHandle,
}

impl ChatSession {
    /// Register handlers, dial the server, and start dispatching events.
    ///
    /// # Errors
    ///
    /// Returns an error when the initial connection fails. There is no retry.
    pub async fn connect(
        config: &IrcConfig,
        recovery_secret: RecoverySecret,
    ) -> Result<(Self, SessionSignals), SessionError> {
        let (senders, signals) = signal_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (handle_tx, handle_rx) = tokio::sync::oneshot::channel();

        let handlers = Handlers {
            signals: senders,
            recovery_service: config.recovery_service.clone(),
            recovery_secret,
            identified: false,
        };
        tokio::spawn(async move {
            // Events queue up until the dial finishes and the handle arrives.
            if let Ok(handle) = handle_rx.await {
                dispatch_events(event_rx, handle, handlers).await;
            }
        });

        info!(server = %config.server_string(), "DIAL");
        let handle = client::connect(config, event_tx).await?;
        let _ = handle_tx.send(handle.clone());

        Ok((Self { handle }, signals))
    }

    /// The underlying connection handle.
    pub fn handle(&self) -> &IrcHandle {
        &self.handle
    }
}

impl ChatSink for ChatSession {
    fn join(&self, channel: &str) -> Result<(), SessionError> {
        info!(channel, "joining channel");
        self.handle.join(channel)
    }

    fn notice(&self, target: &str, text: &str) -> Result<(), SessionError> {
        self.handle.notice(target, text)
    }

    fn close(&self) {
        info!("closing IRC connection");
        self.handle.quit();
    }
}

/// Handler state for one connection.
struct Handlers {
    signals: SignalSenders,
    recovery_service: String,
    recovery_secret: RecoverySecret,
    identified: bool,
}

/// Route adapter events to their handlers until the stream ends.
async fn dispatch_events(
    mut events: mpsc::UnboundedReceiver<IrcEvent>,
    handle: IrcHandle,
    mut handlers: Handlers,
) {
    while let Some(event) = events.recv().await {
        match event {
            IrcEvent::Registered => handlers.on_registered(&handle),
            IrcEvent::Connected => handlers.on_connected(),
            IrcEvent::Disconnected => handlers.on_disconnected(),
            IrcEvent::Privmsg {
                source,
                target,
                text,
            } => on_privmsg(&handle, source.as_deref(), &target, &text),
        }
    }
    debug!("irc event stream ended");
}

impl Handlers {
    /// Identify with the recovery service, once per connection.
    fn on_registered(&mut self, handle: &IrcHandle) {
        if self.identified {
            return;
        }
        self.identified = true;
        info!(service = %self.recovery_service, "received REGISTER, identifying");
        let command = format!("identify {}", self.recovery_secret.expose());
        if let Err(e) = handle.privmsg(&self.recovery_service, &command) {
            warn!(error = %e, "failed to send identify");
        }
    }

    fn on_connected(&self) {
        info!("irc connected");
        self.signals.connected();
    }

    fn on_disconnected(&self) {
        if self.signals.disconnected() {
            info!("irc disconnected");
        } else {
            debug!("duplicate disconnect ignored");
        }
    }
}

/// Answer `!botlist`, and only `!botlist`.
fn on_privmsg(handle: &IrcHandle, source: Option<&str>, target: &str, text: &str) {
    if text != "!botlist" {
        return;
    }
    let reply_to = if is_channel_name(target) {
        target
    } else if let Some(nick) = source {
        nick
    } else {
        return;
    };
    info!(channel = reply_to, from = ?source, "!botlist");
    if let Err(e) = handle.privmsg(reply_to, BOTLIST_REPLY) {
        warn!(error = %e, "failed to answer !botlist");
    }
}
