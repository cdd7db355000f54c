//! IRC chat session: wire codec, connection adapter, and session wiring.
//!
//! [`client`] owns the socket and turns protocol lines into [`IrcEvent`]s.
//! [`session`] registers the bot's handlers on those events and forwards
//! lifecycle signals to the event bridge.

pub mod client;
pub mod message;
pub mod session;

pub use client::IrcHandle;
pub use message::Message;
pub use session::{ChatSession, SessionSignals};

/// Errors from the chat session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The initial dial or TLS handshake failed.
    #[error("failed to connect to {server}: {source}")]
    Connect {
        /// `host:port` that was dialed.
        server: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The initial dial did not finish in time.
    #[error("timed out connecting to {0}")]
    ConnectTimeout(String),

    /// The server name is not valid for TLS.
    #[error("invalid TLS server name {0:?}")]
    InvalidServerName(String),

    /// The session is closed and cannot send.
    #[error("chat session is closed")]
    Closed,
}

/// Events produced by the connection adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcEvent {
    /// The socket is up and `NICK`/`USER` have been sent.
    Registered,
    /// The server accepted registration (`001`).
    Connected,
    /// A `PRIVMSG` arrived.
    Privmsg {
        /// Nick of the sender, if the prefix carried one.
        source: Option<String>,
        /// Channel or nick the message was addressed to.
        target: String,
        /// Message body.
        text: String,
    },
    /// The connection ended.
    Disconnected,
}

/// Outbound operations the bridge and webhook need from a chat session.
///
/// Every method only enqueues work and never waits on the network, so it
/// is safe to call from any task.
pub trait ChatSink: Send + Sync {
    /// Join `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] once the session has shut down.
    fn join(&self, channel: &str) -> Result<(), SessionError>;

    /// Send a `NOTICE` to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] once the session has shut down.
    fn notice(&self, target: &str, text: &str) -> Result<(), SessionError>;

    /// Close the connection. Calling more than once has no further effect.
    fn close(&self);
}
