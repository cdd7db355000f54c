//! Webhook listener: the single authenticated route the telephony dialplan
//! posts caller joins to.
//!
//! The listener runs on its own task and talks to the rest of the process
//! only through the readiness flag, the chat sink, and the error channel
//! handed to [`server::spawn`].

pub mod handler;
pub mod server;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub use handler::{router, WebhookState, ANONYMOUS_CALLER};
pub use server::WebhookServer;

/// Per-request failures. Each maps to a bare numeric status.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// Missing Basic-Auth, wrong identifier, or wrong secret.
    #[error("unauthorized")]
    Unauthorized,

    /// Wrong method or path.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed body or missing `CLID`.
    #[error("bad request: {0}")]
    RequestFormat(String),

    /// The chat session is not connected; the join is dropped.
    #[error("chat session not ready")]
    NotReady,
}

impl WebhookError {
    /// HTTP status for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RequestFormat(_) => StatusCode::BAD_REQUEST,
            Self::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, status.as_u16().to_string()).into_response()
    }
}

/// Fatal listener failures after startup. These trigger a shutdown.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: std::net::SocketAddr,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("webhook server failed: {0}")]
    Serve(#[source] std::io::Error),
}
