//! Request handling for the join-notification route.
//!
//! Checks run in a fixed order: authentication, method and path, body,
//! `CLID`, readiness. Only a request that passes all of them reaches the
//! chat session.
//!
//! A dialplan typically calls this with curl, passing the caller number as
//! `CLID=${CALLERID(num)}` and Basic-Auth credentials via `CURLOPT(userpwd)`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use tracing::{info, warn};

use super::WebhookError;
use crate::auth::BasicCredentials;
use crate::bridge::Readiness;
use crate::credentials::Credential;
use crate::irc::ChatSink;

/// Substituted when `CLID` is present but empty.
pub const ANONYMOUS_CALLER: &str = "<< anonymous caller >>";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Shared state injected into the handler.
#[derive(Clone)]
pub struct WebhookState {
    /// Stored webhook credential.
    pub credential: Arc<Credential>,
    /// Read side of the session readiness flag.
    pub readiness: Readiness,
    /// Where join notices are sent.
    pub chat: Arc<dyn ChatSink>,
    /// Announcement channel.
    pub channel: String,
    /// The only path that accepts notifications.
    pub path: String,
}

impl std::fmt::Debug for WebhookState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookState")
            .field("credential", &self.credential)
            .field("readiness", &self.readiness)
            .field("channel", &self.channel)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Build the listener's router. Every path and method reaches the handler
/// so authentication always runs first.
pub fn router(state: WebhookState) -> Router {
    Router::new().fallback(handle).with_state(state)
}

async fn handle(
    State(state): State<WebhookState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let result = relay_join(&state, &method, &uri, &headers, &body).await;
    if let Err(e) = &result {
        warn!(
            status = e.status().as_u16(),
            method = %method,
            path = %uri.path(),
            cause = %e,
            "webhook request rejected"
        );
    }
    result.map(|()| StatusCode::OK)
}

async fn relay_join(
    state: &WebhookState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), WebhookError> {
    authenticate(state, headers).await?;

    if *method != Method::POST || uri.path() != state.path {
        return Err(WebhookError::NotFound(format!("{method} {}", uri.path())));
    }

    let clid = caller_id(headers, body)?;
    info!(clid = %clid, "API: caller joined");

    if !state.readiness.is_ready() {
        return Err(WebhookError::NotReady);
    }

    let notice = join_notice(&clid);
    state
        .chat
        .notice(&state.channel, &notice)
        .map_err(|_| WebhookError::NotReady)
}

async fn authenticate(state: &WebhookState, headers: &HeaderMap) -> Result<(), WebhookError> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(BasicCredentials::from_header)
        .ok_or(WebhookError::Unauthorized)?;

    // Argon2 verification blocks; run it off the async workers.
    let credential = Arc::clone(&state.credential);
    let verified = tokio::task::spawn_blocking(move || {
        credential.verify(&presented.identifier, &presented.secret)
    })
    .await
    .unwrap_or(false);

    if verified {
        Ok(())
    } else {
        Err(WebhookError::Unauthorized)
    }
}

/// Extract the caller id from a form-encoded body.
///
/// # Errors
///
/// Returns [`WebhookError::RequestFormat`] for a non-form content type, an
/// undecodable body, or a missing `CLID` field.
pub fn caller_id(headers: &HeaderMap, body: &[u8]) -> Result<String, WebhookError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    if !mime.eq_ignore_ascii_case(FORM_CONTENT_TYPE) {
        return Err(WebhookError::RequestFormat(format!(
            "unsupported content type {content_type:?}"
        )));
    }

    let fields: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
        .map_err(|e| WebhookError::RequestFormat(format!("error parsing request form: {e}")))?;

    let clid = fields
        .into_iter()
        .find_map(|(key, value)| (key == "CLID").then_some(value))
        .ok_or_else(|| WebhookError::RequestFormat("insufficient form: no CLID".to_owned()))?;

    if clid.is_empty() {
        Ok(ANONYMOUS_CALLER.to_owned())
    } else {
        Ok(clid)
    }
}

/// Text of the notice announcing a caller.
pub fn join_notice(clid: &str) -> String {
    format!("{clid} joined the conference.")
}
