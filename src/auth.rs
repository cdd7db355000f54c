//! Webhook authentication.
//!
//! Callers present HTTP Basic credentials. The identifier is compared
//! verbatim and the secret is checked against the stored hash: Argon2 PHC
//! strings, or bcrypt for records produced by `htpasswd -B`.
//! Callers only ever learn pass or fail, never which half failed.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};

use crate::credentials::Credential;

/// Basic-Auth credentials extracted from an `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    /// Presented identifier.
    pub identifier: String,
    /// Presented secret.
    pub secret: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("identifier", &self.identifier)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl BasicCredentials {
    /// Parse an `Authorization` header value of the form `Basic <base64>`.
    ///
    /// The scheme is matched case-insensitively and the decoded payload is
    /// split on the first `:`. Returns `None` for anything else.
    pub fn from_header(value: &str) -> Option<Self> {
        let (scheme, encoded) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (identifier, secret) = decoded.split_once(':')?;
        Some(Self {
            identifier: identifier.to_owned(),
            secret: secret.to_owned(),
        })
    }
}

/// Verify a candidate identifier and secret against the stored credential.
///
/// The hash comparison runs even when the identifier does not match so
/// both failure causes cost the same.
pub fn verify(candidate_identifier: &str, candidate_secret: &str, credential: &Credential) -> bool {
    let identifier_ok = candidate_identifier == credential.identifier();
    let secret_ok = verify_secret(candidate_secret, credential.secret_hash());
    if !identifier_ok {
        debug!("webhook identifier mismatch");
    } else if !secret_ok {
        debug!("webhook secret mismatch");
    }
    identifier_ok && secret_ok
}

/// Whether a stored hash is in bcrypt's modular-crypt form.
pub fn is_bcrypt(stored_hash: &str) -> bool {
    ["$2a$", "$2b$", "$2y$"]
        .iter()
        .any(|prefix| stored_hash.starts_with(prefix))
}

fn verify_secret(candidate: &str, stored_hash: &str) -> bool {
    if is_bcrypt(stored_hash) {
        return match bcrypt::verify(candidate, stored_hash) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(error = %e, "stored bcrypt hash does not parse");
                false
            }
        };
    }
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "stored credential hash does not parse");
            return false;
        }
    };
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}

/// Hash a secret with Argon2id and a fresh random salt.
///
/// The result is a PHC string suitable for the credential file.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn hash_secret(secret: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(secret.as_bytes(), &salt)?;
    Ok(hash.to_string())
}
