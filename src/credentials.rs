//! Credential loading: the webhook `identifier:hash` record and the
//! recovery-service secret.
//!
//! Both files are read once at startup. Rotating either requires a restart.

use std::fs;
use std::path::Path;

use argon2::password_hash::PasswordHash;
use tracing::{debug, warn};

use crate::auth;
use crate::config::ConfigError;

/// The single webhook credential: an identifier and a PHC or bcrypt hash.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    identifier: String,
    secret_hash: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("identifier", &self.identifier)
            .field("secret_hash", &"[REDACTED]")
            .finish()
    }
}

impl Credential {
    /// Identifier the caller must present.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Stored one-way hash of the secret.
    pub fn secret_hash(&self) -> &str {
        &self.secret_hash
    }

    /// Check a candidate identifier and secret against this record.
    pub fn verify(&self, candidate_identifier: &str, candidate_secret: &str) -> bool {
        auth::verify(candidate_identifier, candidate_secret, self)
    }
}

/// Parse an `identifier:hash` record.
///
/// A single trailing newline is stripped. The record must split into
/// exactly two colon-separated fields. The hash is either a PHC string or a
/// modular-crypt bcrypt hash (`$2a$`, `$2b$`, `$2y$`).
///
/// # Errors
///
/// Returns [`ConfigError::MalformedCredential`] on the wrong field count and
/// [`ConfigError::InvalidHash`] when the hash cannot be parsed.
pub fn parse_passwd(data: &str) -> Result<Credential, ConfigError> {
    let record = data.strip_suffix('\n').unwrap_or(data);
    let fields: Vec<&str> = record.split(':').collect();
    let [identifier, secret_hash] = fields.as_slice() else {
        return Err(ConfigError::MalformedCredential {
            fields: if record.is_empty() { 0 } else { fields.len() },
        });
    };
    if identifier.is_empty() {
        return Err(ConfigError::Invalid(
            "credential identifier is empty".to_owned(),
        ));
    }
    if auth::is_bcrypt(secret_hash) {
        secret_hash
            .parse::<bcrypt::HashParts>()
            .map_err(|e| ConfigError::InvalidHash(e.to_string()))?;
    } else {
        PasswordHash::new(secret_hash).map_err(|e| ConfigError::InvalidHash(e.to_string()))?;
    }

    Ok(Credential {
        identifier: (*identifier).to_owned(),
        secret_hash: (*secret_hash).to_owned(),
    })
}

/// Load the credential record from `path`.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, or malformed.
pub fn load_passwd(path: &Path) -> Result<Credential, ConfigError> {
    let data = read_private(path)?;
    let credential = parse_passwd(&data)?;
    debug!(path = %path.display(), identifier = %credential.identifier, "credential loaded");
    Ok(credential)
}

/// Secret sent to the account-recovery service after registration.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoverySecret(String);

impl std::fmt::Debug for RecoverySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RecoverySecret").field(&"[REDACTED]").finish()
    }
}

impl RecoverySecret {
    /// Wrap a secret value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the value is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ConfigError::Invalid("recovery secret is empty".to_owned()));
        }
        Ok(Self(value))
    }

    /// The raw secret.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

/// Load the recovery secret from `path`, trimming one trailing newline.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is empty.
pub fn load_recovery_secret(path: &Path) -> Result<RecoverySecret, ConfigError> {
    let data = read_private(path)?;
    let secret = data.strip_suffix('\n').unwrap_or(&data);
    if secret.is_empty() {
        return Err(ConfigError::EmptySecret(path.to_owned()));
    }
    Ok(RecoverySecret(secret.to_owned()))
}

fn read_private(path: &Path) -> Result<String, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    warn_if_shared(path);
    Ok(data)
}

/// Warn when a secret file is readable by group or others.
#[cfg(unix)]
fn warn_if_shared(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = fs::metadata(path) {
        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            warn!(
                path = %path.display(),
                mode = format!("{mode:o}"),
                "secret file is accessible by other users; 0600 is recommended"
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_if_shared(_path: &Path) {}
