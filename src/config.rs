//! Configuration loading and validation.
//!
//! Settings are layered: built-in defaults, then an optional
//! `config.toml`, then command-line overrides applied by the binary.
//! Everything is fixed for the lifetime of the process.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Name of the per-user configuration directory under `$HOME`.
pub const CONF_DIR_NAME: &str = ".confann";

/// Errors raised while loading configuration, credentials, or secrets.
///
/// All of these are fatal: the process does not start.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML configuration could not be parsed.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// The credential record does not have the `identifier:hash` shape.
    #[error("credential record must contain exactly one ':' separator, found {fields} field(s)")]
    MalformedCredential {
        /// Number of colon-separated fields that were found.
        fields: usize,
    },

    /// The stored secret hash is not a valid PHC string.
    #[error("credential hash is not a valid PHC string: {0}")]
    InvalidHash(String),

    /// The recovery secret file was empty.
    #[error("recovery secret at {0} is empty")]
    EmptySecret(PathBuf),

    /// The home directory could not be determined.
    #[error("cannot determine home directory")]
    NoHomeDir,

    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat network connection and channel settings.
    pub irc: IrcConfig,

    /// Webhook listener settings.
    pub webhook: WebhookConfig,
}

/// IRC network settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IrcConfig {
    /// Hostname of the IRC server.
    pub server: String,

    /// TCP port of the IRC server.
    pub port: u16,

    /// Whether to wrap the connection in TLS.
    pub tls: bool,

    /// Nickname to register with.
    pub nick: String,

    /// Username sent in the `USER` command.
    pub user: String,

    /// Real name sent in the `USER` command.
    pub realname: String,

    /// Optional server password sent with `PASS`.
    pub server_password: Option<String>,

    /// Channel that receives join announcements.
    pub channel: String,

    /// Channels joined, in order, before the announcement channel.
    pub pre_join: Vec<String>,

    /// Nick of the account-recovery service that receives `identify`.
    pub recovery_service: String,

    /// Upper bound on dialing plus the TLS handshake, in seconds.
    pub connect_timeout_secs: u64,

    /// Message sent with `QUIT` on shutdown.
    pub quit_message: String,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            port: default_irc_port(),
            tls: true,
            nick: default_nick(),
            user: default_nick(),
            realname: default_nick(),
            server_password: None,
            channel: default_channel(),
            pre_join: default_pre_join(),
            recovery_service: default_recovery_service(),
            connect_timeout_secs: default_connect_timeout_secs(),
            quit_message: default_quit_message(),
        }
    }
}

impl IrcConfig {
    /// `host:port` string used in logs.
    pub fn server_string(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Every channel the bridge joins once connected, in join order.
    pub fn join_order(&self) -> Vec<String> {
        let mut channels = self.pre_join.clone();
        if !channels.contains(&self.channel) {
            channels.push(self.channel.clone());
        }
        channels
    }
}

/// Webhook listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Address to bind the HTTP listener on.
    pub bind_address: IpAddr,

    /// Port to bind the HTTP listener on.
    pub port: u16,

    /// The single route that accepts join notifications.
    pub path: String,

    /// Grace period for in-flight requests during shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: default_api_port(),
            path: default_path(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl WebhookConfig {
    /// Socket address the listener binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Shutdown grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

// Default value functions for serde

fn default_server() -> String {
    "tilde.chat".to_owned()
}
fn default_irc_port() -> u16 {
    6697
}
fn default_nick() -> String {
    "confann".to_owned()
}
fn default_channel() -> String {
    "#alrs".to_owned()
}
fn default_pre_join() -> Vec<String> {
    vec!["#bots".to_owned()]
}
fn default_recovery_service() -> String {
    "NickServ".to_owned()
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_quit_message() -> String {
    "confann shutting down".to_owned()
}
fn default_api_port() -> u16 {
    8080
}
fn default_path() -> String {
    "/".to_owned()
}
fn default_shutdown_grace_secs() -> u64 {
    1
}

impl Config {
    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a value is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.irc.server.trim().is_empty() {
            return Err(ConfigError::Invalid("irc.server is empty".to_owned()));
        }
        if self.irc.nick.trim().is_empty() {
            return Err(ConfigError::Invalid("irc.nick is empty".to_owned()));
        }
        for channel in self.irc.join_order() {
            if !is_channel_name(&channel) {
                return Err(ConfigError::Invalid(format!(
                    "{channel:?} is not a channel name"
                )));
            }
        }
        if !self.webhook.path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "webhook.path {:?} must start with '/'",
                self.webhook.path
            )));
        }
        Ok(())
    }
}

/// Whether `name` looks like an IRC channel (`#` or `&` prefix, no spaces).
pub fn is_channel_name(name: &str) -> bool {
    (name.starts_with('#') || name.starts_with('&'))
        && name.len() > 1
        && !name.contains([' ', ',', '\x07'])
}

/// Load configuration from a TOML file.
///
/// A missing file is not an error: defaults are returned instead.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file found, using defaults");
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_owned(),
                source,
            })
        }
    };
    let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })?;
    Ok(config)
}

/// Resolved on-disk locations used at startup.
#[derive(Debug, Clone)]
pub struct ConfPaths {
    /// Configuration directory root (`~/.confann`).
    pub root: PathBuf,
    /// `identifier:hash` credential record.
    pub passwd: PathBuf,
    /// Recovery service secret.
    pub recovery_secret: PathBuf,
    /// Optional TOML configuration.
    pub config_toml: PathBuf,
    /// Directory for rotated JSON logs.
    pub logs_dir: PathBuf,
}

impl ConfPaths {
    /// Lay out the standard file names under `root`.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            passwd: root.join("passwd"),
            recovery_secret: root.join("nickserv.secret"),
            config_toml: root.join("config.toml"),
            logs_dir: root.join("logs"),
            root,
        }
    }
}

/// Resolve the default config directory (`~/.confann/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let home = directories::BaseDirs::new().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.home_dir().join(CONF_DIR_NAME))
}

/// Resolve [`ConfPaths`] under the default config directory.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn conf_paths() -> Result<ConfPaths, ConfigError> {
    config_dir().map(ConfPaths::under)
}
