//! Structured logging setup using `tracing-subscriber` and `tracing-appender`.
//!
//! `start` logs JSON to a daily-rotated file and readable lines to stderr.
//! `start --no-log-file`, `check` and `hash-passwd` use stderr only.
//! `RUST_LOG` overrides [`DEFAULT_FILTER`] in both cases.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// File name prefix for rotated relay logs.
pub const LOG_FILE_PREFIX: &str = "confann.log";

/// Filter used when `RUST_LOG` is unset. TLS handshake chatter from rustls
/// is held back to warnings so join notices stay readable.
pub const DEFAULT_FILTER: &str = "info,rustls=warn";

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSink<'a> {
    /// Human-readable stderr only.
    Stderr,
    /// JSON into `{logs_dir}/confann.log.YYYY-MM-DD` plus stderr.
    File {
        /// Directory holding the rotated files; created if missing.
        logs_dir: &'a Path,
    },
}

/// Keeps the file writer flushing; drop it only at process exit.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard").finish_non_exhaustive()
    }
}

/// Install the global subscriber for `sink`.
///
/// Returns a guard for [`LogSink::File`] and `None` for [`LogSink::Stderr`].
/// A stderr install over an existing subscriber is a no-op so the one-shot
/// subcommands never fail on logging.
///
/// # Errors
///
/// For [`LogSink::File`], returns an error if the logs directory cannot be
/// created or a global subscriber is already installed.
pub fn init(sink: LogSink<'_>) -> anyhow::Result<Option<LoggingGuard>> {
    match sink {
        LogSink::Stderr => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(std::io::stderr)
                .try_init();
            Ok(None)
        }
        LogSink::File { logs_dir } => init_file(logs_dir).map(Some),
    }
}

fn init_file(logs_dir: &Path) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create logs directory {}", logs_dir.display()))?;

    let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(LoggingGuard { _guard: guard })
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
