//! confann CLI entry point.
//!
//! Provides `start`, `check`, and `hash-passwd` subcommands for running the
//! relay, validating its files, or producing a credential record.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info};

use confann::auth;
use confann::bridge::{self, BridgeDeps, ShutdownReason, ShutdownTrigger};
use confann::config::{self, load_config, Config, ConfPaths};
use confann::credentials::{load_passwd, load_recovery_secret, Credential, RecoverySecret};
use confann::irc::{ChatSession, ChatSink};
use confann::logging::{self, LogSink};
use confann::webhook::{self, WebhookState};

/// confann: announce conference joins in an IRC channel.
#[derive(Parser)]
#[command(name = "confann", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Connect to IRC and serve the webhook until interrupted.
    Start(RunArgs),
    /// Load configuration and secrets, report, and exit without connecting.
    Check(RunArgs),
    /// Read a secret from stdin and print an `identifier:hash` record.
    HashPasswd {
        /// Identifier the webhook caller will present.
        identifier: String,
    },
}

/// Options shared by `start` and `check`.
#[derive(Args, Debug)]
struct RunArgs {
    /// Channel to announce joins in.
    #[arg(long)]
    channel: Option<String>,
    /// IRC server host.
    #[arg(long)]
    server: Option<String>,
    /// IRC server port.
    #[arg(long)]
    irc_port: Option<u16>,
    /// HTTP listen port for the webhook.
    #[arg(long)]
    api_port: Option<u16>,
    /// Directory holding `passwd`, `nickserv.secret` and `config.toml`.
    #[arg(long)]
    conf_dir: Option<PathBuf>,
    /// Alternate TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log to stderr only.
    #[arg(long)]
    no_log_file: bool,
}

/// Everything loaded before any connection is attempted.
struct Startup {
    config: Config,
    credential: Credential,
    recovery_secret: RecoverySecret,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Start(args) => handle_start(args).await,
        Command::Check(args) => handle_check(&args),
        Command::HashPasswd { identifier } => handle_hash_passwd(&identifier),
    }
}

/// Run the relay until an interrupt, a disconnect, or a listener failure.
async fn handle_start(args: RunArgs) -> anyhow::Result<()> {
    let paths = resolve_paths(&args)?;

    let sink = if args.no_log_file {
        LogSink::Stderr
    } else {
        LogSink::File {
            logs_dir: &paths.logs_dir,
        }
    };
    let _logging_guard = logging::init(sink)?;

    let Startup {
        config,
        credential,
        recovery_secret,
    } = load_startup(&args, &paths)?;

    info!(
        server = %config.irc.server_string(),
        channel = %config.irc.channel,
        listen = %config.webhook.listen_addr(),
        "confann starting"
    );

    // Installed before dialing so an early interrupt is queued, not fatal.
    let (interrupt_tx, interrupt_rx) = mpsc::channel(1);
    let _signal_task = bridge::spawn_signal_forwarder(interrupt_tx)
        .context("failed to install signal handlers")?;

    let (readiness_writer, readiness) = bridge::readiness();

    let (session, signals) = ChatSession::connect(&config.irc, recovery_secret)
        .await
        .with_context(|| format!("failed to connect to {}", config.irc.server_string()))?;
    let chat: Arc<dyn ChatSink> = Arc::new(session);

    let state = WebhookState {
        credential: Arc::new(credential),
        readiness,
        chat: Arc::clone(&chat),
        channel: config.irc.channel.clone(),
        path: config.webhook.path.clone(),
    };
    let (listener_tx, listener_rx) = mpsc::channel(1);
    let server = webhook::server::spawn(
        config.webhook.listen_addr(),
        webhook::router(state),
        listener_tx,
    );

    let (shutdown, shutdown_rx) = ShutdownTrigger::channel();
    let report = bridge::run_bridge(BridgeDeps {
        chat,
        readiness: readiness_writer,
        join_order: config.irc.join_order(),
        signals,
        interrupts: interrupt_rx,
        listener_errors: listener_rx,
        server,
        shutdown_grace: config.webhook.shutdown_grace(),
        shutdown,
        shutdown_rx,
    })
    .await;

    if report.reason == ShutdownReason::ListenerFailed {
        error!(listener = ?report.listener, "confann stopped after a webhook listener failure");
    } else {
        info!(reason = ?report.reason, listener = ?report.listener, "confann stopped");
    }
    Ok(())
}

/// Validate everything `start` would load, then exit.
fn handle_check(args: &RunArgs) -> anyhow::Result<()> {
    logging::init(LogSink::Stderr)?;
    let paths = resolve_paths(args)?;
    let startup = load_startup(args, &paths)?;

    println!("config dir:  {}", paths.root.display());
    println!("server:      {}", startup.config.irc.server_string());
    println!("tls:         {}", startup.config.irc.tls);
    println!("channels:    {}", startup.config.irc.join_order().join(" "));
    println!("listen:      {}", startup.config.webhook.listen_addr());
    println!("path:        {}", startup.config.webhook.path);
    println!("identifier:  {}", startup.credential.identifier());
    println!("ok");
    Ok(())
}

/// Hash a secret from stdin into a credential record on stdout.
fn handle_hash_passwd(identifier: &str) -> anyhow::Result<()> {
    if identifier.is_empty() || identifier.contains(':') {
        anyhow::bail!("identifier must be non-empty and must not contain ':'");
    }

    let mut secret = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut secret)
        .context("failed to read secret from stdin")?;
    let secret = secret.trim_end_matches(['\r', '\n']);
    if secret.is_empty() {
        anyhow::bail!("secret read from stdin is empty");
    }

    let hash =
        auth::hash_secret(secret).map_err(|e| anyhow::anyhow!("failed to hash secret: {e}"))?;
    println!("{identifier}:{hash}");
    Ok(())
}

fn resolve_paths(args: &RunArgs) -> anyhow::Result<ConfPaths> {
    match &args.conf_dir {
        Some(dir) => Ok(ConfPaths::under(dir)),
        None => config::conf_paths().context("failed to resolve config directory"),
    }
}

/// Load config, apply CLI overrides, and read both secret files.
fn load_startup(args: &RunArgs, paths: &ConfPaths) -> anyhow::Result<Startup> {
    let config_path = args.config.clone().unwrap_or_else(|| paths.config_toml.clone());
    let mut config = load_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    apply_overrides(&mut config, args);
    config.validate().context("invalid configuration")?;

    let recovery_secret = load_recovery_secret(&paths.recovery_secret)
        .with_context(|| format!("failed to load {}", paths.recovery_secret.display()))?;
    let credential = load_passwd(&paths.passwd)
        .with_context(|| format!("failed to load {}", paths.passwd.display()))?;

    Ok(Startup {
        config,
        credential,
        recovery_secret,
    })
}

fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(channel) = &args.channel {
        config.irc.channel.clone_from(channel);
    }
    if let Some(server) = &args.server {
        config.irc.server.clone_from(server);
    }
    if let Some(port) = args.irc_port {
        config.irc.port = port;
    }
    if let Some(port) = args.api_port {
        config.webhook.port = port;
    }
}
