//! IRC connection adapter.
//!
//! Dials the server (optionally over TLS), performs the `NICK`/`USER`
//! handshake, and runs two background tasks: a reader that turns lines
//! into [`IrcEvent`]s and a writer that drains an outbound queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

use super::message::{Message, ERR_NICKNAMEINUSE, RPL_WELCOME};
use super::{ChatSink, IrcEvent, SessionError};
use crate::config::IrcConfig;

/// Longest inbound line accepted, terminator and IRCv3 tags included.
/// A server that sends more without a newline is treated as gone.
pub const MAX_INBOUND_LINE: u64 = 8192;

/// Item on the writer queue.
#[derive(Debug)]
enum Outbound {
    Line(Message),
    Quit(Message),
}

/// Cloneable handle for sending on an open connection.
#[derive(Debug, Clone)]
pub struct IrcHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: Arc<AtomicBool>,
    quit_message: Arc<str>,
}

impl IrcHandle {
    /// Queue a raw message.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] after [`IrcHandle::quit`] or once
    /// the writer has stopped.
    pub fn send(&self, message: Message) -> Result<(), SessionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }
        self.outbound
            .send(Outbound::Line(message))
            .map_err(|_| SessionError::Closed)
    }

    /// Send a `PRIVMSG`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] when the connection is gone.
    pub fn privmsg(&self, target: &str, text: &str) -> Result<(), SessionError> {
        self.send(Message::privmsg(target, text))
    }

    /// Send `QUIT` and stop the writer. Only the first call does anything.
    pub fn quit(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("irc connection already closed");
            return;
        }
        let _ = self
            .outbound
            .send(Outbound::Quit(Message::quit(&self.quit_message)));
    }

    /// Whether [`IrcHandle::quit`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl ChatSink for IrcHandle {
    fn join(&self, channel: &str) -> Result<(), SessionError> {
        self.send(Message::join(channel))
    }

    fn notice(&self, target: &str, text: &str) -> Result<(), SessionError> {
        self.send(Message::notice(target, text))
    }

    fn close(&self) {
        self.quit();
    }
}

/// Dial the server and start the reader and writer tasks.
///
/// Events are delivered on `events`, which must already have a consumer;
/// [`IrcEvent::Registered`] is emitted once the handshake lines are queued.
///
/// # Errors
///
/// Returns [`SessionError::Connect`] or [`SessionError::ConnectTimeout`]
/// when the server cannot be reached.
pub async fn connect(
    config: &IrcConfig,
    events: mpsc::UnboundedSender<IrcEvent>,
) -> Result<IrcHandle, SessionError> {
    let server = config.server_string();
    let dial = async {
        let tcp = TcpStream::connect((config.server.as_str(), config.port))
            .await
            .map_err(|source| SessionError::Connect {
                server: server.clone(),
                source,
            })?;
        if config.tls {
            let tls = tls_connect(&config.server, tcp).await.map_err(|e| match e {
                TlsDialError::Name => SessionError::InvalidServerName(config.server.clone()),
                TlsDialError::Io(source) => SessionError::Connect {
                    server: server.clone(),
                    source,
                },
            })?;
            Ok::<_, SessionError>(start(config, tls, events))
        } else {
            Ok(start(config, tcp, events))
        }
    };

    let handle = tokio::time::timeout(config.connect_timeout(), dial)
        .await
        .map_err(|_| SessionError::ConnectTimeout(server.clone()))??;
    info!(server = %server, tls = config.tls, "irc connection established");
    Ok(handle)
}

enum TlsDialError {
    Name,
    Io(std::io::Error),
}

async fn tls_connect(
    host: &str,
    tcp: TcpStream,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>, TlsDialError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(tls_config));
    let name = ServerName::try_from(host.to_owned()).map_err(|_| TlsDialError::Name)?;
    connector.connect(name, tcp).await.map_err(TlsDialError::Io)
}

fn start<S>(config: &IrcConfig, stream: S, events: mpsc::UnboundedSender<IrcEvent>) -> IrcHandle
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let handle = IrcHandle {
        outbound: outbound_tx,
        closed: Arc::new(AtomicBool::new(false)),
        quit_message: Arc::from(config.quit_message.as_str()),
    };

    // Handshake lines go first on the queue so nothing can overtake them.
    if let Some(password) = &config.server_password {
        let _ = handle.send(Message::pass(password));
    }
    let _ = handle.send(Message::nick(&config.nick));
    let _ = handle.send(Message::user(&config.user, &config.realname));

    // Queued before the reader exists so it always precedes Connected.
    let _ = events.send(IrcEvent::Registered);

    tokio::spawn(run_writer(write_half, outbound_rx, events.clone()));
    tokio::spawn(run_reader(
        read_half,
        handle.clone(),
        config.nick.clone(),
        events,
    ));
    handle
}

async fn run_writer<W>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<IrcEvent>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = outbound.recv().await {
        let (message, last) = match item {
            Outbound::Line(message) => (message, false),
            Outbound::Quit(message) => (message, true),
        };
        debug!(command = %message.command, "irc >>");
        let mut line = message.to_line();
        line.push_str("\r\n");
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!(error = %e, "irc write failed");
            let _ = events.send(IrcEvent::Disconnected);
            return;
        }
        if last {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "irc shutdown after QUIT failed");
            }
            debug!("irc writer stopped after QUIT");
            return;
        }
    }
}

async fn run_reader<R>(
    reader: R,
    handle: IrcHandle,
    mut nick: String,
    events: mpsc::UnboundedSender<IrcEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut welcomed = false;

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_INBOUND_LINE)
            .read_until(b'\n', &mut buf)
            .await;
        match read {
            Ok(0) => {
                info!("irc server closed the connection");
                break;
            }
            Ok(_) if buf.last() != Some(&b'\n') => {
                warn!(
                    limit = MAX_INBOUND_LINE,
                    "irc line unterminated within limit, dropping connection"
                );
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "irc read failed");
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let Some(message) = Message::parse(&line) else {
            continue;
        };

        match message.command.as_str() {
            "PING" => {
                let token = message.params.first().map_or("", String::as_str);
                if handle.send(Message::pong(token)).is_err() {
                    debug!("dropping PONG, connection closing");
                }
            }
            RPL_WELCOME if !welcomed => {
                welcomed = true;
                let _ = events.send(IrcEvent::Connected);
            }
            ERR_NICKNAMEINUSE if !welcomed => {
                nick.push('_');
                warn!(nick = %nick, "nick in use, retrying");
                let _ = handle.send(Message::nick(&nick));
            }
            "PRIVMSG" => {
                if let [target, text, ..] = message.params.as_slice() {
                    let _ = events.send(IrcEvent::Privmsg {
                        source: message.source_nick().map(str::to_owned),
                        target: target.clone(),
                        text: text.clone(),
                    });
                }
            }
            "ERROR" => {
                let reason = message.params.last().map_or("", String::as_str);
                warn!(reason, "irc server sent ERROR");
            }
            _ => {
                debug!(command = %message.command, "irc <<");
            }
        }
    }

    let _ = events.send(IrcEvent::Disconnected);
}
