//! Line-oriented control channel to the media player.
//!
//! # Handshake
//!
//! ```text
//! vlc-scrubber                       player
//! ────────────                       ──────
//! connect(host:port)
//! "<password>\n"         ──────────►
//!                        ◄──────────  greeting lines (logged at info)
//!                        ◄──────────  "Wrong password"   (rejected → error)
//! EOF or greeting_idle of silence  →  authenticated
//! ```
//!
//! The player ends its greeting with a prompt that has no newline, so "no more
//! greeting lines" is detected as a quiet period rather than a terminator.
//! The whole handshake is bounded by `handshake_timeout`, and a greeting line
//! longer than [`MAX_GREETING_LINE`] bytes fails it.
//!
//! # Portability note
//!
//! Only `tokio::net::TcpStream` and the generic `AsyncRead`/`AsyncWrite`
//! traits are used.  Tests run the same handshake over in-memory transports
//! through [`ControlChannel::connect_with`].

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use scrubber_core::protocol::handshake::{is_rejection, normalize_line};
use scrubber_core::PlayerCommand;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::application::dispatch_intent::CommandSink;

type LineReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type LineWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Longest greeting line accepted, in bytes, without its terminator.
pub const MAX_GREETING_LINE: usize = 4096;

/// The player refused the session.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("{endpoint} rejected the password; check the password and the player's remote-control arguments")]
    WrongPassword { endpoint: String },
}

/// Errors from [`ControlChannel::connect`].
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The TCP connection could not be established.
    #[error("unable to connect to host {endpoint}: {source}")]
    HostUnreachable {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// The TCP connection did not complete within `connect_timeout`.
    #[error("timed out after {after:?} connecting to {endpoint}")]
    Timeout { endpoint: String, after: Duration },
    /// The password exchange did not finish within `handshake_timeout`.
    #[error("{endpoint} did not finish the greeting within {after:?}")]
    HandshakeTimeout { endpoint: String, after: Duration },
    /// The password was rejected.
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),
    /// The transport failed while the handshake was in progress.
    #[error("couldn't get I/O for {endpoint}: {source}")]
    Io {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// `connect` was called on a channel that already has a live session.
    #[error("already connected to {endpoint}")]
    AlreadyConnected { endpoint: String },
}

/// Errors from [`ControlChannel::send`] and [`ControlChannel::read_line`].
#[derive(Debug, Error)]
pub enum SendError {
    /// No authenticated session (never connected, closed, or torn down).
    #[error("control channel is not connected")]
    NotConnected,
    /// The line contains a line break and would be read as several commands.
    #[error("command line must not contain a line break: {0:?}")]
    InvalidLine(String),
    /// The transport failed; the session has been torn down.
    #[error("control channel I/O failed: {0}")]
    Io(#[source] io::Error),
}

impl SendError {
    /// `true` when the session is gone and no further command can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SendError::Io(_))
    }
}

/// Errors from [`ControlChannel::close`].
#[derive(Debug, Error)]
pub enum CloseError {
    #[error("control channel is already closed")]
    AlreadyClosed,
    #[error("failed to shut down control channel: {0}")]
    Io(#[source] io::Error),
}

/// Where and how to reach the player.
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Hostname, FQDN, or IP address of the player.
    pub host: String,
    /// Remote-control TCP port.
    pub port: u16,
    /// Password sent as the first line.
    pub password: String,
    /// Upper bound on the TCP connect.
    pub connect_timeout: Duration,
    /// Silence after which the greeting is considered finished.
    pub greeting_idle: Duration,
    /// Upper bound on the password exchange, greeting included.
    pub handshake_timeout: Duration,
}

impl ChannelConfig {
    /// `host:port`, as dialled and as shown in logs.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4212,
            password: "password".to_string(),
            connect_timeout: Duration::from_secs(5),
            greeting_idle: Duration::from_millis(500),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

// The password must never end up in a log line.
impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("greeting_idle", &self.greeting_idle)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish()
    }
}

/// Snapshot of the session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub endpoint: String,
    pub connected: bool,
    pub authenticated: bool,
}

enum Greeting {
    Accepted,
    Rejected,
}

/// Authenticated text-line session to the player.
///
/// Create it with [`ControlChannel::new`], then call [`ControlChannel::connect`].
/// The channel is `Send + Sync`; share it behind an `Arc` and call
/// [`ControlChannel::send`] from any task.
pub struct ControlChannel {
    config: ChannelConfig,
    writer: Mutex<Option<LineWriter>>,
    reader: Mutex<Option<LineReader>>,
    connected: AtomicBool,
    authenticated: AtomicBool,
}

impl ControlChannel {
    /// Creates a channel that is not yet connected.
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            connected: AtomicBool::new(false),
            authenticated: AtomicBool::new(false),
        }
    }

    /// The configuration this channel was built with.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Current session state.
    pub fn session(&self) -> Session {
        Session {
            endpoint: self.config.endpoint(),
            connected: self.connected.load(Ordering::SeqCst),
            authenticated: self.authenticated.load(Ordering::SeqCst),
        }
    }

    /// Dials the player over TCP and runs the password handshake.  Returns
    /// the authenticated session.
    ///
    /// # Errors
    ///
    /// - [`ConnectError::HostUnreachable`] if the TCP connect fails.
    /// - [`ConnectError::Timeout`] if it does not finish within `connect_timeout`.
    /// - [`ConnectError::Authentication`] if the player answers `Wrong password`.
    /// - [`ConnectError::HandshakeTimeout`] if the greeting never settles.
    /// - [`ConnectError::Io`] if the transport fails mid-handshake or sends
    ///   an over-long greeting line.
    pub async fn connect(&self) -> Result<Session, ConnectError> {
        let endpoint = self.config.endpoint();
        let dial = TcpStream::connect((self.config.host.as_str(), self.config.port));
        let stream = match time::timeout(self.config.connect_timeout, dial).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                error!("unable to connect to host {endpoint}: {source}");
                return Err(ConnectError::HostUnreachable { endpoint, source });
            }
            Err(_) => {
                error!(
                    "connecting to {endpoint} timed out after {:?}",
                    self.config.connect_timeout
                );
                return Err(ConnectError::Timeout {
                    endpoint,
                    after: self.config.connect_timeout,
                });
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not disable Nagle on {endpoint}: {e}");
        }
        info!("connected to {}", endpoint);
        self.connect_with(stream).await
    }

    /// Runs the password handshake over an already-open transport.
    ///
    /// On success the transport becomes this channel's session.  On failure the
    /// transport is shut down and dropped.
    pub async fn connect_with<T>(&self, transport: T) -> Result<Session, ConnectError>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let endpoint = self.config.endpoint();

        // Holding the writer slot for the whole handshake keeps a concurrent
        // `send` or second `connect` from seeing a half-built session.
        let mut writer_slot = self.writer.lock().await;
        if writer_slot.is_some() {
            return Err(ConnectError::AlreadyConnected { endpoint });
        }

        let (read_half, write_half) = tokio::io::split(transport);
        let mut reader: LineReader = BufReader::new(Box::new(read_half));
        let mut writer: LineWriter = Box::new(write_half);

        let exchange = time::timeout(
            self.config.handshake_timeout,
            self.exchange_password(&mut reader, &mut writer, &endpoint),
        )
        .await;
        let failure: Option<ConnectError> = match exchange {
            Ok(Ok(Greeting::Accepted)) => None,
            Ok(Ok(Greeting::Rejected)) => {
                error!(
                    "unable to connect to {endpoint}: wrong password; check the password and the player's remote-control arguments"
                );
                Some(AuthenticationError::WrongPassword {
                    endpoint: endpoint.clone(),
                }
                .into())
            }
            Ok(Err(source)) => {
                error!("couldn't get I/O for {endpoint}: {source}");
                Some(ConnectError::Io {
                    endpoint: endpoint.clone(),
                    source,
                })
            }
            Err(_elapsed) => {
                error!(
                    "{endpoint} did not finish the greeting within {:?}",
                    self.config.handshake_timeout
                );
                Some(ConnectError::HandshakeTimeout {
                    endpoint: endpoint.clone(),
                    after: self.config.handshake_timeout,
                })
            }
        };
        if let Some(e) = failure {
            let _ = writer.shutdown().await;
            return Err(e);
        }

        *writer_slot = Some(writer);
        *self.reader.lock().await = Some(reader);
        self.connected.store(true, Ordering::SeqCst);
        self.authenticated.store(true, Ordering::SeqCst);
        info!("authenticated with {endpoint}");
        Ok(self.session())
    }

    /// Sends the password line, then scans the greeting.
    async fn exchange_password(
        &self,
        reader: &mut LineReader,
        writer: &mut LineWriter,
        endpoint: &str,
    ) -> io::Result<Greeting> {
        info!("sending password to {endpoint}");
        let mut line = self.config.password.clone().into_bytes();
        line.push(b'\n');
        write_bytes(writer, &line).await?;
        self.read_greeting(reader).await
    }

    /// Reads greeting lines until EOF, a quiet period, or the rejection line.
    async fn read_greeting(&self, reader: &mut LineReader) -> io::Result<Greeting> {
        let mut buf = Vec::new();
        loop {
            // `buf` is empty here; the two spare bytes leave room for `\r\n`.
            let limit = (MAX_GREETING_LINE + 2) as u64;
            let mut bounded = (&mut *reader).take(limit);
            // `read_until` keeps partially read bytes in `buf` when the
            // timeout cancels it, so a trailing prompt is still visible here.
            match time::timeout(self.config.greeting_idle, bounded.read_until(b'\n', &mut buf))
                .await
            {
                Ok(Ok(0)) => return Ok(Greeting::Accepted),
                Ok(Ok(_)) => {
                    if !buf.ends_with(b"\n") && buf.len() > MAX_GREETING_LINE {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("greeting line longer than {MAX_GREETING_LINE} bytes"),
                        ));
                    }
                    let line = normalize_line(&buf);
                    buf.clear();
                    info!("{line}");
                    if is_rejection(&line) {
                        return Ok(Greeting::Rejected);
                    }
                }
                Ok(Err(e)) => return Err(e),
                Err(_elapsed) => {
                    if buf.is_empty() {
                        return Ok(Greeting::Accepted);
                    }
                    let partial = normalize_line(&buf);
                    info!("{partial}");
                    return Ok(if is_rejection(&partial) {
                        Greeting::Rejected
                    } else {
                        Greeting::Accepted
                    });
                }
            }
        }
    }

    /// Writes `line` followed by `\n`.
    ///
    /// Each call writes its whole line under the writer lock, so lines from
    /// concurrent callers never interleave and are sent in lock order (FIFO).
    /// No acknowledgement is awaited.
    ///
    /// # Errors
    ///
    /// - [`SendError::NotConnected`] if there is no authenticated session.
    /// - [`SendError::InvalidLine`] if `line` contains `\r` or `\n`.
    /// - [`SendError::Io`] if the write fails; the session is torn down.
    ///
    /// # Cancel safety
    ///
    /// Not cancel safe.  Dropping the future mid-write leaves part of the
    /// line on the wire, so callers must never abort a task inside `send`.
    pub async fn send(&self, line: &str) -> Result<(), SendError> {
        if line.contains(['\n', '\r']) {
            return Err(SendError::InvalidLine(line.to_string()));
        }

        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.send_bytes(line, &bytes).await
    }

    /// Writes one already terminated line under the writer lock.
    async fn send_bytes(&self, label: &str, bytes: &[u8]) -> Result<(), SendError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SendError::NotConnected)?;
        if let Err(e) = write_bytes(writer, bytes).await {
            error!("failed to send {label:?} to {}: {e}", self.config.endpoint());
            *guard = None;
            self.mark_closed();
            return Err(SendError::Io(e));
        }
        debug!("sent {label:?}");
        Ok(())
    }

    /// Reads one response line; `Ok(None)` at end of stream.
    ///
    /// Commands do not require a response, so this is only for callers that
    /// issue commands the player answers (e.g. `status`).
    pub async fn read_line(&self) -> Result<Option<String>, SendError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SendError::NotConnected);
        }
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(SendError::NotConnected)?;
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(normalize_line(&buf))),
            Err(e) => Err(SendError::Io(e)),
        }
    }

    /// Shuts the session down and releases the transport.
    ///
    /// Waits for an in-flight `send` to finish first.  Calling it again, or on a
    /// channel that never connected, returns [`CloseError::AlreadyClosed`].
    pub async fn close(&self) -> Result<(), CloseError> {
        let writer = self.writer.lock().await.take();
        self.mark_closed();
        let Some(mut writer) = writer else {
            return Err(CloseError::AlreadyClosed);
        };
        let result = writer.shutdown().await;
        drop(writer);
        match result {
            Ok(()) => {
                info!("closed control channel to {}", self.config.endpoint());
                Ok(())
            }
            Err(e) => {
                warn!("error while closing control channel: {e}");
                Err(CloseError::Io(e))
            }
        }
    }

    fn mark_closed(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.authenticated.store(false, Ordering::SeqCst);
        // A `read_line` in progress keeps the reader; it is dropped with the channel.
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
    }
}

#[async_trait]
impl CommandSink for ControlChannel {
    async fn send_command(&self, command: PlayerCommand) -> Result<(), SendError> {
        self.send_bytes(&command.to_string(), &command.encode()).await
    }

    async fn close(&self) -> Result<(), CloseError> {
        ControlChannel::close(self).await
    }
}

async fn write_bytes(writer: &mut LineWriter, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;
    use tokio_test::{assert_err, assert_ok};

    fn config(password: &str) -> ChannelConfig {
        ChannelConfig {
            password: password.to_string(),
            ..ChannelConfig::default()
        }
    }

    #[tokio::test]
    async fn test_greeting_then_eof_authenticates() {
        // Arrange
        let transport = Builder::new()
            .write(b"password\n")
            .read(b"Welcome\r\nPassword:\r\n")
            .build();
        let channel = ControlChannel::new(config("password"));

        // Act
        let result = channel.connect_with(transport).await;

        // Assert
        let session = assert_ok!(result);
        assert_eq!(session, channel.session());
        assert!(session.connected);
        assert!(session.authenticated);
        assert_eq!(session.endpoint, "localhost:4212");
    }

    #[tokio::test(start_paused = true)]
    async fn test_greeting_then_silence_authenticates_and_sends() {
        // Arrange: the prompt has no newline and the player then waits.
        let transport = Builder::new()
            .write(b"password\n")
            .read(b"Welcome, Master\r\n> ")
            .write(b"pause\n")
            .build();
        let channel = ControlChannel::new(config("password"));

        // Act
        assert_ok!(channel.connect_with(transport).await);
        let sent = channel.send("pause").await;

        // Assert
        assert_ok!(sent);
        assert_ok!(channel.close().await);
    }

    #[tokio::test]
    async fn test_wrong_password_fails_and_leaves_channel_closed() {
        // Arrange
        let transport = Builder::new()
            .write(b"secret\n")
            .read(b"Welcome\r\n")
            .read(b"Wrong password\r\n")
            .build();
        let channel = ControlChannel::new(config("secret"));

        // Act
        let result = channel.connect_with(transport).await;

        // Assert
        assert!(matches!(
            result,
            Err(ConnectError::Authentication(AuthenticationError::WrongPassword { .. }))
        ));
        assert!(!channel.session().connected);
        assert!(!channel.session().authenticated);
        assert!(matches!(
            channel.send("pause").await,
            Err(SendError::NotConnected)
        ));
        assert!(matches!(channel.close().await, Err(CloseError::AlreadyClosed)));
    }

    #[tokio::test]
    async fn test_only_exact_rejection_line_fails_handshake() {
        let transport = Builder::new()
            .write(b"password\n")
            .read(b"Wrong password?\r\nwrong password\r\n")
            .build();
        let channel = ControlChannel::new(config("password"));

        assert_ok!(channel.connect_with(transport).await);
        assert!(channel.session().authenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unterminated_rejection_before_silence_fails_handshake() {
        let transport = Builder::new()
            .write(b"password\n")
            .read(b"Wrong password")
            .wait(Duration::from_secs(10))
            .build();
        let channel = ControlChannel::new(config("password"));

        let result = channel.connect_with(transport).await;

        assert!(matches!(result, Err(ConnectError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_send_before_connect_is_not_connected() {
        let channel = ControlChannel::new(ChannelConfig::default());
        assert!(matches!(
            channel.send("play").await,
            Err(SendError::NotConnected)
        ));
        assert!(matches!(
            channel.read_line().await,
            Err(SendError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_send_rejects_embedded_line_break() {
        // Arrange
        let transport = Builder::new().write(b"password\n").read(b"hi\n").build();
        let channel = ControlChannel::new(config("password"));
        assert_ok!(channel.connect_with(transport).await);

        // Act
        let result = channel.send("pause\nplay").await;

        // Assert
        assert!(matches!(result, Err(SendError::InvalidLine(_))));
        assert!(channel.session().connected, "a rejected line must not tear down the session");
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_tears_session_down() {
        // Arrange
        let transport = Builder::new()
            .write(b"password\n")
            .read(b"Welcome\r\n")
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "player went away"))
            .build();
        let channel = ControlChannel::new(config("password"));
        assert_ok!(channel.connect_with(transport).await);

        // Act
        let first = channel.send("play").await;
        let second = channel.send("play").await;

        // Assert
        match first {
            Err(ref e @ SendError::Io(_)) => assert!(e.is_fatal()),
            other => panic!("expected Io error, got {other:?}"),
        }
        assert!(matches!(second, Err(SendError::NotConnected)));
        assert!(!channel.session().connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_line_returns_player_response() {
        // Arrange
        let transport = Builder::new()
            .write(b"password\n")
            .read(b"Welcome\r\n")
            .write(b"status\n")
            .read(b"( state playing )\r\n")
            .build();
        let channel = ControlChannel::new(config("password"));
        assert_ok!(channel.connect_with(transport).await);

        // Act
        assert_ok!(channel.send("status").await);
        let response = channel.read_line().await;

        // Assert
        assert_eq!(response.unwrap(), Some("( state playing )".to_string()));
    }

    #[tokio::test]
    async fn test_close_twice_reports_already_closed() {
        let transport = Builder::new().write(b"password\n").read(b"hi\n").build();
        let channel = ControlChannel::new(config("password"));
        assert_ok!(channel.connect_with(transport).await);

        assert_ok!(channel.close().await);
        assert!(matches!(channel.close().await, Err(CloseError::AlreadyClosed)));
        assert!(!channel.session().connected);
    }

    #[tokio::test]
    async fn test_second_connect_is_rejected() {
        let first = Builder::new().write(b"password\n").read(b"hi\n").build();
        let channel = ControlChannel::new(config("password"));
        assert_ok!(channel.connect_with(first).await);

        let second = Builder::new().build();
        let result = channel.connect_with(second).await;

        assert!(matches!(result, Err(ConnectError::AlreadyConnected { .. })));
        assert!(channel.session().connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_sink_writes_command_line() {
        let transport = Builder::new()
            .write(b"password\n")
            .read(b"hi\n")
            .write(b"seek 46%\n")
            .build();
        let channel = ControlChannel::new(config("password"));
        assert_ok!(channel.connect_with(transport).await);

        let sink: &dyn CommandSink = &channel;
        assert_ok!(sink.send_command(PlayerCommand::Seek(46)).await);
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_is_host_unreachable() {
        // Arrange: grab a free port, then release it so nothing is listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let channel = ControlChannel::new(ChannelConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..ChannelConfig::default()
        });

        // Act
        let result = channel.connect().await;

        // Assert
        assert_err!(&result);
        assert!(matches!(result, Err(ConnectError::HostUnreachable { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_to_unanswered_address_times_out() {
        // Arrange: nothing answers on this non-routable address, so the SYN
        // goes unanswered and only the timer can end the dial.
        let channel = ControlChannel::new(ChannelConfig {
            host: "10.255.255.1".to_string(),
            port: 4212,
            connect_timeout: Duration::from_millis(50),
            ..ChannelConfig::default()
        });

        // Act
        let result = channel.connect().await;

        // Assert
        match result {
            Err(ConnectError::Timeout { endpoint, after }) => {
                assert_eq!(endpoint, "10.255.255.1:4212");
                assert_eq!(after, Duration::from_millis(50));
            }
            // A host with no route at all refuses the dial outright.
            Err(ConnectError::HostUnreachable { .. }) => {}
            other => panic!("expected a connect timeout, got {other:?}"),
        }
        assert!(!channel.session().connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_greeting_that_never_settles_hits_handshake_timeout() {
        // Arrange: a peer that sends a banner line more often than
        // greeting_idle, forever.
        let (client, player) = tokio::io::duplex(64);
        let (_player_read, mut player_write) = tokio::io::split(player);
        tokio::spawn(async move {
            while player_write.write_all(b"banner\r\n").await.is_ok() {
                time::sleep(Duration::from_millis(100)).await;
            }
        });
        let channel = ControlChannel::new(ChannelConfig {
            greeting_idle: Duration::from_millis(500),
            handshake_timeout: Duration::from_secs(3),
            ..config("password")
        });
        let started = time::Instant::now();

        // Act
        let result = channel.connect_with(client).await;

        // Assert
        assert!(matches!(result, Err(ConnectError::HandshakeTimeout { .. })));
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(!channel.session().connected);
    }

    #[tokio::test]
    async fn test_over_long_greeting_line_fails_handshake() {
        // Arrange
        let (client, player) = tokio::io::duplex(2 * MAX_GREETING_LINE);
        let (_player_read, mut player_write) = tokio::io::split(player);
        player_write
            .write_all(&vec![b'x'; MAX_GREETING_LINE + 100])
            .await
            .unwrap();
        let channel = ControlChannel::new(config("password"));

        // Act
        let result = channel.connect_with(client).await;

        // Assert
        match result {
            Err(ConnectError::Io { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::InvalidData);
            }
            other => panic!("expected an over-long line error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_greeting_line_at_the_limit_is_accepted() {
        let mut line = vec![b'x'; MAX_GREETING_LINE];
        line.extend_from_slice(b"\r\n");
        let transport = Builder::new().write(b"password\n").read(&line).build();
        let channel = ControlChannel::new(config("password"));

        assert_ok!(channel.connect_with(transport).await);
    }

    #[test]
    fn test_channel_config_defaults() {
        let cfg = ChannelConfig::default();
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, 4212);
        assert_eq!(cfg.password, "password");
        assert_eq!(cfg.endpoint(), "localhost:4212");
        assert_eq!(cfg.handshake_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_channel_config_debug_redacts_password() {
        let cfg = config("hunter2");
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
