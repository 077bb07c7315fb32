//! One-shot APRS-IS transmit client for CWOP.
//!
//! Each send opens its own TCP connection, authenticates with the APRS-IS
//! login line, waits for the `# logresp` acknowledgement, writes exactly one
//! packet, and closes. The whole exchange runs under a single deadline and
//! is never retried here; retry policy belongs to the caller.

use async_trait::async_trait;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Client identification sent in the `vers` clause of the login line.
pub const CLIENT_ID: &str = concat!("cwop-client ", env!("CARGO_PKG_VERSION"));

/// Literal prefix of the APRS-IS login acknowledgement line.
const LOGRESP_PREFIX: &str = "# logresp ";

/// Configuration for a single CWOP transmission.
#[derive(Debug, Clone)]
pub struct CwopClientConfig {
    /// CWOP/APRS-IS server hostname
    pub server: String,
    /// CWOP/APRS-IS server port
    pub port: u16,
    /// Username for authentication, usually the station callsign
    pub username: String,
    /// APRS-IS passcode; `None` sends the read-only sentinel `-1`
    pub passcode: Option<String>,
    /// Overall deadline covering connect, login, send, and close
    pub timeout: Duration,
}

impl Default for CwopClientConfig {
    fn default() -> Self {
        Self {
            server: "cwop.aprs.net".to_string(),
            port: 14580,
            username: "N0CALL".to_string(),
            passcode: None,
            timeout: Duration::from_secs(20),
        }
    }
}

/// Failure of a single send attempt. Anything here tears the connection
/// down and fails only the current attempt.
#[derive(Debug)]
pub enum SendError {
    /// The first server line after login did not carry the `# logresp `
    /// acknowledgement prefix.
    InvalidLoginResponse(String),
    /// The server closed the connection before acknowledging the login.
    ConnectionClosed,
    /// The overall deadline elapsed before the packet was sent.
    Timeout(Duration),
    /// Connect, read, or write failure on the underlying socket.
    Io(std::io::Error),
}

impl Display for SendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SendError::InvalidLoginResponse(line) => {
                write!(f, "received invalid login response from APRS-IS: {line:?}")
            }
            SendError::ConnectionClosed => {
                write!(f, "connection closed before login was acknowledged")
            }
            SendError::Timeout(limit) => {
                write!(f, "timed out after {limit:?} while sending APRS packet")
            }
            SendError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SendError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SendError {
    fn from(e: std::io::Error) -> Self {
        SendError::Io(e)
    }
}

/// Build the APRS-IS login line (without the line terminator). A missing
/// passcode authenticates with `-1`, which servers treat as unverified.
pub fn build_login_line(username: &str, passcode: Option<&str>) -> String {
    let mut login = format!("user {username} pass ");
    match passcode {
        Some(pass) => login.push_str(pass),
        None => login.push_str("-1"),
    }
    login.push_str(" vers ");
    login.push_str(CLIENT_ID);
    login
}

/// Login/transmit protocol states. Failures and the overall timeout are the
/// absorbing terminal outcome, carried by `Result` rather than a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendState {
    Start,
    LoginSent,
    PacketSent,
    Done,
}

/// Line-oriented transport capability used by the protocol driver, so the
/// state machine can be exercised without a real socket.
#[async_trait]
pub trait LineIo {
    /// Write one line, appending CRLF; completes only once the bytes have
    /// been flushed to the transport.
    async fn send_line(&mut self, line: &str) -> std::io::Result<()>;
    /// Read one line without its terminator; `None` on a clean EOF.
    async fn recv_line(&mut self) -> std::io::Result<Option<String>>;
    /// Gracefully shut down the write side.
    async fn close(&mut self) -> std::io::Result<()>;
}

/// Drive the login/transmit handshake over an established connection.
///
/// One transition per state: `Start` writes the login line, `LoginSent`
/// validates the acknowledgement and writes the packet, `PacketSent` closes
/// the write side without reading any further server traffic.
async fn run_protocol<T: LineIo>(io: &mut T, login: &str, packet: &str) -> Result<(), SendError> {
    let mut state = SendState::Start;
    loop {
        state = match state {
            SendState::Start => {
                io.send_line(login).await?;
                SendState::LoginSent
            }
            SendState::LoginSent => {
                let line = io
                    .recv_line()
                    .await?
                    .ok_or(SendError::ConnectionClosed)?;
                if !line.starts_with(LOGRESP_PREFIX) {
                    return Err(SendError::InvalidLoginResponse(line));
                }
                debug!("Login acknowledged: {line}");
                io.send_line(packet).await?;
                SendState::PacketSent
            }
            SendState::PacketSent => {
                io.close().await?;
                SendState::Done
            }
            SendState::Done => return Ok(()),
        };
    }
}

/// [`LineIo`] over a TCP stream, reading through a buffer and writing
/// straight to the socket.
struct TcpLineIo {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TcpLineIo {
    fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }
}

#[async_trait]
impl LineIo for TcpLineIo {
    async fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await
    }

    async fn recv_line(&mut self) -> std::io::Result<Option<String>> {
        // Server banners occasionally carry bytes that are not valid UTF-8,
        // so read raw bytes and convert lossily instead of failing the read.
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf).await? {
            0 => Ok(None),
            _ => {
                let line = String::from_utf8_lossy(&buf);
                Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
            }
        }
    }

    async fn close(&mut self) -> std::io::Result<()> {
        self.writer.shutdown().await
    }
}

/// One-shot CWOP transmitter.
///
/// Every call to [`send`](CwopClient::send) opens its own connection, so
/// concurrent sends naturally use independent connections; nothing is
/// pooled or reused.
pub struct CwopClient {
    config: CwopClientConfig,
}

impl CwopClient {
    pub fn new(config: CwopClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CwopClientConfig {
        &self.config
    }

    /// Transmit one framed packet line.
    ///
    /// The whole operation (connect, login, acknowledgement, packet write,
    /// graceful close) runs under the configured deadline. The connection
    /// is owned by this future, so completion, failure, and timeout each
    /// tear it down exactly once.
    pub async fn send(&self, packet: &str) -> Result<(), SendError> {
        match timeout(self.config.timeout, self.send_inner(packet)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Send to {}:{} timed out after {:?}",
                    self.config.server, self.config.port, self.config.timeout
                );
                metrics::counter!("cwop.send.timeout_total").increment(1);
                Err(SendError::Timeout(self.config.timeout))
            }
        }
    }

    async fn send_inner(&self, packet: &str) -> Result<(), SendError> {
        let address = format!("{}:{}", self.config.server, self.config.port);
        info!("Connecting to CWOP server at {address}");

        let stream = match TcpStream::connect(&address).await {
            Ok(stream) => stream,
            Err(e) => {
                metrics::counter!("cwop.connection.failed_total").increment(1);
                return Err(e.into());
            }
        };
        metrics::counter!("cwop.connection.established_total").increment(1);

        let login = build_login_line(&self.config.username, self.config.passcode.as_deref());
        let mut io = TcpLineIo::new(stream);

        match run_protocol(&mut io, &login, packet).await {
            Ok(()) => {
                info!("Packet accepted for relay, connection closed");
                metrics::counter!("cwop.packets.sent_total").increment(1);
                Ok(())
            }
            Err(e) => {
                warn!("Send attempt failed: {e}");
                metrics::counter!("cwop.send.failed_total").increment(1);
                Err(e)
            }
        }
    }
}

/// Builder for [`CwopClientConfig`].
pub struct CwopClientConfigBuilder {
    config: CwopClientConfig,
}

impl CwopClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CwopClientConfig::default(),
        }
    }

    pub fn server<S: Into<String>>(mut self, server: S) -> Self {
        self.config.server = server.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn username<S: Into<String>>(mut self, username: S) -> Self {
        self.config.username = username.into();
        self
    }

    pub fn passcode<S: Into<String>>(mut self, passcode: Option<S>) -> Self {
        self.config.passcode = passcode.map(|p| p.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn build(self) -> CwopClientConfig {
        self.config
    }
}

impl Default for CwopClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
