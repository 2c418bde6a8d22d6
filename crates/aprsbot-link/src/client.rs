//! TCP client for APRS-IS.
//!
//! [`AprsIsLink`] dials an APRS-IS server, logs in with the station's
//! passcode and range filter, then exposes the connection through
//! [`PacketLink`]: a serialized write half for outbound packets and a
//! buffered read half that yields decoded inbound packets.

use std::time::Duration;

use aprsbot_models::{Callsign, InboundPacket};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::credentials::AprsCredentials;
use crate::error::LinkError;
use crate::filter::RangeFilter;
use crate::link::PacketLink;

/// Software name reported in the login line.
const SOFTWARE_NAME: &str = "aprsbot";

/// Longest feed line accepted, terminator included. APRS-IS caps lines at
/// 512 bytes; anything longer is discarded up to the next newline.
pub const MAX_LINE_LEN: usize = 512;

/// Connection parameters for [`AprsIsLink::connect`].
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// APRS-IS server hostname.
    pub server: String,
    /// APRS-IS server port (14580 is the user-defined filter port).
    pub port: u16,
    /// Login callsign and passcode.
    pub credentials: AprsCredentials,
    /// Optional range filter applied at login.
    pub filter: Option<RangeFilter>,
    /// Upper bound for dialling and for the server's login response.
    pub login_timeout: Duration,
}

impl LinkConfig {
    /// Defaults: `rotate.aprs2.net:14580`, no filter, 15 s login timeout.
    pub fn new(credentials: AprsCredentials) -> Self {
        Self {
            server: "rotate.aprs2.net".to_string(),
            port: 14580,
            credentials,
            filter: None,
            login_timeout: Duration::from_secs(15),
        }
    }

    /// Set the server host and port.
    pub fn with_server(mut self, server: impl Into<String>, port: u16) -> Self {
        self.server = server.into();
        self.port = port;
        self
    }

    /// Apply a range filter at login.
    pub fn with_filter(mut self, filter: RangeFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Override the login timeout.
    pub fn with_login_timeout(mut self, login_timeout: Duration) -> Self {
        self.login_timeout = login_timeout;
        self
    }

    fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }
}

/// A logged-in APRS-IS connection.
pub struct AprsIsLink {
    station: Callsign,
    server: String,
    /// `None` once the link is closed.
    writer: Mutex<Option<OwnedWriteHalf>>,
    reader: Mutex<LineReader>,
    closed: CancellationToken,
}

/// Read half plus the bytes of a line not yet terminated. The buffer
/// outlives each `recv` call so a cancelled read loses nothing.
struct LineReader {
    inner: BufReader<OwnedReadHalf>,
    /// Never longer than [`MAX_LINE_LEN`].
    line: Vec<u8>,
    /// Set while skipping the rest of an oversized line.
    discarding: bool,
}

impl AprsIsLink {
    /// Dial the server, log in and wait for the login response.
    ///
    /// # Errors
    ///
    /// Retryable: [`LinkError::Unreachable`], [`LinkError::Timeout`],
    /// [`LinkError::Io`]. Fatal: [`LinkError::LoginRejected`] when the
    /// server reports the passcode as unverified.
    #[tracing::instrument(skip(config), fields(server = %config.address(), station = %config.credentials.callsign))]
    pub async fn connect(config: &LinkConfig) -> Result<Self, LinkError> {
        let address = config.address();
        info!("connecting to APRS-IS");

        let stream = match timeout(config.login_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(LinkError::Unreachable {
                    server: address,
                    reason: e.to_string(),
                });
            }
            Err(_) => return Err(LinkError::Timeout(format!("connecting to {address}"))),
        };
        let peer = stream
            .peer_addr()
            .map_or_else(|_| address.clone(), |addr| addr.to_string());
        info!(%peer, "TCP connection established");

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let login = build_login_command(config);
        debug!(login = %redact_login(&login, config.credentials.passcode()), "sending login");
        writer.write_all(login.as_bytes()).await?;
        writer.flush().await?;

        let response = timeout(config.login_timeout, read_login_response(&mut reader))
            .await
            .map_err(|_| LinkError::Timeout("waiting for login response".to_string()))??;
        check_login_response(&response, &config.credentials.callsign)?;
        info!(response = %response, "logged in to APRS-IS");

        Ok(Self {
            station: config.credentials.callsign.clone(),
            server: address,
            writer: Mutex::new(Some(writer)),
            reader: Mutex::new(LineReader {
                inner: reader,
                line: Vec::with_capacity(MAX_LINE_LEN),
                discarding: false,
            }),
            closed: CancellationToken::new(),
        })
    }

    /// `host:port` this link is connected to.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// `true` once the feed has ended.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl PacketLink for AprsIsLink {
    fn station(&self) -> &Callsign {
        &self.station
    }

    async fn transmit(&self, line: &str) -> Result<(), LinkError> {
        if line.contains(['\r', '\n']) {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "packet line contains a line break",
            )));
        }
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(LinkError::Closed)?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;
        writer.flush().await?;
        debug!(packet = %line, "packet transmitted");
        Ok(())
    }

    async fn recv(&self) -> Option<InboundPacket> {
        let mut guard = self.reader.lock().await;
        let LineReader {
            inner,
            line,
            discarding,
        } = &mut *guard;

        loop {
            let budget = MAX_LINE_LEN.saturating_sub(line.len()).max(1) as u64;
            let mut limited = (&mut *inner).take(budget);
            let read = tokio::select! {
                () = self.closed.cancelled() => return None,
                read = limited.read_until(b'\n', line) => read,
            };

            match read {
                Ok(0) => {
                    warn!(server = %self.server, "APRS-IS server closed the connection");
                    self.closed.cancel();
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(server = %self.server, error = %e, "APRS-IS read failed");
                    self.closed.cancel();
                    return None;
                }
            }

            if line.last() != Some(&b'\n') {
                if line.len() >= MAX_LINE_LEN {
                    if !*discarding {
                        warn!(
                            server = %self.server,
                            limit = MAX_LINE_LEN,
                            "discarding oversized line"
                        );
                        *discarding = true;
                    }
                    line.clear();
                }
                continue;
            }

            if *discarding {
                *discarding = false;
                line.clear();
                continue;
            }
            let decoded = decode_line(line);
            line.clear();
            if let Some(packet) = decoded {
                return Some(packet);
            }
        }
    }

    async fn close(&self) {
        self.closed.cancel();
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "socket shutdown failed");
            }
            info!(server = %self.server, "APRS-IS link closed");
        }
    }
}

/// Decode one complete feed line, skipping comments and undecodable input.
fn decode_line(raw: &[u8]) -> Option<InboundPacket> {
    let Ok(line) = std::str::from_utf8(raw) else {
        debug!("skipping line with invalid UTF-8");
        return None;
    };
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if InboundPacket::is_server_comment(line) {
        trace!(comment = %line, "server comment");
        return None;
    }
    match InboundPacket::parse(line) {
        Ok(packet) => Some(packet),
        Err(e) => {
            debug!(error = %e, "dropping undecodable line");
            None
        }
    }
}

/// Build the APRS-IS login line, e.g.
/// `user W1AW pass 12345 vers aprsbot 0.1.0 filter r/30.27/-97.74/80\r\n`.
fn build_login_command(config: &LinkConfig) -> String {
    let mut login = format!(
        "user {} pass {} vers {SOFTWARE_NAME} {}",
        config.credentials.callsign,
        config.credentials.passcode(),
        env!("CARGO_PKG_VERSION"),
    );
    if let Some(filter) = &config.filter {
        login.push_str(" filter ");
        login.push_str(&filter.to_string());
        info!(%filter, "using APRS-IS filter");
    }
    login.push_str("\r\n");
    login
}

fn redact_login(login: &str, passcode: &str) -> String {
    login.trim_end().replacen(&format!(" pass {passcode} "), " pass ***** ", 1)
}

/// Skip the server banner until the `# logresp` line arrives.
async fn read_login_response(reader: &mut BufReader<OwnedReadHalf>) -> Result<String, LinkError> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "server closed the connection during login",
            )));
        }
        let trimmed = line.trim();
        if trimmed.starts_with("# logresp") {
            return Ok(trimmed.to_string());
        }
        trace!(banner = %trimmed, "login banner");
    }
}

/// Accept `# logresp CALL verified, server NAME`; reject `unverified`.
fn check_login_response(response: &str, station: &Callsign) -> Result<(), LinkError> {
    let mut words = response
        .trim_start_matches('#')
        .split_whitespace()
        .skip(1);
    let callsign = words.next().unwrap_or_default();
    let status = words.next().unwrap_or_default().trim_end_matches(',');

    if !callsign.eq_ignore_ascii_case(station.as_str()) {
        warn!(%response, expected = %station, "login response names a different station");
    }
    match status {
        "verified" => Ok(()),
        _ => Err(LinkError::LoginRejected(response.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aprsbot_models::MessageBody;
    use tokio::net::TcpListener;

    fn config_for(port: u16) -> LinkConfig {
        LinkConfig::new(AprsCredentials::new("W1AW", "12345").unwrap())
            .with_server("127.0.0.1", port)
            .with_login_timeout(Duration::from_secs(2))
    }

    /// Accept one client, read its login line and answer with `logresp`.
    async fn fake_server(
        logresp: &'static str,
    ) -> (u16, tokio::task::JoinHandle<(String, BufReader<OwnedReadHalf>, OwnedWriteHalf)>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut reader = BufReader::new(reader);
            writer
                .write_all(b"# aprsc 2.1.19-g730c5c0\r\n")
                .await
                .unwrap();
            let mut login = String::new();
            reader.read_line(&mut login).await.unwrap();
            writer.write_all(logresp.as_bytes()).await.unwrap();
            (login, reader, writer)
        });
        (port, handle)
    }

    #[test]
    fn decode_line_skips_noise() {
        assert!(decode_line(b"# aprsc keepalive\r\n").is_none());
        assert!(decode_line(b"\r\n").is_none());
        assert!(decode_line(b"garbage\r\n").is_none());
        assert!(decode_line(&[0xff, 0xfe, b'\n']).is_none());
        let packet = decode_line(b"N0CALL>APRS:>status\r\n").unwrap();
        assert_eq!(packet.source.as_str(), "N0CALL");
    }

    #[tokio::test]
    async fn cancelled_recv_keeps_partial_line() {
        let (port, server) = fake_server("# logresp W1AW verified, server TEST\r\n").await;
        let link = AprsIsLink::connect(&config_for(port)).await.unwrap();
        let (_login, _server_reader, mut server_writer) = server.await.unwrap();

        server_writer.write_all(b"N0CALL>APRS:>sta").await.unwrap();
        let first = tokio::time::timeout(Duration::from_millis(50), link.recv()).await;
        assert!(first.is_err(), "incomplete line must not yield a packet");

        server_writer.write_all(b"tus\r\n").await.unwrap();
        let packet = link.recv().await.unwrap();
        assert_eq!(packet.payload, aprsbot_models::PacketPayload::Other(">status".into()));
    }

    #[tokio::test]
    async fn oversized_line_is_discarded() {
        let (port, server) = fake_server("# logresp W1AW verified, server TEST\r\n").await;
        let link = AprsIsLink::connect(&config_for(port)).await.unwrap();
        let (_login, _server_reader, mut server_writer) = server.await.unwrap();

        let flood = vec![b'x'; 8 * 1024];
        server_writer.write_all(&flood).await.unwrap();
        let pending = tokio::time::timeout(Duration::from_millis(100), link.recv()).await;
        assert!(pending.is_err(), "unterminated input must not yield a packet");
        assert!(link.reader.lock().await.line.len() < MAX_LINE_LEN);

        // The tail of the oversized line must not be decoded as a packet.
        server_writer
            .write_all(b"N0CALL>APRS:>tail of flood\r\nKG5YOV>APRS,TCPIP*::W1AW     :ack1\r\n")
            .await
            .unwrap();
        let packet = link.recv().await.unwrap();
        assert_eq!(packet.source.as_str(), "KG5YOV");
        assert_eq!(packet.message().unwrap().body, MessageBody::Ack("1".into()));
    }

    #[tokio::test]
    async fn transmit_refuses_line_breaks() {
        let (port, server) = fake_server("# logresp W1AW verified, server TEST\r\n").await;
        let link = AprsIsLink::connect(&config_for(port)).await.unwrap();
        let _server_side = server.await.unwrap();

        let err = link
            .transmit("W1AW>APZMNT,TCPIP::KG5YOV   :hi\r\nW1AW>APZMNT,TCPIP::N0CALL   :x{1")
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::Io(ref e) if e.kind() == std::io::ErrorKind::InvalidInput));
    }

    #[test]
    fn login_command_with_filter() {
        let config = config_for(14580).with_filter(RangeFilter::new(47.0, -122.0, 62.137).unwrap());
        let login = build_login_command(&config);
        assert_eq!(
            login,
            format!(
                "user W1AW pass 12345 vers aprsbot {} filter r/47/-122/100\r\n",
                env!("CARGO_PKG_VERSION")
            )
        );
    }

    #[test]
    fn login_command_without_filter() {
        let login = build_login_command(&config_for(14580));
        assert!(login.starts_with("user W1AW pass 12345 vers aprsbot "));
        assert!(!login.contains("filter"));
        assert!(login.ends_with("\r\n"));
    }

    #[test]
    fn redacted_login_hides_passcode() {
        let login = build_login_command(&config_for(14580));
        let redacted = redact_login(&login, "12345");
        assert!(!redacted.contains("12345"));
        assert!(redacted.starts_with("user W1AW pass ***** vers"));
    }

    #[test]
    fn login_response_verified_and_unverified() {
        let station = Callsign::parse("W1AW").unwrap();
        assert!(check_login_response("# logresp W1AW verified, server T2TEXAS", &station).is_ok());
        let err = check_login_response("# logresp W1AW unverified, server T2TEXAS", &station).unwrap_err();
        assert!(matches!(err, LinkError::LoginRejected(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn connect_transmit_and_receive() {
        let (port, server) = fake_server("# logresp W1AW verified, server TEST\r\n").await;
        let link = AprsIsLink::connect(&config_for(port)).await.unwrap();
        let (login, mut server_reader, mut server_writer) = server.await.unwrap();
        assert!(login.starts_with("user W1AW pass 12345"));
        assert_eq!(link.station().as_str(), "W1AW");

        link.transmit("W1AW>APZMNT,TCPIP::KG5YOV   :hello{1").await.unwrap();
        let mut sent = String::new();
        server_reader.read_line(&mut sent).await.unwrap();
        assert_eq!(sent, "W1AW>APZMNT,TCPIP::KG5YOV   :hello{1\r\n");

        server_writer
            .write_all(b"# keepalive\r\ngarbage line\r\nKG5YOV>APDR16,TCPIP*,qAC,T2TEXAS::W1AW     :ack1\r\n")
            .await
            .unwrap();
        let packet = link.recv().await.unwrap();
        assert_eq!(packet.source.as_str(), "KG5YOV");
        assert_eq!(packet.message().unwrap().body, MessageBody::Ack("1".into()));
    }

    #[tokio::test]
    async fn feed_ends_when_server_disconnects() {
        let (port, server) = fake_server("# logresp W1AW verified, server TEST\r\n").await;
        let link = AprsIsLink::connect(&config_for(port)).await.unwrap();
        drop(server.await.unwrap());
        assert!(link.recv().await.is_none());
        assert!(link.is_closed());
        assert!(link.recv().await.is_none());
    }

    #[tokio::test]
    async fn close_ends_a_pending_recv_and_blocks_transmit() {
        let (port, server) = fake_server("# logresp W1AW verified, server TEST\r\n").await;
        let link = std::sync::Arc::new(AprsIsLink::connect(&config_for(port)).await.unwrap());
        let _server_side = server.await.unwrap();

        let receiver = {
            let link = link.clone();
            tokio::spawn(async move { link.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        link.close().await;
        link.close().await;

        let received = tokio::time::timeout(Duration::from_secs(1), receiver)
            .await
            .expect("recv should return after close")
            .unwrap();
        assert!(received.is_none());
        assert!(matches!(link.transmit("x").await, Err(LinkError::Closed)));
    }

    #[tokio::test]
    async fn unverified_login_is_fatal() {
        let (port, _server) = fake_server("# logresp W1AW unverified, server TEST\r\n").await;
        let err = AprsIsLink::connect(&config_for(port)).await.err().unwrap();
        assert!(matches!(err, LinkError::LoginRejected(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_retryable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let err = AprsIsLink::connect(&config_for(port)).await.err().unwrap();
        assert!(err.is_retryable(), "unexpected error: {err}");
    }
}
