//! Connection handling shared by the relay server and the client.
//!
//! [`Connection`] wraps a TCP stream in the wire codec and exposes
//! packet-level `send`/`recv`. Endpoints that read and write from
//! different tasks call [`Connection::split`] and hand each half to
//! its own task.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;

use crate::error::GlimtError;
use crate::protocol::{DEFAULT_PORT, Packet, WireCodec};

/// Peer identity, kept alongside each half after a split so log lines
/// and membership broadcasts can name the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    ip: String,
    port: u16,
}

impl ConnectionInfo {
    pub fn new(ip: String, port: u16) -> Self {
        Self { ip, port }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl std::fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// A packet-framed TCP connection.
#[derive(Debug)]
pub struct Connection {
    framed: Framed<TcpStream, WireCodec>,
    info: ConnectionInfo,
}

impl Connection {
    /// Dial `addr` and frame the resulting stream.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, GlimtError> {
        let stream = TcpStream::connect(addr).await?;
        Self::new(stream)
    }

    /// Frame an already-accepted stream.
    pub fn new(stream: TcpStream) -> Result<Self, GlimtError> {
        let peer = stream.peer_addr()?;
        let info = ConnectionInfo::new(peer.ip().to_string(), peer.port());
        Ok(Self {
            framed: Framed::new(stream, WireCodec),
            info,
        })
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub async fn send(&mut self, packet: Packet) -> Result<(), GlimtError> {
        self.framed.send(packet).await
    }

    /// Next packet, or `None` once the peer has closed cleanly.
    pub async fn recv(&mut self) -> Result<Option<Packet>, GlimtError> {
        self.framed.next().await.transpose()
    }

    /// Split into independently owned read and write halves.
    pub fn split(self) -> (ConnectionReader, ConnectionWriter) {
        let (sink, stream) = self.framed.split();
        (
            ConnectionReader {
                inner: stream,
                info: self.info.clone(),
            },
            ConnectionWriter {
                inner: sink,
                info: self.info,
            },
        )
    }
}

pub struct ConnectionReader {
    inner: SplitStream<Framed<TcpStream, WireCodec>>,
    info: ConnectionInfo,
}

impl ConnectionReader {
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub async fn recv(&mut self) -> Result<Option<Packet>, GlimtError> {
        self.inner.next().await.transpose()
    }
}

pub struct ConnectionWriter {
    inner: SplitSink<Framed<TcpStream, WireCodec>, Packet>,
    info: ConnectionInfo,
}

impl ConnectionWriter {
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub async fn send(&mut self, packet: Packet) -> Result<(), GlimtError> {
        self.inner.send(packet).await
    }

    /// Flush and shut down the write side.
    pub async fn close(&mut self) -> Result<(), GlimtError> {
        self.inner.close().await
    }
}

/// Normalize a user-supplied server address.
///
/// Input that already ends in `:<u16>` passes through untouched;
/// anything else gets the default port appended. Bracketed IPv6
/// literals work either way (`[::1]` becomes `[::1]:8999`).
pub fn resolve_addr(input: &str) -> String {
    if let Some((_, tail)) = input.rsplit_once(':') {
        if tail.parse::<u16>().is_ok() {
            return input.to_string();
        }
    }
    format!("{input}:{DEFAULT_PORT}")
}
