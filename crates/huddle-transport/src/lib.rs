//! Transport abstraction layer for huddle.
//!
//! [`Transport`] and [`Connection`] hide which of two socket kinds a peer
//! reached the relay through:
//!
//! - [`TcpTransport`]: a raw bidirectional byte stream. Reads may return
//!   any fragment of the sender's writes, including several frames at
//!   once or half a frame.
//! - [`WebSocketTransport`]: a discrete-message stream where each
//!   message already carries exactly one frame.
//!
//! The relay never looks at which one it is talking to. Both hand raw
//! chunks of bytes to the packet decoder, which tolerates either shape.
//!
//! Accepting is split in two. [`Transport::accept`] only takes the socket
//! from the OS; [`Incoming::establish`] performs whatever handshake the
//! transport needs and may wait on the peer.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
mod tcp;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use tcp::{TcpConnection, TcpIncoming, TcpTransport};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketIncoming, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared by every listener in the process so a TCP and a WebSocket
/// connection never get the same id.
static CONNECTION_SEQ: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_connection_id() -> ConnectionId {
    ConnectionId(CONNECTION_SEQ.fetch_add(1, Ordering::Relaxed))
}

/// Numeric handle for an accepted socket, allocated in accept order.
///
/// Only used to correlate log lines. The relay addresses peers by the
/// identifier it hands out at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A bound listener handing out connections.
///
/// The futures are `Send` so a server can drive any listener from a
/// spawned task without knowing its concrete type.
pub trait Transport: Send + Sync + 'static {
    type Incoming: Incoming;

    /// Resolves as soon as the OS hands over a socket. Nothing is read
    /// from the peer here, so a silent client cannot stall the listener.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Incoming, TransportError>> + Send;

    /// The bound address. Useful when binding to port 0.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// An accepted socket whose transport handshake has not run yet.
///
/// `establish` may wait on the peer (the WebSocket upgrade does), so it
/// belongs in the connection's own task, under a timeout.
pub trait Incoming: Send + 'static {
    type Connection: Connection;

    /// Completes setup and yields the usable connection.
    fn establish(
        self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;

    fn peer_addr(&self) -> SocketAddr;
}

/// One accepted peer socket.
///
/// Every method takes `&self`: the reader task parks in `recv` while a
/// writer task pushes encoded frames through `send` on the same handle.
pub trait Connection: Send + Sync + 'static {
    /// Writes one already-encoded frame.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Yields the next chunk of inbound bytes.
    ///
    /// For a byte stream this is whatever the socket returned; for a
    /// message stream it is one whole message. `Ok(None)` means the peer
    /// hung up.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Shuts down the outbound side.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn id(&self) -> ConnectionId;
}
