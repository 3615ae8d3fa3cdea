//! Raw TCP byte-stream transport.
//!
//! Unlike WebSocket, TCP has no notion of messages: a single `recv` may
//! return a fragment of one frame, exactly one frame, or several frames
//! glued together. The connection makes no attempt to re-align them; that
//! is the packet decoder's job.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::{next_connection_id, Connection, ConnectionId, Incoming, Transport, TransportError};

/// Size of the per-read scratch buffer.
const READ_CHUNK: usize = 8 * 1024;

/// A [`Transport`] that accepts plain TCP connections.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }
}

impl Transport for TcpTransport {
    type Incoming = TcpIncoming;

    async fn accept(&mut self) -> Result<TcpIncoming, TransportError> {
        let (stream, peer_addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        Ok(TcpIncoming { stream, peer_addr })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A freshly accepted TCP socket. Raw TCP has no handshake, so
/// establishing it never waits on the peer.
pub struct TcpIncoming {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl Incoming for TcpIncoming {
    type Connection = TcpConnection;

    async fn establish(self) -> Result<TcpConnection, TransportError> {
        let Self { stream, peer_addr } = self;

        // Signaling traffic is many tiny frames; Nagle would batch them
        // and add latency to every offer/answer round trip.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer_addr, error = %e, "failed to disable Nagle");
        }

        let id = next_connection_id();
        tracing::debug!(%id, %peer_addr, "accepted TCP connection");

        let (reader, writer) = stream.into_split();
        Ok(TcpConnection {
            id,
            peer_addr,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        })
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

/// A single TCP connection.
///
/// The read and write halves sit behind separate locks so that a pending
/// `recv` never delays an outbound `send`.
pub struct TcpConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpConnection {
    /// Returns the remote address of this connection.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl Connection for TcpConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.writer
            .lock()
            .await
            .write_all(data)
            .await
            .map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut buf = vec![0u8; READ_CHUNK];
        let n = self
            .reader
            .lock()
            .await
            .read(&mut buf)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
