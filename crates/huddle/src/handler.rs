//! Per-connection handler: byte stream in, packets to the relay, queued
//! packets back out.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`], plus a writer task that drains the peer's
//! outbox. The flow is:
//!   1. Register with the relay → peer id and outbox
//!   2. Loop: read a chunk → decode whole frames → dispatch in order
//!   3. On close, error, idle timeout, oversized frame, or shutdown:
//!      disconnect from the relay, let the writer drain, close

use std::sync::Arc;
use std::time::Duration;

use huddle_protocol::{FrameCodec, Packet, PeerId, ProtocolError, StreamDecoder};
use huddle_transport::{Connection, TransportError};
use tokio::sync::mpsc;

use crate::{HuddleError, Relay};

/// How long the writer gets to flush queued packets after disconnect.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Disconnects a peer from the relay when the handler exits without
/// doing so itself (an early `?` or a panic).
///
/// `Drop` is synchronous, so cleanup runs in a spawned task.
struct DisconnectGuard {
    peer_id: PeerId,
    relay: Option<Arc<Relay>>,
}

impl DisconnectGuard {
    fn new(peer_id: PeerId, relay: Arc<Relay>) -> Self {
        Self {
            peer_id,
            relay: Some(relay),
        }
    }

    /// The handler disconnected explicitly; nothing left to do on drop.
    fn disarm(mut self) {
        self.relay = None;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let Some(relay) = self.relay.take() else {
            return;
        };
        let peer_id = self.peer_id.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                relay.disconnect(&peer_id).await;
            });
        }
    }
}

/// What one read produced.
enum Inbound {
    Data(Vec<u8>),
    Closed,
    Idle,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Connection>(
    conn: C,
    relay: Arc<Relay>,
) -> Result<(), HuddleError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();

    let mut shutdown = relay.subscribe_shutdown();
    if relay.is_shutting_down() {
        conn.close().await?;
        return Ok(());
    }

    let (outbox, queue) = mpsc::unbounded_channel();
    let peer_id = relay.connect(conn_id, outbox).await;
    let guard = DisconnectGuard::new(peer_id.clone(), Arc::clone(&relay));

    let codec = relay.config().codec();
    let mut writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        codec.clone(),
        queue,
        peer_id.clone(),
    ));
    let mut writer_done = false;

    let max_frame_len = relay.config().max_frame_len;
    let idle = relay.config().idle_timeout();
    let mut decoder = StreamDecoder::new(codec, max_frame_len);

    let result: Result<(), HuddleError> = loop {
        let inbound = tokio::select! {
            inbound = next_chunk(&*conn, idle) => inbound,
            _ = &mut writer, if !writer_done => {
                writer_done = true;
                tracing::debug!(%peer_id, "writer stopped, closing connection");
                break Ok(());
            }
            _ = shutdown.changed() => {
                tracing::debug!(%peer_id, "closing connection for shutdown");
                break Ok(());
            }
        };

        let data = match inbound {
            Ok(Inbound::Data(data)) => data,
            Ok(Inbound::Closed) => {
                tracing::debug!(%peer_id, "connection closed by peer");
                break Ok(());
            }
            Ok(Inbound::Idle) => {
                tracing::info!(%peer_id, "connection idle, closing");
                break Ok(());
            }
            Err(e) => break Err(e.into()),
        };

        for frame in decoder.feed(&data) {
            if !frame.checksum_ok {
                tracing::warn!(%peer_id, tag = frame.tag, "checksum mismatch");
            }
            match frame.into_packet() {
                Ok(packet) => relay.dispatch(&peer_id, packet).await,
                Err(e) => tracing::debug!(%peer_id, error = %e, "frame ignored"),
            }
        }

        if let Some(len) = decoder.oversized() {
            tracing::warn!(%peer_id, len, max = max_frame_len, "oversized frame, closing");
            break Err(ProtocolError::FrameTooLarge {
                len,
                max: max_frame_len,
            }
            .into());
        }
    };

    relay.disconnect(&peer_id).await;
    guard.disarm();

    // The session is gone, so the outbox is closed: the writer flushes
    // what is queued and exits.
    if !writer_done && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(%peer_id, error = %e, "close failed");
    }

    result
}

/// Reads one chunk, giving up after `idle` if set.
async fn next_chunk<C: Connection>(
    conn: &C,
    idle: Option<Duration>,
) -> Result<Inbound, TransportError> {
    let received = match idle {
        Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
            Ok(received) => received?,
            Err(_) => return Ok(Inbound::Idle),
        },
        None => conn.recv().await?,
    };
    Ok(match received {
        Some(data) => Inbound::Data(data),
        None => Inbound::Closed,
    })
}

/// Encodes and sends queued packets until the queue closes or a send
/// fails.
async fn write_loop<C: Connection>(
    conn: Arc<C>,
    codec: FrameCodec,
    mut queue: mpsc::UnboundedReceiver<Packet>,
    peer_id: PeerId,
) {
    while let Some(packet) = queue.recv().await {
        let frame = match codec.encode(&packet) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(%peer_id, kind = %packet.kind, error = %e, "failed to encode packet");
                continue;
            }
        };
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(%peer_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
}
