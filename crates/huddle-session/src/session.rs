//! Session types: the relay's record of one connected peer.

use std::time::Instant;

use huddle_protocol::{Packet, PeerId, RoomId};
use huddle_transport::ConnectionId;
use tokio::sync::mpsc;

/// Name shown to other peers when a client never sent one.
pub const DEFAULT_DISPLAY_NAME: &str = "Guest";

/// Where packets for a peer are queued. The connection's writer task
/// owns the receiving end.
///
/// Unbounded so that enqueueing never waits: fan-out happens while the
/// registry lock is held and must not block on a slow peer.
pub type Outbox = mpsc::UnboundedSender<Packet>;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a peer is in its lifecycle.
///
/// ```text
///   Connected ──(HANDSHAKE)──→ Handshaken ──(join)──→ InRoom(room)
///                                  ↑                     │
///                                  └───────(leave)───────┘
/// ```
///
/// `InRoom` → `InRoom` happens when a peer joins a different room; the
/// old room is left first. Closing the transport ends the session from
/// any state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Transport accepted, no handshake yet.
    Connected,

    /// Handshake acknowledged, not in any room.
    Handshaken,

    /// Member of exactly one room.
    InRoom(RoomId),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single connected peer.
#[derive(Debug, Clone)]
pub struct Session {
    /// The relay-assigned identifier other peers address.
    pub peer_id: PeerId,

    /// The transport-level connection this session rides on.
    pub conn_id: ConnectionId,

    /// Display name for peer lists and notifications.
    pub name: String,

    /// Current lifecycle state.
    pub state: SessionState,

    /// Outbound packet queue.
    pub outbox: Outbox,

    /// When the transport was accepted.
    pub connected_at: Instant,
}

impl Session {
    /// Creates a fresh session in [`SessionState::Connected`].
    pub fn new(peer_id: PeerId, conn_id: ConnectionId, outbox: Outbox) -> Self {
        Self {
            peer_id,
            conn_id,
            name: DEFAULT_DISPLAY_NAME.to_owned(),
            state: SessionState::Connected,
            outbox,
            connected_at: Instant::now(),
        }
    }

    /// Whether the handshake has been acknowledged.
    pub fn is_handshaken(&self) -> bool {
        !matches!(self.state, SessionState::Connected)
    }

    /// The room this peer is in, if any.
    pub fn room(&self) -> Option<&RoomId> {
        match &self.state {
            SessionState::InRoom(room_id) => Some(room_id),
            _ => None,
        }
    }
}
