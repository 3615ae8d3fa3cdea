//! The connection registry: every live session, keyed by peer id.
//!
//! # Concurrency note
//!
//! `ConnectionRegistry` is a plain `HashMap` and is not thread-safe by
//! itself. The relay keeps it behind one mutex together with the room
//! map, so that a lookup and the sends that follow it observe the same
//! membership.

use std::collections::HashMap;

use huddle_protocol::{Packet, PeerId};
use huddle_transport::ConnectionId;
use rand::Rng;

use crate::{Outbox, Session, SessionError, SessionState};

/// Length of a generated peer id.
pub const PEER_ID_LEN: usize = 9;

const ID_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Tracks every connected peer.
///
/// ## Lifecycle
///
/// ```text
/// register() ──→ mark_handshaken() ──→ (room layer) ──→ unregister()
///     │                                                     ↑
///     └──────────────── transport closes early ─────────────┘
/// ```
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: HashMap<PeerId, Session>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted connection and returns its new peer id.
    ///
    /// The id is random and unique among live sessions.
    pub fn register(&mut self, conn_id: ConnectionId, outbox: Outbox) -> PeerId {
        let mut rng = rand::rng();
        let peer_id = loop {
            let candidate = generate_peer_id(&mut rng);
            if !self.sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        self.sessions.insert(
            peer_id.clone(),
            Session::new(peer_id.clone(), conn_id, outbox),
        );
        tracing::debug!(%peer_id, %conn_id, "session registered");
        peer_id
    }

    /// Removes a session, returning it if it was present.
    ///
    /// Idempotent: removing an unknown or already-removed peer is a no-op.
    /// Dropping the returned session drops its [`Outbox`], which ends the
    /// connection's writer once the queue drains.
    pub fn unregister(&mut self, peer_id: &PeerId) -> Option<Session> {
        let session = self.sessions.remove(peer_id);
        if session.is_some() {
            tracing::debug!(%peer_id, "session unregistered");
        }
        session
    }

    /// Looks up a session by peer id.
    pub fn get(&self, peer_id: &PeerId) -> Option<&Session> {
        self.sessions.get(peer_id)
    }

    /// Looks up a session by peer id for modification.
    pub fn get_mut(&mut self, peer_id: &PeerId) -> Option<&mut Session> {
        self.sessions.get_mut(peer_id)
    }

    /// Looks up a session by the id string a client supplied, for
    /// instance a signaling `targetId`.
    pub fn find(&self, display_id: &str) -> Option<&Session> {
        self.sessions.get(&PeerId::from(display_id))
    }

    /// Queues a packet for a peer.
    ///
    /// Returns `false` if the peer is unknown or its writer has already
    /// gone away. Neither case is an error for the caller: the peer is
    /// disconnecting and its own cleanup will run shortly.
    pub fn send(&self, peer_id: &PeerId, packet: Packet) -> bool {
        let Some(session) = self.sessions.get(peer_id) else {
            tracing::debug!(%peer_id, "send to unknown peer dropped");
            return false;
        };
        match session.outbox.send(packet) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!(%peer_id, "send to closed outbox dropped");
                false
            }
        }
    }

    /// Moves a peer out of [`SessionState::Connected`] and optionally sets
    /// its display name.
    ///
    /// Calling this again on a handshaken peer only updates the name; the
    /// peer keeps its room.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the peer is not registered.
    pub fn mark_handshaken(
        &mut self,
        peer_id: &PeerId,
        name: Option<String>,
    ) -> Result<&Session, SessionError> {
        let session = self
            .sessions
            .get_mut(peer_id)
            .ok_or_else(|| SessionError::NotFound(peer_id.clone()))?;

        if session.state == SessionState::Connected {
            session.state = SessionState::Handshaken;
        }
        if let Some(name) = name {
            session.name = name;
        }
        Ok(session)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no peer is connected.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Every live peer id, sorted.
    pub fn peer_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drops every session. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.sessions.len();
        self.sessions.clear();
        count
    }
}

/// Generates a random base-36 id of [`PEER_ID_LEN`] characters.
fn generate_peer_id(rng: &mut impl Rng) -> PeerId {
    let id = (0..PEER_ID_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect();
    PeerId(id)
}

// =========================================================================
// Tests
// =========================================================================
