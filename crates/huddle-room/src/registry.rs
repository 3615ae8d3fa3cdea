//! Sessions and rooms behind one owner.
//!
//! A peer's room lives in two places: on its session
//! ([`SessionState::InRoom`]) and in the room's member list. Every
//! operation here updates both before returning, so a caller holding the
//! registry never observes them disagreeing.

use huddle_protocol::{Packet, PeerId, PeerInfo, RoomId};
use huddle_session::{
    ConnectionRegistry, Outbox, Session, SessionError, SessionState,
};
use huddle_transport::ConnectionId;

use crate::{RoomConfig, RoomError, RoomManager};

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The room joined.
    pub room_id: RoomId,
    /// Who was already there, in join order, excluding the joiner.
    pub peers: Vec<PeerInfo>,
    /// The room the peer was moved out of, if it was somewhere else.
    pub previous: Option<LeaveOutcome>,
    /// The peer was already a member; nothing changed.
    pub rejoined: bool,
}

/// Result of leaving a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// The room left.
    pub room_id: RoomId,
    /// Members still in the room. Empty means the room is gone.
    pub remaining: Vec<PeerId>,
}

/// Result of unregistering a peer.
#[derive(Debug)]
pub struct Departure {
    /// The removed session. Dropping it closes the peer's outbox.
    pub session: Session,
    /// The room the peer was in when it went away.
    pub left: Option<LeaveOutcome>,
}

/// The relay's shared state: every session and every room.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: ConnectionRegistry,
    rooms: RoomManager,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            sessions: ConnectionRegistry::new(),
            rooms: RoomManager::new(config),
        }
    }

    /// Read access to the sessions.
    pub fn sessions(&self) -> &ConnectionRegistry {
        &self.sessions
    }

    /// Registers a new connection. See [`ConnectionRegistry::register`].
    pub fn register(&mut self, conn_id: ConnectionId, outbox: Outbox) -> PeerId {
        self.sessions.register(conn_id, outbox)
    }

    /// Completes a peer's handshake. See
    /// [`ConnectionRegistry::mark_handshaken`].
    pub fn mark_handshaken(
        &mut self,
        peer_id: &PeerId,
        name: Option<String>,
    ) -> Result<&Session, SessionError> {
        self.sessions.mark_handshaken(peer_id, name)
    }

    /// Removes a peer entirely: out of its room, then out of the session
    /// map.
    ///
    /// Idempotent: returns `None` if the peer is already gone.
    pub fn unregister(&mut self, peer_id: &PeerId) -> Option<Departure> {
        let left = self.leave_room(peer_id);
        let session = self.sessions.unregister(peer_id)?;
        Some(Departure { session, left })
    }

    /// Puts a peer into `room_id`, leaving its current room first.
    ///
    /// `name`, if given, replaces the peer's display name. With
    /// `allow_create` false a missing room is an error. A failed join
    /// leaves the peer where it was.
    ///
    /// # Errors
    /// - [`RoomError::Session`] if the peer is unknown or has not
    ///   completed its handshake
    /// - whatever [`RoomManager::check_join`] reports
    pub fn join_room(
        &mut self,
        peer_id: &PeerId,
        room_id: &RoomId,
        name: Option<String>,
        allow_create: bool,
    ) -> Result<JoinOutcome, RoomError> {
        let session = self
            .sessions
            .get(peer_id)
            .ok_or_else(|| SessionError::NotFound(peer_id.clone()))?;
        if !session.is_handshaken() {
            return Err(SessionError::NotHandshaken(peer_id.clone()).into());
        }
        let rejoined = session.room() == Some(room_id);

        if !rejoined {
            self.rooms.check_join(room_id, peer_id, allow_create)?;
        }
        if let (Some(name), Some(session)) = (name, self.sessions.get_mut(peer_id)) {
            session.name = name;
        }

        if rejoined {
            let peers = self.peer_infos(room_id, peer_id);
            return Ok(JoinOutcome {
                room_id: room_id.clone(),
                peers,
                previous: None,
                rejoined: true,
            });
        }

        let previous = self.leave_room(peer_id);
        let (existing, created) = self.rooms.join(room_id, peer_id, allow_create)?;
        if let Some(session) = self.sessions.get_mut(peer_id) {
            session.state = SessionState::InRoom(room_id.clone());
        }
        tracing::info!(
            %peer_id,
            %room_id,
            created,
            members = existing.len() + 1,
            "peer joined room"
        );

        Ok(JoinOutcome {
            room_id: room_id.clone(),
            peers: self.infos(&existing),
            previous,
            rejoined: false,
        })
    }

    /// Takes a peer out of its current room.
    ///
    /// Idempotent: returns `None` if the peer is unknown or in no room.
    pub fn leave_room(&mut self, peer_id: &PeerId) -> Option<LeaveOutcome> {
        let session = self.sessions.get_mut(peer_id)?;
        let SessionState::InRoom(room_id) = &session.state else {
            return None;
        };
        let room_id = room_id.clone();
        session.state = SessionState::Handshaken;

        let remaining = self.rooms.leave(&room_id, peer_id).unwrap_or_default();
        tracing::info!(%peer_id, %room_id, remaining = remaining.len(), "peer left room");
        Some(LeaveOutcome { room_id, remaining })
    }

    /// Members of a room in join order.
    pub fn members_of(&self, room_id: &RoomId) -> Vec<PeerId> {
        self.rooms.members_of(room_id)
    }

    /// Looks up a peer by the id string a client supplied.
    pub fn find_by_display_id(&self, display_id: &str) -> Option<&Session> {
        self.sessions.find(display_id)
    }

    /// Queues a packet for one peer. See [`ConnectionRegistry::send`].
    pub fn send(&self, peer_id: &PeerId, packet: Packet) -> bool {
        self.sessions.send(peer_id, packet)
    }

    pub fn peer_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.room_count()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.room_ids()
    }

    /// Drops every room and session. Returns how many sessions were
    /// dropped; their writers see the end of their queues.
    pub fn shutdown(&mut self) -> usize {
        self.rooms.clear();
        self.sessions.clear()
    }

    /// Peer list for `room_id`, excluding `except`.
    fn peer_infos(&self, room_id: &RoomId, except: &PeerId) -> Vec<PeerInfo> {
        let others: Vec<PeerId> = self
            .rooms
            .members_of(room_id)
            .into_iter()
            .filter(|m| m != except)
            .collect();
        self.infos(&others)
    }

    fn infos(&self, ids: &[PeerId]) -> Vec<PeerInfo> {
        ids.iter()
            .filter_map(|id| self.sessions.get(id))
            .map(|s| PeerInfo {
                client_id: s.peer_id.clone(),
                name: s.name.clone(),
            })
            .collect()
    }
}
