//! A single room: a name and its members in join order.

use std::time::Instant;

use huddle_protocol::{PeerId, RoomId};

/// One room.
///
/// Members are kept in join order, which is the order peer lists are
/// reported in. Rooms are small, so a `Vec` beats a set here.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    members: Vec<PeerId>,
    created_at: Instant,
}

impl Room {
    /// Creates an empty room.
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            members: Vec::new(),
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Members in join order.
    pub fn members(&self) -> &[PeerId] {
        &self.members
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.members.contains(peer_id)
    }

    /// Appends a member. Adding an existing member is a no-op.
    pub fn add(&mut self, peer_id: PeerId) {
        if !self.contains(&peer_id) {
            self.members.push(peer_id);
        }
    }

    /// Removes a member. Returns `false` if it was not a member.
    pub fn remove(&mut self, peer_id: &PeerId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != peer_id);
        self.members.len() != before
    }
}
