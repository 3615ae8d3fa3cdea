//! Room manager: room name → members.
//!
//! Knows nothing about sessions. The [`Registry`](crate::Registry) keeps
//! each peer's current room on its session and calls in here.

use std::collections::HashMap;

use huddle_protocol::{PeerId, RoomId};

use crate::{Room, RoomConfig, RoomError};

/// Manages all live rooms.
///
/// Invariants: no room is ever empty (the last leave removes it), and a
/// peer appears at most once per room.
#[derive(Debug, Default)]
pub struct RoomManager {
    rooms: HashMap<RoomId, Room>,
    config: RoomConfig,
}

impl RoomManager {
    /// Creates an empty room manager.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            config,
        }
    }

    /// Checks whether `peer_id` could join `room_id` without changing
    /// anything.
    ///
    /// # Errors
    /// - [`RoomError::InvalidRoomId`] for an empty name
    /// - [`RoomError::NotFound`] if the room is missing and `allow_create`
    ///   is false
    /// - [`RoomError::RoomFull`] if the room is at capacity
    pub fn check_join(
        &self,
        room_id: &RoomId,
        peer_id: &PeerId,
        allow_create: bool,
    ) -> Result<(), RoomError> {
        if room_id.as_str().is_empty() {
            return Err(RoomError::InvalidRoomId);
        }
        match self.rooms.get(room_id) {
            None if !allow_create => Err(RoomError::NotFound(room_id.clone())),
            None => Ok(()),
            Some(room) if room.contains(peer_id) => Ok(()),
            Some(room) if self.config.is_full(room.len()) => {
                Err(RoomError::RoomFull(room_id.clone()))
            }
            Some(_) => Ok(()),
        }
    }

    /// Adds a peer to a room, creating the room if allowed.
    ///
    /// Returns the members that were already there, in join order and
    /// excluding `peer_id`, plus whether the room was created.
    ///
    /// # Errors
    /// As for [`check_join`](Self::check_join). Nothing changes on error.
    pub fn join(
        &mut self,
        room_id: &RoomId,
        peer_id: &PeerId,
        allow_create: bool,
    ) -> Result<(Vec<PeerId>, bool), RoomError> {
        self.check_join(room_id, peer_id, allow_create)?;

        let created = !self.rooms.contains_key(room_id);
        let room = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| Room::new(room_id.clone()));
        if created {
            tracing::info!(%room_id, "room created");
        }

        let existing = room
            .members()
            .iter()
            .filter(|m| *m != peer_id)
            .cloned()
            .collect();
        room.add(peer_id.clone());
        Ok((existing, created))
    }

    /// Removes a peer from a room.
    ///
    /// Returns the members that remain, or `None` if the peer was not in
    /// the room. The room is removed once it is empty.
    pub fn leave(&mut self, room_id: &RoomId, peer_id: &PeerId) -> Option<Vec<PeerId>> {
        let room = self.rooms.get_mut(room_id)?;
        if !room.remove(peer_id) {
            return None;
        }

        let remaining = room.members().to_vec();
        if room.is_empty() {
            let lifetime = room.created_at().elapsed();
            self.rooms.remove(room_id);
            tracing::info!(%room_id, ?lifetime, "room removed (empty)");
        }
        Some(remaining)
    }

    /// Members of a room in join order; empty if the room does not exist.
    pub fn members_of(&self, room_id: &RoomId) -> Vec<PeerId> {
        self.rooms
            .get(room_id)
            .map(|room| room.members().to_vec())
            .unwrap_or_default()
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Names of every live room, sorted.
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Removes every room.
    pub fn clear(&mut self) {
        self.rooms.clear();
    }
}

// =========================================================================
// Tests
// =========================================================================
