//! Identifiers and the JSON message shapes carried inside packets.
//!
//! Field names follow the camelCase the browser clients already speak
//! (`roomId`, `clientId`, `peerId`, `targetId`). Signaling bodies are
//! deliberately absent: offers, answers and candidates are relayed as
//! opaque JSON objects and never given a Rust type.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The relay-assigned identifier of a connected peer.
///
/// This is the `clientId` a peer learns in its handshake acknowledgment,
/// and the `targetId` other peers use to address it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// A room name, chosen by the clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Returns the room name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Client → relay, on [`PacketType::Handshake`](crate::PacketType::Handshake).
///
/// Every field is optional; an empty or non-JSON handshake body is fine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Display name to use until a join request says otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form client identification, logged only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// Relay → client: `{"status":"ok","clientId":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeAck {
    pub status: String,
    #[serde(rename = "clientId")]
    pub client_id: PeerId,
}

impl HandshakeAck {
    /// A successful acknowledgment for `client_id`.
    pub fn ok(client_id: PeerId) -> Self {
        Self {
            status: "ok".into(),
            client_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Room control
// ---------------------------------------------------------------------------

/// Client → relay, on [`PacketType::RoomControl`](crate::PacketType::RoomControl).
///
/// ```json
/// {"action":"join","roomId":"lobby","name":"alice"}
/// {"action":"create","roomId":"lobby"}
/// {"action":"leave"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum RoomRequest {
    /// Join a room. Whether a missing room is created depends on the
    /// relay's join mode.
    Join {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Join a room, creating it if missing, regardless of join mode.
    Create {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Leave the current room.
    Leave,
}

/// One entry of the peer list sent on join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    #[serde(rename = "clientId")]
    pub client_id: PeerId,
    pub name: String,
}

/// Relay → client membership events, on `RoomControl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum RoomEvent {
    /// Sent to the joiner. `peers` lists everyone who was already in the
    /// room, excluding the joiner.
    Joined {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "clientId")]
        client_id: PeerId,
        peers: Vec<PeerInfo>,
    },
    /// Sent to a peer that explicitly asked to leave.
    Left {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    /// Sent to every other member when someone joins.
    PeerJoined {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Sent to every remaining member when someone leaves or disconnects.
    PeerLeft {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
    },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Relay → client: `{"type":"error","message":"..."}`.
///
/// Sent back on the same packet type as the request that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Notice {
    Error { message: String },
}

impl Notice {
    /// Shorthand for an error notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Signaling routing fields
// ---------------------------------------------------------------------------

/// Key naming the single recipient of a signaling message.
pub const TARGET_FIELD: &str = "targetId";

/// Key the relay adds to every relayed signaling message.
pub const FROM_FIELD: &str = "from";
