//! Room configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// JoinMode
// ---------------------------------------------------------------------------

/// What a `join` request does when the room does not exist yet.
///
/// A `create` request always creates; only `join` is affected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    /// Create the room on first join.
    #[default]
    Create,

    /// Refuse to join a room nobody has created.
    Existing,
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Existing => f.write_str("existing"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Maximum members per room. 0 means unlimited.
    pub max_members: usize,

    /// Whether `join` may create missing rooms.
    pub join_mode: JoinMode,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_members: 0,
            join_mode: JoinMode::Create,
        }
    }
}

impl RoomConfig {
    /// Returns `true` if a room with `members` members cannot take one more.
    pub fn is_full(&self, members: usize) -> bool {
        self.max_members != 0 && members >= self.max_members
    }
}
