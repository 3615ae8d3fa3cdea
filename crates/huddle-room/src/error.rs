//! Error types for the room layer.

use huddle_protocol::RoomId;
use huddle_session::SessionError;

/// Errors that can occur during room operations.
///
/// The `Display` text is sent to clients verbatim in error replies.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist and the join may not create it.
    #[error("Room does not exist: {0}")]
    NotFound(RoomId),

    /// The room is at capacity.
    #[error("Room is full: {0}")]
    RoomFull(RoomId),

    /// The room name is empty.
    #[error("Invalid room id")]
    InvalidRoomId,

    /// The peer is unknown or not ready.
    #[error(transparent)]
    Session(#[from] SessionError),
}
