//! Unified error type for huddle.

use huddle_protocol::ProtocolError;
use huddle_room::RoomError;
use huddle_session::SessionError;
use huddle_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, oversized frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (unknown peer, missing handshake).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (not found, full).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Reading the configuration file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Both listeners are disabled.
    #[error("no listener configured: enable tcp, websocket, or both")]
    NoListeners,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::SendFailed(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "gone",
        ));
        let huddle_err: HuddleError = err.into();
        assert!(matches!(huddle_err, HuddleError::Transport(_)));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let huddle_err: HuddleError = err.into();
        assert!(matches!(huddle_err, HuddleError::Protocol(_)));
        assert!(huddle_err.to_string().contains("bad"));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::NotFound("abc".into());
        let huddle_err: HuddleError = err.into();
        assert!(matches!(huddle_err, HuddleError::Session(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::NotFound("lobby".into());
        let huddle_err: HuddleError = err.into();
        assert!(matches!(huddle_err, HuddleError::Room(_)));
        assert_eq!(huddle_err.to_string(), "Room does not exist: lobby");
    }

    #[test]
    fn test_from_toml_error() {
        let err = toml::from_str::<toml::Value>("= nope").unwrap_err();
        let huddle_err: HuddleError = err.into();
        assert!(matches!(huddle_err, HuddleError::Config(_)));
    }
}
