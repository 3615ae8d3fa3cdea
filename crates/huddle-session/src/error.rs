//! Error types for the session layer.

use huddle_protocol::PeerId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given peer. Either it never connected or
    /// it has already been unregistered.
    #[error("no session for peer {0}")]
    NotFound(PeerId),

    /// The peer has not completed its handshake yet.
    #[error("peer {0} has not completed the handshake")]
    NotHandshaken(PeerId),
}
