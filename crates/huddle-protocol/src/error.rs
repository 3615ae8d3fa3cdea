//! Error types for the protocol layer.
//!
//! Note what is *not* here: an incomplete frame is not an error (the
//! bytes stay buffered until the rest arrives), and a checksum mismatch
//! is reported on the decoded frame rather than failing the decode.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing a payload to JSON failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// A JSON payload did not have the expected shape.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A frame carried a type byte outside the packet enum.
    #[error("unknown packet type {0}")]
    UnknownPacketType(u8),

    /// A frame is longer than the configured (or representable) maximum.
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Declared or requested frame body length.
        len: usize,
        /// The limit that was exceeded.
        max: usize,
    },

    /// The message is well-formed but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
