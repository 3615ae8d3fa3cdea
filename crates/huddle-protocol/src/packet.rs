//! The unit the relay works with: a typed packet carrying a payload.

use std::borrow::Cow;
use std::fmt;

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// PacketType
// ---------------------------------------------------------------------------

/// The one-byte type tag of a frame.
///
/// This is the single packet enum for every deployment. The values are
/// fixed on the wire; do not renumber them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// First packet on a connection; answered with the assigned id.
    Handshake = 1,
    /// Offer/answer/candidate negotiation, relayed opaquely.
    Signaling = 2,
    /// Room join/create/leave requests and membership events.
    RoomControl = 3,
    /// Liveness ping, echoed back.
    Keepalive = 4,
    /// Round-trip measurement, echoed back.
    Benchmark = 5,
}

impl PacketType {
    /// Returns the wire value of this type.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Handshake),
            2 => Ok(Self::Signaling),
            3 => Ok(Self::RoomControl),
            4 => Ok(Self::Keepalive),
            5 => Ok(Self::Benchmark),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Handshake => "HANDSHAKE",
            Self::Signaling => "SIGNALING",
            Self::RoomControl => "ROOM_CONTROL",
            Self::Keepalive => "KEEPALIVE",
            Self::Benchmark => "BENCHMARK",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// The body of a packet.
///
/// At the codec layer a payload is just bytes. Encoding accepts any of the
/// three shapes; decoding always yields [`Payload::Json`] when the bytes
/// parse as JSON and [`Payload::Text`] otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A structured value, serialized as JSON on the wire.
    Json(serde_json::Value),
    /// UTF-8 text, passed through unchanged.
    Text(String),
    /// Raw bytes, passed through unchanged.
    Bytes(Vec<u8>),
}

impl Payload {
    /// An empty payload.
    pub fn empty() -> Self {
        Self::Bytes(Vec::new())
    }

    /// Serializes any `Serialize` value into a JSON payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ProtocolError> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(ProtocolError::Encode)
    }

    /// Recovers a payload from decoded bytes: JSON if it parses, text if
    /// it does not. Never fails.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match serde_json::from_slice(bytes) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    /// Returns the bytes that go on the wire (before obfuscation).
    pub fn to_bytes(&self) -> Result<Cow<'_, [u8]>, ProtocolError> {
        match self {
            Self::Json(value) => serde_json::to_vec(value)
                .map(Cow::Owned)
                .map_err(ProtocolError::Encode),
            Self::Text(text) => Ok(Cow::Borrowed(text.as_bytes())),
            Self::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
        }
    }

    /// Returns the JSON value, if this is a JSON payload.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Deserializes a JSON payload into a typed message.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] for non-JSON payloads,
    /// [`ProtocolError::Decode`] when the JSON has the wrong shape.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        match self {
            Self::Json(value) => serde_json::from_value(value.clone())
                .map_err(ProtocolError::Decode),
            _ => Err(ProtocolError::InvalidMessage(
                "payload is not JSON".into(),
            )),
        }
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A typed packet: what one frame carries once the framing is stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Which handler the packet is for.
    pub kind: PacketType,
    /// The packet body.
    pub payload: Payload,
}

impl Packet {
    /// Creates a packet from anything convertible into a [`Payload`].
    pub fn new(kind: PacketType, payload: impl Into<Payload>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Creates a packet whose payload is `value` serialized as JSON.
    pub fn json<T: Serialize>(
        kind: PacketType,
        value: &T,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            kind,
            payload: Payload::json(value)?,
        })
    }
}
