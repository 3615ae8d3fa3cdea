//! Wire protocol for huddle.
//!
//! - **Framing** ([`FrameCodec`], [`StreamDecoder`]): length-prefixed
//!   frames with a type byte and a trailing checksum.
//! - **Obfuscation** ([`Cipher`]): a keyed XOR over the payload. Not
//!   encryption; see the module docs.
//! - **Packets** ([`Packet`], [`PacketType`], [`Payload`]): what a frame
//!   carries once the framing is stripped.
//! - **Messages** ([`RoomRequest`], [`RoomEvent`], ...): the JSON bodies
//!   the relay itself understands.
//!
//! ```text
//! Transport (bytes) → StreamDecoder (frames) → Relay (packets)
//! ```

mod cipher;
mod codec;
mod error;
mod packet;
mod types;

pub use cipher::{checksum, Cipher, KEY_LEN};
pub use codec::{
    decode_frames, encode_frame, Decoded, DecodedFrame, FrameCodec, StreamDecoder,
    HEADER_LEN,
};
pub use error::ProtocolError;
pub use packet::{Packet, PacketType, Payload};
pub use types::{
    Handshake, HandshakeAck, Notice, PeerId, PeerInfo, RoomEvent, RoomId, RoomRequest,
    FROM_FIELD, TARGET_FIELD,
};
