//! Length-prefixed frame codec.
//!
//! ```text
//! ┌────────────┬──────────┬──────────────────────────────┬──────────┐
//! │ len: u32 BE│ type: u8 │ transform(payload)           │ checksum │
//! └────────────┴──────────┴──────────────────────────────┴──────────┘
//!                          └──────────── len bytes ─────────────────┘
//! ```
//!
//! The checksum is taken over the payload *before* the transform. An empty
//! payload is sent as a bare 5-byte header with `len = 0` and no checksum.
//!
//! Decoding is a pure function of its input. It consumes every complete
//! frame at the front of the buffer and hands back the tail that does not
//! yet form a whole frame; callers prepend that tail to the next chunk.
//! [`StreamDecoder`] does exactly that for one connection.

use bytes::{Buf, BytesMut};

use crate::cipher::{checksum, Cipher};
use crate::{Packet, PacketType, Payload, ProtocolError};

/// Bytes before the frame body: 4 length bytes and 1 type byte.
pub const HEADER_LEN: usize = 5;

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// Encodes packets to frames and decodes frames to packets, optionally
/// through a [`Cipher`].
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    cipher: Option<Cipher>,
}

impl FrameCodec {
    /// A codec that obfuscates payloads with `cipher`.
    pub fn new(cipher: Cipher) -> Self {
        Self {
            cipher: Some(cipher),
        }
    }

    /// A codec that frames payloads without transforming them. The
    /// checksum byte is still present.
    pub fn plain() -> Self {
        Self { cipher: None }
    }

    /// Returns the cipher in use, if any.
    pub fn cipher(&self) -> Option<&Cipher> {
        self.cipher.as_ref()
    }

    /// Encodes one packet into one frame.
    ///
    /// # Errors
    /// [`ProtocolError::Encode`] if a JSON payload fails to serialize,
    /// [`ProtocolError::FrameTooLarge`] if the body does not fit a `u32`.
    pub fn encode(&self, packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
        let body = packet.payload.to_bytes()?;
        encode_frame(packet.kind.as_u8(), &body, self.cipher.as_ref())
    }

    /// Decodes every complete frame at the front of `buf`.
    pub fn decode<'a>(&self, buf: &'a [u8]) -> Decoded<'a> {
        decode_frames(buf, self.cipher.as_ref())
    }
}

/// Builds a single frame around an already-serialized payload.
pub fn encode_frame(
    tag: u8,
    payload: &[u8],
    cipher: Option<&Cipher>,
) -> Result<Vec<u8>, ProtocolError> {
    let body_len = if payload.is_empty() {
        0
    } else {
        payload.len() + 1
    };
    let len = u32::try_from(body_len).map_err(|_| ProtocolError::FrameTooLarge {
        len: body_len,
        max: u32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(HEADER_LEN + body_len);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.push(tag);
    if !payload.is_empty() {
        let start = frame.len();
        frame.extend_from_slice(payload);
        if let Some(cipher) = cipher {
            cipher.transform_in_place(&mut frame[start..]);
        }
        frame.push(checksum(payload));
    }
    Ok(frame)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// One frame recovered from the wire.
///
/// The type byte is kept raw so that decoding itself never fails; use
/// [`into_packet`](Self::into_packet) to check it against [`PacketType`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// The raw type byte.
    pub tag: u8,
    /// The recovered payload (JSON if it parsed, text otherwise).
    pub payload: Payload,
    /// Whether the trailing checksum matched the recovered bytes.
    ///
    /// A mismatch is a hint of corruption only. The payload is still the
    /// best-effort recovery and callers are expected to keep going.
    pub checksum_ok: bool,
}

impl DecodedFrame {
    /// Converts to a typed packet.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownPacketType`] if the tag is not in the enum.
    pub fn into_packet(self) -> Result<Packet, ProtocolError> {
        Ok(Packet {
            kind: PacketType::try_from(self.tag)?,
            payload: self.payload,
        })
    }
}

/// The result of one decode pass.
#[derive(Debug)]
pub struct Decoded<'a> {
    /// Complete frames, in arrival order.
    pub frames: Vec<DecodedFrame>,
    /// Bytes after the last complete frame. Prepend to the next chunk.
    pub remaining: &'a [u8],
}

/// Decodes every complete frame at the front of `buf`.
///
/// Stops at the first frame whose header or body is not fully present; a
/// short buffer is never an error.
pub fn decode_frames<'a>(buf: &'a [u8], cipher: Option<&Cipher>) -> Decoded<'a> {
    let mut frames = Vec::new();
    let mut rest = buf;

    while let Some(len) = declared_len(rest) {
        let Some(total) = HEADER_LEN.checked_add(len) else {
            break;
        };
        if rest.len() < total {
            break;
        }
        let tag = rest[4];
        frames.push(open_body(tag, &rest[HEADER_LEN..total], cipher));
        rest = &rest[total..];
    }

    Decoded {
        frames,
        remaining: rest,
    }
}

/// Reads the length prefix if a whole header is available.
fn declared_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    let prefix = [buf[0], buf[1], buf[2], buf[3]];
    Some(u32::from_be_bytes(prefix) as usize)
}

/// Strips the checksum, reverses the transform, and verifies.
fn open_body(tag: u8, body: &[u8], cipher: Option<&Cipher>) -> DecodedFrame {
    let Some((&expected, transformed)) = body.split_last() else {
        return DecodedFrame {
            tag,
            payload: Payload::from_bytes(&[]),
            checksum_ok: true,
        };
    };

    let mut plain = transformed.to_vec();
    if let Some(cipher) = cipher {
        cipher.transform_in_place(&mut plain);
    }

    DecodedFrame {
        tag,
        checksum_ok: checksum(&plain) == expected,
        payload: Payload::from_bytes(&plain),
    }
}

// ---------------------------------------------------------------------------
// StreamDecoder
// ---------------------------------------------------------------------------

/// Per-connection residue buffer in front of [`FrameCodec::decode`].
///
/// Owned by exactly one connection task; needs no synchronization.
#[derive(Debug)]
pub struct StreamDecoder {
    codec: FrameCodec,
    buf: BytesMut,
    max_frame_len: usize,
}

impl StreamDecoder {
    /// Creates a decoder that flags frames declaring more than
    /// `max_frame_len` body bytes.
    pub fn new(codec: FrameCodec, max_frame_len: usize) -> Self {
        Self {
            codec,
            buf: BytesMut::new(),
            max_frame_len,
        }
    }

    /// Appends a chunk and returns every frame that is now complete.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DecodedFrame> {
        self.buf.extend_from_slice(chunk);
        let Decoded { frames, remaining } = self.codec.decode(&self.buf);
        let consumed = self.buf.len() - remaining.len();
        self.buf.advance(consumed);
        frames
    }

    /// Returns the declared length of the buffered partial frame if it
    /// exceeds the limit. Such a frame would make the buffer grow without
    /// bound, so the owning connection should be dropped.
    pub fn oversized(&self) -> Option<usize> {
        declared_len(&self.buf).filter(|len| *len > self.max_frame_len)
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cipher() -> Cipher {
        Cipher::new("test-secret")
    }

    // =====================================================================
    // encode
    // =====================================================================

    #[test]
    fn test_encode_layout_without_cipher() {
        let frame = encode_frame(2, b"hi", None).unwrap();
        // len = 2 payload bytes + 1 checksum byte.
        assert_eq!(frame, vec![0, 0, 0, 3, 2, b'h', b'i', b'h'.wrapping_add(b'i')]);
    }

    #[test]
    fn test_encode_empty_payload_is_bare_header() {
        let frame = FrameCodec::new(cipher())
            .encode(&Packet::new(PacketType::Keepalive, Payload::empty()))
            .unwrap();
        assert_eq!(frame, vec![0, 0, 0, 0, 4]);
    }

    #[test]
    fn test_encode_obfuscates_payload_but_not_header() {
        let codec = FrameCodec::new(cipher());
        let frame = codec
            .encode(&Packet::new(PacketType::Signaling, "plaintext"))
            .unwrap();

        assert_eq!(&frame[..HEADER_LEN], &[0, 0, 0, 10, 2]);
        assert_ne!(&frame[HEADER_LEN..HEADER_LEN + 9], b"plaintext");
        // The checksum covers the pre-transform bytes.
        assert_eq!(frame[frame.len() - 1], checksum(b"plaintext"));
    }

    // =====================================================================
    // decode
    // =====================================================================

    #[test]
    fn test_decode_json_round_trip() {
        let codec = FrameCodec::new(cipher());
        let packet = Packet::new(
            PacketType::RoomControl,
            json!({"action": "join", "roomId": "r1"}),
        );

        let frame = codec.encode(&packet).unwrap();
        let decoded = codec.decode(&frame);

        assert!(decoded.remaining.is_empty());
        assert_eq!(decoded.frames.len(), 1);
        assert!(decoded.frames[0].checksum_ok);
        assert_eq!(decoded.frames[0].clone().into_packet().unwrap(), packet);
    }

    #[test]
    fn test_decode_partial_length_prefix_yields_nothing() {
        let decoded = FrameCodec::plain().decode(&[0, 0, 0]);
        assert!(decoded.frames.is_empty());
        assert_eq!(decoded.remaining, &[0, 0, 0]);
    }

    #[test]
    fn test_decode_partial_body_returns_whole_frame_as_remaining() {
        let frame = encode_frame(2, b"hello", None).unwrap();
        let cut = &frame[..frame.len() - 2];

        let decoded = FrameCodec::plain().decode(cut);

        assert!(decoded.frames.is_empty());
        assert_eq!(decoded.remaining, cut);
    }

    #[test]
    fn test_decode_multiple_frames_in_one_buffer_in_order() {
        let codec = FrameCodec::new(cipher());
        let mut buf = Vec::new();
        for i in 0..3 {
            buf.extend(
                codec
                    .encode(&Packet::new(PacketType::Signaling, json!({"n": i})))
                    .unwrap(),
            );
        }
        buf.extend_from_slice(&[0, 0]); // start of a fourth header

        let decoded = codec.decode(&buf);

        let ns: Vec<_> = decoded
            .frames
            .iter()
            .map(|f| f.payload.as_json().unwrap()["n"].clone())
            .collect();
        assert_eq!(ns, vec![json!(0), json!(1), json!(2)]);
        assert_eq!(decoded.remaining, &[0, 0]);
    }

    #[test]
    fn test_decode_zero_length_frame_is_empty_text() {
        let decoded = FrameCodec::new(cipher()).decode(&[0, 0, 0, 0, 4]);
        assert_eq!(decoded.frames.len(), 1);
        assert_eq!(decoded.frames[0].payload, Payload::Text(String::new()));
        assert!(decoded.frames[0].checksum_ok);
    }

    #[test]
    fn test_decode_corrupted_byte_still_yields_frame() {
        let codec = FrameCodec::new(cipher());
        let mut frame = codec
            .encode(&Packet::new(PacketType::Signaling, "hello"))
            .unwrap();
        frame[HEADER_LEN] ^= 0x01;

        let decoded = codec.decode(&frame);

        assert_eq!(decoded.frames.len(), 1);
        assert!(!decoded.frames[0].checksum_ok);
        assert_eq!(decoded.frames[0].payload, Payload::Text("iello".into()));
    }

    #[test]
    fn test_decode_unknown_tag_is_frame_but_not_packet() {
        let frame = encode_frame(9, b"x", None).unwrap();
        let decoded = FrameCodec::plain().decode(&frame);

        assert_eq!(decoded.frames[0].tag, 9);
        assert!(matches!(
            decoded.frames[0].clone().into_packet(),
            Err(ProtocolError::UnknownPacketType(9))
        ));
    }

    #[test]
    fn test_decode_with_wrong_key_flags_checksum() {
        let frame = FrameCodec::new(Cipher::new("a"))
            .encode(&Packet::new(PacketType::Signaling, "some text"))
            .unwrap();

        let decoded = FrameCodec::new(Cipher::new("b")).decode(&frame);

        // Still a frame; almost certainly the wrong bytes.
        assert_eq!(decoded.frames.len(), 1);
        assert_ne!(decoded.frames[0].payload, Payload::Text("some text".into()));
    }

    // =====================================================================
    // StreamDecoder
    // =====================================================================

    #[test]
    fn test_stream_decoder_reassembles_split_frame() {
        let codec = FrameCodec::new(cipher());
        let frame = codec
            .encode(&Packet::new(PacketType::Signaling, json!({"sdp": "v=0"})))
            .unwrap();
        let mut decoder = StreamDecoder::new(codec, 1024);

        assert!(decoder.feed(&frame[..3]).is_empty());
        assert_eq!(decoder.buffered(), 3);
        assert!(decoder.feed(&frame[3..7]).is_empty());

        let frames = decoder.feed(&frame[7..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, Payload::Json(json!({"sdp": "v=0"})));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_stream_decoder_flags_oversized_declared_length() {
        let mut decoder = StreamDecoder::new(FrameCodec::plain(), 16);

        let frames = decoder.feed(&[0, 0, 1, 0, 2]);

        assert!(frames.is_empty());
        assert_eq!(decoder.oversized(), Some(256));
    }

    #[test]
    fn test_stream_decoder_within_limit_is_not_oversized() {
        let mut decoder = StreamDecoder::new(FrameCodec::plain(), 16);
        decoder.feed(&[0, 0, 0, 16, 2]);
        assert_eq!(decoder.oversized(), None);
    }
}
