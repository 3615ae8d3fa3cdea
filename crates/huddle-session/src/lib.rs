//! Connection registry for huddle.
//!
//! Every accepted connection gets a [`Session`]: the relay's record of
//! who the peer is, what state it is in, and where to send its packets.
//! The [`ConnectionRegistry`] owns all of them, keyed by [`PeerId`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)      ← membership by PeerId, looks sessions up here
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← PeerId, Packet
//! ```
//!
//! [`PeerId`]: huddle_protocol::PeerId

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::{ConnectionRegistry, PEER_ID_LEN};
pub use session::{Outbox, Session, SessionState, DEFAULT_DISPLAY_NAME};
