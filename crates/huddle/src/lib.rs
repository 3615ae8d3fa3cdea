//! # huddle
//!
//! A signaling relay for peers that negotiate direct media sessions.
//!
//! Peers connect over raw TCP or WebSocket, complete a handshake, join a
//! named room, and exchange opaque signaling messages (offers, answers,
//! candidates) through the relay until they can talk to each other
//! directly. Every frame on the wire is length-prefixed and its payload
//! lightly obfuscated; see [`huddle_protocol`] for the format.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use huddle::prelude::*;
//!
//! # async fn start() -> Result<(), HuddleError> {
//! let config = RelayConfig::load("huddle.toml")?;
//! let server = HuddleServer::builder().config(config).build().await?;
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod relay;
mod server;

pub use config::{DEFAULT_MAX_FRAME_LEN, DEFAULT_SECRET, ListenConfig, RelayConfig};
pub use error::HuddleError;
pub use relay::Relay;
pub use server::{HuddleServer, HuddleServerBuilder};

pub mod prelude {
    //! The types most programs need.

    pub use crate::{HuddleError, HuddleServer, HuddleServerBuilder, Relay, RelayConfig};
    pub use huddle_protocol::{Packet, PacketType, PeerId, RoomId};
    pub use huddle_room::{JoinMode, RoomConfig};
}
