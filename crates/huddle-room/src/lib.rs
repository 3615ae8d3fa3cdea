//! Room membership for huddle.
//!
//! A room is nothing more than a named, ordered set of peers. Rooms are
//! created lazily on first join and removed as soon as the last member
//! leaves.
//!
//! # Key types
//!
//! - [`RoomManager`]: room name → members
//! - [`Registry`]: sessions and rooms together, so a join, leave, or
//!   disconnect updates both in one step
//! - [`RoomConfig`]: capacity and join policy

mod config;
mod error;
mod manager;
mod registry;
mod room;

pub use config::{JoinMode, RoomConfig};
pub use error::RoomError;
pub use manager::RoomManager;
pub use registry::{Departure, JoinOutcome, LeaveOutcome, Registry};
pub use room::Room;
