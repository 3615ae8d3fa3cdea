//! Relay configuration, loadable from TOML.
//!
//! ```toml
//! secret = "change-me"
//! obfuscate = true
//! max_frame_len = 1048576
//! idle_timeout_secs = 60
//! upgrade_timeout_secs = 10
//!
//! [listen]
//! tcp = "0.0.0.0:9000"
//! websocket = "0.0.0.0:3000"   # "" disables
//!
//! [room]
//! max_members = 0              # 0 = unlimited
//! join_mode = "create"         # or "existing"
//! ```
//!
//! Every key is optional.

use std::path::Path;
use std::time::Duration;

use huddle_protocol::{Cipher, FrameCodec};
use huddle_room::RoomConfig;
use serde::{Deserialize, Serialize};

use crate::HuddleError;

/// Secret used when none is configured. Only useful for local testing:
/// anyone reading this source knows it.
pub const DEFAULT_SECRET: &str = "huddle-default-secret";

/// Default limit on a single frame body.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// ListenConfig
// ---------------------------------------------------------------------------

/// Listener addresses. An empty string disables that listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Raw TCP byte-stream listener.
    pub tcp: String,

    /// WebSocket listener.
    pub websocket: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            tcp: "0.0.0.0:9000".into(),
            websocket: "0.0.0.0:3000".into(),
        }
    }
}

impl ListenConfig {
    /// The TCP address, unless disabled.
    pub fn tcp_addr(&self) -> Option<&str> {
        Some(self.tcp.as_str()).filter(|a| !a.is_empty())
    }

    /// The WebSocket address, unless disabled.
    pub fn websocket_addr(&self) -> Option<&str> {
        Some(self.websocket.as_str()).filter(|a| !a.is_empty())
    }
}

// ---------------------------------------------------------------------------
// RelayConfig
// ---------------------------------------------------------------------------

/// Everything the relay can be configured with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Shared secret the obfuscation key is derived from.
    pub secret: String,

    /// Run payloads through the cipher. When off, frames still carry a
    /// checksum.
    pub obfuscate: bool,

    /// Largest frame body a peer may announce before it is disconnected.
    pub max_frame_len: usize,

    /// Seconds of silence before a connection is closed. 0 disables.
    pub idle_timeout_secs: u64,

    /// Seconds a new socket gets to finish its transport handshake (the
    /// WebSocket upgrade). 0 disables.
    pub upgrade_timeout_secs: u64,

    pub listen: ListenConfig,

    pub room: RoomConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            secret: DEFAULT_SECRET.into(),
            obfuscate: true,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            idle_timeout_secs: 60,
            upgrade_timeout_secs: 10,
            listen: ListenConfig::default(),
            room: RoomConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    /// [`HuddleError::Config`] on malformed TOML or wrongly typed values.
    pub fn from_toml_str(text: &str) -> Result<Self, HuddleError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    /// [`HuddleError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HuddleError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Builds the frame codec this configuration describes.
    pub fn codec(&self) -> FrameCodec {
        if self.obfuscate {
            FrameCodec::new(Cipher::new(&self.secret))
        } else {
            FrameCodec::plain()
        }
    }

    /// The idle timeout, or `None` if disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// The handshake timeout, or `None` if disabled.
    pub fn upgrade_timeout(&self) -> Option<Duration> {
        (self.upgrade_timeout_secs > 0).then(|| Duration::from_secs(self.upgrade_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_room::JoinMode;

    #[test]
    fn test_default_config_values() {
        let config = RelayConfig::default();
        assert_eq!(config.secret, DEFAULT_SECRET);
        assert!(config.obfuscate);
        assert_eq!(config.max_frame_len, 1024 * 1024);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.upgrade_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.listen.tcp_addr(), Some("0.0.0.0:9000"));
        assert_eq!(config.listen.websocket_addr(), Some("0.0.0.0:3000"));
    }

    #[test]
    fn test_from_toml_str_empty_document_is_default() {
        let config = RelayConfig::from_toml_str("").unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_from_toml_str_overrides_nested_tables() {
        let config = RelayConfig::from_toml_str(
            r#"
            secret = "s3cret"
            idle_timeout_secs = 0
            upgrade_timeout_secs = 0

            [listen]
            websocket = ""

            [room]
            max_members = 4
            join_mode = "existing"
            "#,
        )
        .unwrap();

        assert_eq!(config.secret, "s3cret");
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.upgrade_timeout(), None);
        assert_eq!(config.listen.tcp_addr(), Some("0.0.0.0:9000"));
        assert_eq!(config.listen.websocket_addr(), None);
        assert_eq!(config.room.max_members, 4);
        assert_eq!(config.room.join_mode, JoinMode::Existing);
    }

    #[test]
    fn test_from_toml_str_wrong_type_returns_config_error() {
        let result = RelayConfig::from_toml_str("max_frame_len = \"big\"");
        assert!(matches!(result, Err(HuddleError::Config(_))));
    }

    #[test]
    fn test_load_missing_file_returns_io_error() {
        let result = RelayConfig::load("/definitely/not/here/huddle.toml");
        assert!(matches!(result, Err(HuddleError::Io(_))));
    }

    #[test]
    fn test_codec_respects_obfuscate_flag() {
        let mut config = RelayConfig::default();
        assert!(config.codec().cipher().is_some());

        config.obfuscate = false;
        assert!(config.codec().cipher().is_none());
    }
}
