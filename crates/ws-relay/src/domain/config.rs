//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for all runtime settings.
//! It is populated by the binary from (in increasing precedence) built-in
//! defaults, an optional TOML file, environment variables, and CLI flags.
//! The struct itself performs no I/O.

use std::net::SocketAddr;

use serde::Deserialize;
use thiserror::Error;

use super::connection::Group;

/// A configuration value that cannot work at runtime.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidConfig {
    #[error("queue_capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("read_buffer_size must be at least 1")]
    ZeroReadBuffer,

    #[error("endpoint path '{0}' must start with '/'")]
    RelativePath(String),

    #[error("direct and channel endpoints share the path '{0}'")]
    DuplicatePath(String),
}

/// All runtime configuration for the relay.
///
/// Build once at startup, validate, then hand it to
/// [`RelayHub::start`](crate::application::RelayHub::start), which keeps it
/// behind an `Arc` for every connection task.
///
/// # Example
///
/// ```rust
/// use ws_relay::domain::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 3000);
/// assert_eq!(cfg.direct_path, "/ws");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Address and port the listener binds to.
    pub bind_addr: SocketAddr,

    /// Request path that joins the direct group.
    pub direct_path: String,

    /// Request path that joins the ordered channel group.
    pub channel_path: String,

    /// Bound of the channel queue.  A full queue suspends whichever channel
    /// read loop tries to enqueue next.
    pub queue_capacity: usize,

    /// Maximum number of bytes handed out per read.  A larger WebSocket
    /// message is relayed as several consecutive payloads.
    pub read_buffer_size: usize,

    /// Whether a payload is also delivered back to the connection that sent it.
    pub echo_to_sender: bool,
}

impl Default for RelayConfig {
    /// | Field              | Default        |
    /// |--------------------|----------------|
    /// | bind_addr          | `0.0.0.0:3000` |
    /// | direct_path        | `/ws`          |
    /// | channel_path       | `/channel`     |
    /// | queue_capacity     | 10             |
    /// | read_buffer_size   | 1024           |
    /// | echo_to_sender     | `true`         |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            direct_path: "/ws".to_string(),
            channel_path: "/channel".to_string(),
            queue_capacity: 10,
            read_buffer_size: 1024,
            echo_to_sender: true,
        }
    }
}

impl RelayConfig {
    /// Checks the invariants the relay relies on.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvalidConfig`] found.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.queue_capacity == 0 {
            return Err(InvalidConfig::ZeroQueueCapacity);
        }
        if self.read_buffer_size == 0 {
            return Err(InvalidConfig::ZeroReadBuffer);
        }
        for path in [&self.direct_path, &self.channel_path] {
            if !path.starts_with('/') {
                return Err(InvalidConfig::RelativePath(path.clone()));
            }
        }
        if self.direct_path == self.channel_path {
            return Err(InvalidConfig::DuplicatePath(self.direct_path.clone()));
        }
        Ok(())
    }

    /// Maps a request path (query string already stripped) to its group.
    ///
    /// Returns `None` for any path that is not one of the two endpoints.
    pub fn route_for(&self, path: &str) -> Option<Group> {
        if path == self.direct_path {
            Some(Group::Direct)
        } else if path == self.channel_path {
            Some(Group::Channel)
        } else {
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
