//! Connection identity, broadcast groups, and queued channel messages.

use std::fmt;
use std::net::SocketAddr;

use uuid::Uuid;

/// Logical partition a connection belongs to for its whole lifetime.
///
/// The group only selects which registry a broadcast targets; connections
/// never move between groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    /// Every received payload is rebroadcast immediately by its own read loop.
    Direct,
    /// Received payloads are funnelled through a single ordered queue first.
    Channel,
}

impl Group {
    /// Stable lowercase name used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Group::Direct => "direct",
            Group::Channel => "channel",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one accepted connection.
///
/// The remote address alone is not enough: once a TCP connection closes, the
/// same `ip:port` pair can be handed to a later client, and its old registry
/// entry (kept inactive for the process lifetime) must not be confused with
/// the new one.  Each accepted connection therefore also gets a random v4 UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    id: Uuid,
    remote: SocketAddr,
}

impl ConnectionId {
    /// Allocates a fresh identity for a connection from `remote`.
    pub fn new(remote: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote,
        }
    }

    /// The peer address reported by the transport.
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// The unique per-connection UUID.
    pub fn uuid(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for ConnectionId {
    /// Renders as `<remote>#<first 8 hex digits of the uuid>`, e.g.
    /// `127.0.0.1:50412#3f2a9c01`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let simple = self.id.simple().to_string();
        write!(f, "{}#{}", self.remote, &simple[..8])
    }
}

/// A payload read from a channel connection, waiting for the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    /// The connection the payload was read from.
    pub sender: ConnectionId,
    /// Raw bytes exactly as read (one read = one message).
    pub payload: Vec<u8>,
}

impl QueuedMessage {
    /// Short human-readable rendering of the payload for log lines.
    ///
    /// Invalid UTF-8 is replaced lossily; anything past `max_chars` is cut.
    pub fn preview(&self, max_chars: usize) -> String {
        let text = String::from_utf8_lossy(&self.payload);
        if text.chars().count() <= max_chars {
            text.into_owned()
        } else {
            let cut: String = text.chars().take(max_chars).collect();
            format!("{cut}…")
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
