//! Domain layer for ws-relay.
//!
//! Pure types with no I/O: connection identities, the two broadcast groups,
//! queued channel messages, and the relay configuration.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - File I/O or environment variable reading

pub mod config;
pub mod connection;

pub use config::{InvalidConfig, RelayConfig};
pub use connection::{ConnectionId, Group, QueuedMessage};
