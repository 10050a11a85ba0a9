//! ws-relay library crate.
//!
//! A minimal real-time relay: clients open WebSocket connections to one of two
//! endpoints and every payload received on a connection is rebroadcast to the
//! other connections of the same group.
//!
//! - **Direct** endpoint (`/ws` by default): each read is broadcast right away
//!   by the connection's own read loop.  No cross-connection ordering.
//! - **Channel** endpoint (`/channel` by default): reads are pushed onto one
//!   bounded queue; a single consumer drains it and broadcasts in queue order,
//!   so every channel member sees the same total order.
//!
//! # Architecture
//!
//! ```text
//! WebSocket clients
//!         ↕
//! [ws-relay]
//!   ├── domain/           RelayConfig, Group, ConnectionId, QueuedMessage
//!   ├── application/      registries, broadcaster, relay loops, RelayHub
//!   └── infrastructure/
//!         ├── ws_server/  accept loop + path dispatch (tokio-tungstenite)
//!         ├── ws_conn/    WebSocket halves as PeerSink / PayloadSource
//!         └── config_file/ TOML config loading
//! ```
//!
//! # Layer rules
//!
//! - `domain` performs no I/O.
//! - `application` depends on `domain` and reaches the transport only through
//!   the traits in `application::ports`.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: registries, fan-out, relay loops.
pub mod application;

/// Infrastructure layer: WebSocket server, connection adapters, config file.
pub mod infrastructure;
