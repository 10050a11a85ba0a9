//! Infrastructure layer for ws-relay.
//!
//! Everything that touches the outside world:
//!
//! - Binding the listener and accepting TCP connections
//! - The WebSocket upgrade handshake and endpoint dispatch
//! - Adapting WebSocket halves to the application's `PeerSink` /
//!   `PayloadSource` traits
//! - Reading the optional TOML config file

pub mod config_file;
pub mod ws_conn;
pub mod ws_server;

pub use config_file::{load_config, ConfigError};
pub use ws_server::{run_server, serve};
