//! Application layer for ws-relay.
//!
//! Knows *what* happens to a payload (register, read, enqueue, fan out) but
//! not *how* bytes move: the transport is reached only through the
//! [`PeerSink`] and [`PayloadSource`] traits defined in [`ports`].
//!
//! ```text
//! PayloadSource ─► run_direct_relay ───────────────────────► Broadcaster ─► PeerSink × N
//! PayloadSource ─► run_channel_relay ─► queue ─► consumer ─► Broadcaster ─► PeerSink × N
//! ```

pub mod broadcaster;
pub mod hub;
pub mod ports;
pub mod registry;
pub mod relay;

#[cfg(test)]
pub(crate) mod testing;

pub use broadcaster::Broadcaster;
pub use hub::RelayHub;
pub use ports::{PayloadSource, PeerSink, RelayError};
pub use registry::{ConnectionRegistry, GroupRegistries};
pub use relay::{run_channel_relay, run_direct_relay, ChannelConsumer};
