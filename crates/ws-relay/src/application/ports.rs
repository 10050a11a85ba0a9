//! Transport seams and the application error type.
//!
//! The relay loops and the broadcaster only ever see these two traits, so the
//! whole fan-out pipeline can be exercised in tests with in-memory fakes.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ConnectionId;

/// Failures surfaced by the application layer.
///
/// None of these ever reach an end client; they are logged by whichever loop
/// encountered them.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A payload could not be queued for, or written to, a peer.
    #[error("write failed: {0}")]
    Send(String),

    /// A read failed but the stream may still deliver more data.
    #[error("read failed: {0}")]
    Read(String),

    /// A connection identity was registered twice in the same group.
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    /// The channel queue consumer is gone, so nothing can be enqueued.
    #[error("channel queue is closed")]
    QueueClosed,
}

/// Write side of a connection, as seen by the broadcaster.
///
/// `send` must not block: it hands the payload to the peer's own outbound
/// queue and returns. Payloads pushed to one sink reach the peer in push
/// order, and a slow peer never holds up the caller.
#[cfg_attr(test, mockall::automock)]
pub trait PeerSink: Send + Sync {
    /// Queues one payload for delivery to the peer.
    ///
    /// Fails only when the peer's writer has already shut down.
    fn send(&self, payload: Vec<u8>) -> Result<(), RelayError>;
}

/// Read side of a connection, as seen by a relay loop.
#[async_trait]
pub trait PayloadSource: Send {
    /// Waits for the next payload.
    ///
    /// - `Ok(Some(bytes))`: one read's worth of data.
    /// - `Ok(None)`: end of stream; the caller must not read again.
    /// - `Err(_)`: transient failure; the caller may read again immediately.
    async fn read(&mut self) -> Result<Option<Vec<u8>>, RelayError>;
}
