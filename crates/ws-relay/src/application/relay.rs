//! Per-connection relay loops and the channel queue consumer.
//!
//! # Direct relay
//!
//! ```text
//! register(direct) ─► read ─┬─ payload ──► broadcast(direct) ─► read again
//!                           ├─ error ────► log ─────────────► read again
//!                           └─ end ──────► deactivate(direct), return
//! ```
//!
//! # Channel relay
//!
//! Producers (one per channel connection) never broadcast themselves.  They
//! push `{sender, payload}` onto the hub's bounded queue; the single
//! [`ChannelConsumer`] pops messages one at a time and broadcasts each to the
//! channel group.  The queue is the only point that orders channel traffic, so
//! every member sees messages in dequeue order.  A full queue suspends the
//! producer that tries to push, which slows down only that connection's reads.
//!
//! A payload larger than the source's read size arrives as several reads and
//! is relayed as several messages.  Nothing reassembles them.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::broadcaster::Broadcaster;
use super::hub::RelayHub;
use super::ports::{PayloadSource, PeerSink, RelayError};
use crate::domain::{ConnectionId, Group, QueuedMessage};

/// Longest payload excerpt written to the consumer's log line.
const LOG_PREVIEW_CHARS: usize = 64;

/// Runs the read loop of a direct-group connection until end of stream.
///
/// # Errors
///
/// Only [`RelayError::DuplicateConnection`], if `id` is already registered.
/// Read errors are logged and the loop keeps reading.
pub async fn run_direct_relay<S>(
    hub: &RelayHub,
    id: ConnectionId,
    mut source: S,
    sink: Arc<dyn PeerSink>,
) -> Result<(), RelayError>
where
    S: PayloadSource,
{
    info!("incoming connection from {id} (direct)");
    // From here on the registry holds the only long-lived handle to `sink`.
    hub.registries().direct.register(id.clone(), sink)?;

    loop {
        match source.read().await {
            Ok(Some(payload)) => {
                // Broadcast straight from this task; nothing orders direct
                // traffic across connections.
                debug!("direct: {} bytes from {id}", payload.len());
                hub.broadcaster().broadcast(Group::Direct, payload, &id);
            }
            Ok(None) => {
                // Releasing the sink lets its writer close the socket.
                info!("connection ended from {id} (direct)");
                hub.registries().direct.deactivate(&id);
                return Ok(());
            }
            Err(e) => warn!("error while reading from {id}: {e}"),
        }
    }
}

/// Runs the producer loop of a channel-group connection until end of stream.
///
/// # Errors
///
/// [`RelayError::DuplicateConnection`] if `id` is already registered, or
/// [`RelayError::QueueClosed`] if the consumer has stopped (the connection is
/// deactivated first).
pub async fn run_channel_relay<S>(
    hub: &RelayHub,
    id: ConnectionId,
    mut source: S,
    sink: Arc<dyn PeerSink>,
) -> Result<(), RelayError>
where
    S: PayloadSource,
{
    info!("incoming connection from {id} (channel)");
    hub.registries().channel.register(id.clone(), sink)?;

    loop {
        match source.read().await {
            Ok(Some(payload)) => {
                let message = QueuedMessage {
                    sender: id.clone(),
                    payload,
                };
                // Suspends while the queue is full.
                if let Err(e) = hub.enqueue(message).await {
                    hub.registries().channel.deactivate(&id);
                    return Err(e);
                }
            }
            Ok(None) => {
                info!("connection ended from {id} (channel)");
                hub.registries().channel.deactivate(&id);
                return Ok(());
            }
            Err(e) => warn!("error while reading from {id}: {e}"),
        }
    }
}

/// The single consumer of the channel queue.
pub struct ChannelConsumer;

impl ChannelConsumer {
    /// Spawns the consumer task.
    ///
    /// It broadcasts every queued message to the channel group, in queue
    /// order, and exits once every sender half of the queue is dropped.
    pub fn spawn(mut queue: mpsc::Receiver<QueuedMessage>, broadcaster: Broadcaster) -> JoinHandle<()> {
        // One task for the hub's lifetime.  Running a single consumer is what
        // gives every channel member the same message order.
        tokio::spawn(async move {
            while let Some(message) = queue.recv().await {
                info!(
                    "received message from {}: {}",
                    message.sender,
                    message.preview(LOG_PREVIEW_CHARS)
                );
                // `broadcast` only queues the payload per peer, so the next
                // message is never started before this one is handed off.
                broadcaster.broadcast(Group::Channel, message.payload, &message.sender);
            }
            debug!("channel queue closed; consumer exiting");
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
