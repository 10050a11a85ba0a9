//! Fire-and-forget fan-out of one payload to every active member of a group.
//!
//! The broadcaster never writes to a socket itself.  It pushes the payload onto
//! each target's outbound queue (see [`PeerSink`](super::PeerSink)) and returns; the socket
//! write happens on that peer's own writer task.  Two consequences:
//!
//! - a slow or stuck peer never delays the others, and
//! - payloads broadcast one after another reach every peer in that order.
//!
//! A failed push is logged and dropped: it neither aborts the remaining
//! deliveries nor deactivates the peer (only the peer's own read loop does
//! that, when it sees end of stream).

use std::sync::Arc;

use tracing::{debug, warn};

use super::registry::GroupRegistries;
use crate::domain::{ConnectionId, Group};

/// Delivers payloads to the members of a group.
///
/// Cheap to clone: it only holds an `Arc` to the registries.
#[derive(Clone)]
pub struct Broadcaster {
    registries: Arc<GroupRegistries>,
    echo_to_sender: bool,
}

impl Broadcaster {
    pub fn new(registries: Arc<GroupRegistries>, echo_to_sender: bool) -> Self {
        Self {
            registries,
            echo_to_sender,
        }
    }

    /// Dispatches `payload` to every member of `group` that is active at the
    /// moment of the call.
    ///
    /// `origin` is the connection the payload came from; it is skipped unless
    /// echoing is enabled.  Returns how many peers the payload was handed to.
    /// No delivery result is reported back.
    pub fn broadcast(&self, group: Group, payload: Vec<u8>, origin: &ConnectionId) -> usize {
        let targets = self.registries.get(group).active_sinks();
        let payload: Arc<[u8]> = payload.into();
        let mut dispatched = 0;

        for (target, sink) in targets {
            if !self.echo_to_sender && &target == origin {
                continue;
            }
            if let Err(e) = sink.send(payload.to_vec()) {
                warn!("{group}: write to {target} failed: {e}");
            }
            dispatched += 1;
        }

        debug!(
            "{group}: {} bytes from {origin} dispatched to {dispatched} peer(s)",
            payload.len()
        );
        dispatched
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
