//! RelayHub: the server object that owns all shared relay state.
//!
//! One hub exists per running server.  It is created once at startup and
//! shared by every connection task behind an `Arc`.  Nothing lives in globals.
//!
//! ```text
//! RelayHub
//!  ├─ config        Arc<RelayConfig>
//!  ├─ registries    Arc<GroupRegistries>   (direct + channel)
//!  ├─ broadcaster   Broadcaster            (shares the registries)
//!  ├─ queue_tx      mpsc::Sender<QueuedMessage>   (bounded, queue_capacity)
//!  └─ consumer      JoinHandle             (exactly one, spawned in start())
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::broadcaster::Broadcaster;
use super::ports::RelayError;
use super::registry::GroupRegistries;
use super::relay::ChannelConsumer;
use crate::domain::{QueuedMessage, RelayConfig};

pub struct RelayHub {
    config: Arc<RelayConfig>,
    registries: Arc<GroupRegistries>,
    broadcaster: Broadcaster,
    queue_tx: mpsc::Sender<QueuedMessage>,
    consumer: JoinHandle<()>,
}

impl RelayHub {
    /// Builds the registries and the channel queue, and spawns the single
    /// channel consumer.
    ///
    /// Must be called from within a Tokio runtime.  The consumer runs until
    /// the hub is dropped.
    pub fn start(config: RelayConfig) -> Self {
        let registries = Arc::new(GroupRegistries::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registries), config.echo_to_sender);
        // `mpsc::channel` panics on a zero capacity.
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        let consumer = ChannelConsumer::spawn(queue_rx, broadcaster.clone());

        info!(
            "relay hub started (queue capacity {}, read buffer {} bytes)",
            config.queue_capacity, config.read_buffer_size
        );

        Self {
            config: Arc::new(config),
            registries,
            broadcaster,
            queue_tx,
            consumer,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn registries(&self) -> &GroupRegistries {
        &self.registries
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Appends a message to the channel queue, waiting while it is full.
    ///
    /// # Errors
    ///
    /// [`RelayError::QueueClosed`] if the consumer has stopped.
    pub async fn enqueue(&self, message: QueuedMessage) -> Result<(), RelayError> {
        self.queue_tx
            .send(message)
            .await
            .map_err(|_| RelayError::QueueClosed)
    }

    /// Whether the channel consumer task is still draining the queue.
    pub fn is_consumer_running(&self) -> bool {
        !self.consumer.is_finished()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
