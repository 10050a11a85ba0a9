//! Per-group registries of live connections.
//!
//! Each group owns one [`ConnectionRegistry`]: a map from [`ConnectionId`] to
//! the peer's write handle.  Entries are never removed.  A read loop flips its
//! own entry to inactive when it observes end of stream: the write handle is
//! released at that point, so the registry never keeps a finished socket alive,
//! and from then on the broadcaster skips the entry.
//!
//! # Concurrency
//!
//! Many read loops insert and flip flags while the broadcaster iterates, so
//! the map is a [`DashMap`]: each shard has its own lock, and
//! [`ConnectionRegistry::active_sinks`] copies the active handles out before
//! any write is attempted.  No shard lock is ever held across an `.await`.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::error;

use super::ports::{PeerSink, RelayError};
use crate::domain::{ConnectionId, Group};

/// `sink` is `None` once the connection has been deactivated.
struct RegistryEntry {
    sink: Option<Arc<dyn PeerSink>>,
}

impl RegistryEntry {
    fn is_active(&self) -> bool {
        self.sink.is_some()
    }
}

/// Live-connection set for one group.
pub struct ConnectionRegistry {
    group: Group,
    entries: DashMap<ConnectionId, RegistryEntry>,
}

impl ConnectionRegistry {
    pub fn new(group: Group) -> Self {
        Self {
            group,
            entries: DashMap::new(),
        }
    }

    /// The group this registry belongs to.
    pub fn group(&self) -> Group {
        self.group
    }

    /// Inserts `id` as active.
    ///
    /// # Errors
    ///
    /// Identities are unique per accepted connection, so seeing one twice is a
    /// logic error: it is logged and rejected with
    /// [`RelayError::DuplicateConnection`], and the existing entry is kept.
    pub fn register(&self, id: ConnectionId, sink: Arc<dyn PeerSink>) -> Result<(), RelayError> {
        match self.entries.entry(id) {
            Entry::Occupied(existing) => {
                let id = existing.key().clone();
                error!("{} registry: connection {id} registered twice", self.group);
                Err(RelayError::DuplicateConnection(id))
            }
            Entry::Vacant(slot) => {
                slot.insert(RegistryEntry { sink: Some(sink) });
                Ok(())
            }
        }
    }

    /// Marks `id` inactive and drops the registry's handle to its sink.
    /// Returns `false` if it was never registered.
    pub fn deactivate(&self, id: &ConnectionId) -> bool {
        let released = match self.entries.get_mut(id) {
            Some(mut entry) => entry.sink.take(),
            None => return false,
        };
        // Dropped after the shard lock is released.
        drop(released);
        true
    }

    pub fn is_active(&self, id: &ConnectionId) -> bool {
        self.entries.get(id).is_some_and(|entry| entry.is_active())
    }

    /// Snapshot of every entry that is active right now.
    pub fn active_sinks(&self) -> Vec<(ConnectionId, Arc<dyn PeerSink>)> {
        self.entries
            .iter()
            .filter_map(|entry| {
                let sink = entry.sink.as_ref()?;
                Some((entry.key().clone(), Arc::clone(sink)))
            })
            .collect()
    }

    /// Number of entries, active or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_active()).count()
    }
}

/// The two independent registries owned by a relay instance.
pub struct GroupRegistries {
    pub direct: ConnectionRegistry,
    pub channel: ConnectionRegistry,
}

impl GroupRegistries {
    pub fn new() -> Self {
        Self {
            direct: ConnectionRegistry::new(Group::Direct),
            channel: ConnectionRegistry::new(Group::Channel),
        }
    }

    pub fn get(&self, group: Group) -> &ConnectionRegistry {
        match group {
            Group::Direct => &self.direct,
            Group::Channel => &self.channel,
        }
    }
}

impl Default for GroupRegistries {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
