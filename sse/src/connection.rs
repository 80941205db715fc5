use axum::response::sse::Event;
use dashmap::DashMap;
use log::*;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::UnboundedSender;

/// Unique identifier for a stream connection, assigned from a process-wide
/// monotonic counter when the connection is accepted.
pub type ClientId = u64;

/// Registry of currently connected stream channels.
///
/// The hub exclusively owns the registry; connection teardown paths only ever
/// call [`ConnectionRegistry::unregister`] with their own id, never enumerate
/// other entries.
pub struct ConnectionRegistry {
    connections: DashMap<ClientId, UnboundedSender<Result<Event, Infallible>>>,
    next_client_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_client_id: AtomicU64::new(1),
        }
    }

    /// Register a new connection and return its assigned id - O(1)
    pub fn register(&self, sender: UnboundedSender<Result<Event, Infallible>>) -> ClientId {
        let client_id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        self.connections.insert(client_id, sender);
        client_id
    }

    /// Unregister a connection - O(1), idempotent.
    pub fn unregister(&self, client_id: ClientId) {
        self.connections.remove(&client_id);
    }

    /// Send the event to every registered channel; returns how many channels
    /// delivery was attempted to.
    ///
    /// Channels whose send fails are collected during the sweep and removed
    /// only after iteration completes, so one dead client can neither block
    /// delivery to the rest nor mutate the registry mid-iteration.
    pub fn broadcast(&self, event: Event) -> usize {
        let mut attempted = 0;
        let mut dead = Vec::new();

        for entry in self.connections.iter() {
            attempted += 1;
            if entry.value().send(Ok(event.clone())).is_err() {
                warn!(
                    "Failed to send event to connection {}; connection will be removed",
                    entry.key()
                );
                dead.push(*entry.key());
            }
        }

        for client_id in dead {
            self.connections.remove(&client_id);
        }

        attempted
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
