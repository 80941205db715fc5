use crate::buffer::EventBuffer;
use crate::connection::{ClientId, ConnectionRegistry};
use axum::response::sse::Event;
use chrono::Utc;
use events::{EventType, JobEvent};
use log::*;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc::UnboundedSender;

/// Number of buffered events exposed by [`Hub::stats`].
const RECENT_EVENTS_SHOWN: usize = 5;

/// Read-only snapshot of the hub for operational introspection.
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub connected_clients: usize,
    pub buffered_events: usize,
    pub recent_events: Vec<JobEvent>,
}

/// Process-wide event hub: the bounded buffer of recent events plus the
/// registry of connected stream channels.
///
/// One instance exists per process, constructed at startup and injected into
/// the ingest/stream/poll handlers through `AppState` rather than reached as
/// ambient global state. Buffer mutations are serialized behind a single
/// mutex; broadcasts never hold it, and channel sends are non-blocking
/// (unbounded mpsc), so a slow client cannot stall ingestion for the rest.
pub struct Hub {
    buffer: Mutex<EventBuffer>,
    registry: ConnectionRegistry,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(EventBuffer::new()),
            registry: ConnectionRegistry::new(),
        }
    }

    /// Current server clock in epoch milliseconds, the ordering key stamped
    /// onto every ingested event.
    pub fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn buffer(&self) -> MutexGuard<'_, EventBuffer> {
        // A poisoned lock only means a panic elsewhere; the buffer itself is
        // still structurally valid, so recover rather than propagate.
        self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store then broadcast; returns how many channels delivery was
    /// attempted to. Delivery failures are handled inside the registry and
    /// never surface to the ingest caller.
    pub fn publish(&self, event: JobEvent) -> usize {
        self.store(event.clone());
        self.broadcast(&event)
    }

    /// Append to the buffer, evicting the oldest entry past the bound.
    pub fn store(&self, event: JobEvent) {
        self.buffer().store(event);
    }

    /// Drop buffered events older than the TTL window, returning how many
    /// were removed.
    pub fn prune(&self, now_ms: i64) -> usize {
        self.buffer().prune(now_ms)
    }

    /// Serialize the event once and fan it out to every registered channel.
    pub fn broadcast(&self, event: &JobEvent) -> usize {
        let event_data = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize event for broadcast: {e}");
                return 0;
            }
        };

        let frame = Event::default().event(event.event_type()).data(event_data);
        self.registry.broadcast(frame)
    }

    /// Register a new stream connection and return its assigned id.
    pub fn register_connection(
        &self,
        sender: UnboundedSender<Result<Event, Infallible>>,
    ) -> ClientId {
        let client_id = self.registry.register(sender);
        info!("Registered stream connection {client_id}");
        client_id
    }

    /// Unregister a stream connection by id. Idempotent; safe to call from
    /// any teardown trigger.
    pub fn unregister_connection(&self, client_id: ClientId) {
        info!("Unregistering stream connection {client_id}");
        self.registry.unregister(client_id);
    }

    /// Consistent snapshot of buffered events newer than the watermark,
    /// ascending by `occurred_at`. Serves both replay-on-connect and the
    /// polling safety net.
    pub fn events_since(&self, watermark_ms: i64) -> Vec<JobEvent> {
        self.buffer().events_since(watermark_ms)
    }

    /// Read-only counters and the most recent few events.
    pub fn stats(&self) -> HubStats {
        let buffer = self.buffer();
        HubStats {
            connected_clients: self.registry.len(),
            buffered_events: buffer.len(),
            recent_events: buffer.recent(RECENT_EVENTS_SHOWN),
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
