use events::JobEvent;
use std::collections::VecDeque;

/// Maximum number of events retained for replay.
pub const MAX_BUFFERED_EVENTS: usize = 100;

/// Maximum age of a buffered event in milliseconds (24 hours).
pub const EVENT_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Bounded, time-windowed buffer of recent events.
///
/// Entries are inserted at their timestamp position, so the buffer is always
/// sorted ascending by `occurred_at` even when concurrent ingests reach it
/// out of stamping order. Eviction is oldest first, on overflow past
/// [`MAX_BUFFERED_EVENTS`] or on age past [`EVENT_TTL_MS`]; neither is an
/// error condition.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: VecDeque<JobEvent>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
        }
    }

    /// Insert an event at its timestamp position, dropping the oldest entry
    /// if the bound is exceeded. Events are stamped before the buffer lock is
    /// taken, so two racing ingests can arrive with their timestamps swapped;
    /// positional insert keeps the buffer ascending regardless. Ties insert
    /// after existing entries, preserving arrival order.
    pub fn store(&mut self, event: JobEvent) {
        let at = self
            .events
            .partition_point(|existing| existing.occurred_at <= event.occurred_at);
        self.events.insert(at, event);
        while self.events.len() > MAX_BUFFERED_EVENTS {
            self.events.pop_front();
        }
    }

    /// Drop all entries older than the TTL window, returning how many were
    /// removed. The buffer is sorted, so this is a prefix trim that stops at
    /// the first entry still in window.
    pub fn prune(&mut self, now_ms: i64) -> usize {
        let cutoff = now_ms - EVENT_TTL_MS;
        let before = self.events.len();
        while self
            .events
            .front()
            .is_some_and(|event| event.occurred_at < cutoff)
        {
            self.events.pop_front();
        }
        before - self.events.len()
    }

    /// Events with `occurred_at` strictly after the watermark, ascending.
    pub fn events_since(&self, watermark_ms: i64) -> Vec<JobEvent> {
        self.events
            .iter()
            .filter(|event| event.occurred_at > watermark_ms)
            .cloned()
            .collect()
    }

    /// The most recent `count` events, ascending.
    pub fn recent(&self, count: usize) -> Vec<JobEvent> {
        let skip = self.events.len().saturating_sub(count);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
