//! Hooks for surfacing live notifications to the embedding application.

use events::JobEvent;
use log::*;

/// Callback invoked for events that warrant user-facing notification.
///
/// Only fires for fresh deliveries over the live stream. Replayed backfill
/// and poll-sweep results merge into the log silently.
pub trait EventObserver: Send + Sync {
    fn on_live_event(&self, event: &JobEvent);
}

/// Default observer that just logs each live event.
pub struct LogObserver;

impl EventObserver for LogObserver {
    fn on_live_event(&self, event: &JobEvent) {
        info!(
            "New job event: {:?} \"{}\" at {}",
            event.kind, event.title, event.company
        );
    }
}
