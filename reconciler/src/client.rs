//! The reconciler: one merged view of job events from two delivery paths.
//!
//! A live SSE stream provides immediacy and a periodic poll of the event
//! endpoint provides completeness. Both feed the same [`NotificationLog`],
//! which de-duplicates, so neither path needs to be reliable on its own.

use eventsource_client as es;
use events::{Connected, JobEvent};
use futures_util::stream::StreamExt;
use log::*;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::Error;
use crate::notifications::{MergeOutcome, NotificationLog, NotificationRecord};
use crate::observer::EventObserver;
use crate::storage::{PersistedState, Storage};

/// Seconds between poll sweeps of the event endpoint.
pub const POLL_INTERVAL_SECS: u64 = 30;

/// Seconds to wait before re-establishing a dropped stream connection.
pub const RECONNECT_DELAY_SECS: u64 = 5;

/// Client-side event reconciler.
///
/// Owns the notification log, keeps it persisted through `S`, and runs the
/// stream and poll loops that feed it.
pub struct Reconciler<S: Storage> {
    base_url: String,
    storage: S,
    http_client: reqwest::Client,
    log: Mutex<NotificationLog>,
    observer: Option<Box<dyn EventObserver>>,
    visible: AtomicBool,
}

#[derive(Deserialize)]
struct PollBody {
    events: Vec<JobEvent>,
}

impl<S: Storage> Reconciler<S> {
    /// Create a reconciler for the server at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>, storage: S) -> Self {
        Self {
            base_url: base_url.into(),
            storage,
            http_client: reqwest::Client::new(),
            log: Mutex::new(NotificationLog::new()),
            observer: None,
            visible: AtomicBool::new(true),
        }
    }

    /// Attach an observer for live events.
    pub fn with_observer(mut self, observer: Box<dyn EventObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Restore the log from storage. Call once before starting the loops.
    pub async fn load(&self) -> Result<(), Error> {
        if let Some(state) = self.storage.load().await? {
            let restored = state.into_log();
            debug!(
                "Restored {} notification(s), watermark {}",
                restored.len(),
                restored.last_seen()
            );
            *self.log.lock().await = restored;
        }
        Ok(())
    }

    /// Merge one event into the log, persisting on change. `live` marks a
    /// fresh stream delivery; only those reach the observer.
    pub async fn absorb(&self, event: JobEvent, live: bool) -> Result<MergeOutcome, Error> {
        let (outcome, snapshot) = {
            let mut log = self.log.lock().await;
            let outcome = log.merge(event.clone());
            let snapshot = matches!(outcome, MergeOutcome::Added)
                .then(|| PersistedState::from_log(&log));
            (outcome, snapshot)
        };

        if let Some(state) = snapshot {
            self.storage.save(&state).await?;
            if live {
                if let Some(observer) = &self.observer {
                    observer.on_live_event(&event);
                }
            }
        }
        Ok(outcome)
    }

    /// Mark every logged notification read and persist.
    pub async fn mark_all_read(&self) -> Result<usize, Error> {
        let (changed, snapshot) = {
            let mut log = self.log.lock().await;
            let changed = log.mark_all_read();
            (changed, PersistedState::from_log(&log))
        };
        if changed > 0 {
            self.storage.save(&snapshot).await?;
        }
        Ok(changed)
    }

    pub async fn unread_count(&self) -> usize {
        self.log.lock().await.unread_count()
    }

    pub async fn last_seen(&self) -> i64 {
        self.log.lock().await.last_seen()
    }

    pub async fn records(&self) -> Vec<NotificationRecord> {
        self.log.lock().await.records().to_vec()
    }

    /// Tell the reconciler whether the embedding UI is visible. The poll
    /// sweep pauses while hidden; the stream stays up either way.
    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Relaxed);
    }

    /// One poll sweep: fetch everything newer than the watermark and merge
    /// it silently. Returns how many events were new.
    pub async fn poll_once(&self) -> Result<usize, Error> {
        let url = format!(
            "{}/jobs/events?last_seen={}",
            self.base_url,
            self.last_seen().await
        );
        let body: PollBody = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut added = 0;
        for event in body.events {
            if self.absorb(event, false).await? == MergeOutcome::Added {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Run both delivery loops until the task is dropped.
    pub async fn run(&self) {
        tokio::join!(self.stream_loop(), self.poll_loop());
    }

    async fn poll_loop(&self) {
        let mut interval = tokio::time::interval(Duration::from_secs(POLL_INTERVAL_SECS));
        // The first tick fires immediately; the stream replay already covers
        // startup, so skip it.
        interval.tick().await;

        loop {
            interval.tick().await;
            if !self.visible.load(Ordering::Relaxed) {
                continue;
            }
            match self.poll_once().await {
                Ok(added) if added > 0 => {
                    debug!("Poll sweep caught {} missed event(s)", added);
                }
                Ok(_) => {}
                Err(e) => warn!("Poll sweep failed, will retry: {}", e),
            }
        }
    }

    async fn stream_loop(&self) {
        loop {
            let url = format!(
                "{}/notifications/stream?last_seen={}",
                self.base_url,
                self.last_seen().await
            );

            match es::ClientBuilder::for_url(&url) {
                Ok(builder) => {
                    let client = builder.build();
                    self.consume_stream(client).await;
                }
                Err(e) => warn!("Failed to build stream client: {}", e),
            }

            debug!("Stream disconnected, reconnecting in {}s", RECONNECT_DELAY_SECS);
            tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)).await;
        }
    }

    async fn consume_stream(&self, client: impl es::Client) {
        let mut stream = client.stream();

        loop {
            match stream.next().await {
                Some(Ok(es::SSE::Event(frame))) => {
                    self.handle_frame(&frame.event_type, &frame.data).await;
                }
                Some(Ok(es::SSE::Comment(_))) => {
                    // Ignore comments (keep-alive)
                }
                Some(Err(e)) => {
                    warn!("Stream error: {}", e);
                    break;
                }
                None => {
                    debug!("Stream ended");
                    break;
                }
            }
        }
    }

    async fn handle_frame(&self, event_type: &str, data: &str) {
        match event_type {
            "connected" => match serde_json::from_str::<Connected>(data) {
                Ok(handshake) => debug!("Stream connected as client {}", handshake.client_id),
                Err(e) => warn!("Malformed handshake frame: {}", e),
            },
            "job_created" | "job_removed" => match serde_json::from_str::<JobEvent>(data) {
                Ok(event) => {
                    let live = !event.replayed;
                    if let Err(e) = self.absorb(event, live).await {
                        warn!("Failed to absorb stream event: {}", e);
                    }
                }
                Err(e) => warn!("Malformed job event frame: {}", e),
            },
            other => debug!("Ignoring unknown event type: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::JobEventKind;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Default, Clone)]
    struct MemoryStorage {
        state: Arc<StdMutex<Option<PersistedState>>>,
        saves: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Storage for MemoryStorage {
        async fn load(&self) -> Result<Option<PersistedState>, Error> {
            Ok(self.state.lock().unwrap().clone())
        }

        async fn save(&self, state: &PersistedState) -> Result<(), Error> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.state.lock().unwrap() = Some(state.clone());
            Ok(())
        }
    }

    #[derive(Default, Clone)]
    struct RecordingObserver {
        seen: Arc<StdMutex<Vec<JobEvent>>>,
    }

    impl EventObserver for RecordingObserver {
        fn on_live_event(&self, event: &JobEvent) {
            self.seen.lock().unwrap().push(event.clone());
        }
    }

    fn event(job_id: &str, occurred_at: i64) -> JobEvent {
        let mut event = JobEvent::new(JobEventKind::Created, "Engineer", "Acme", occurred_at);
        event.job_id = Some(job_id.to_string());
        event
    }

    fn reconciler_with(
        storage: MemoryStorage,
        observer: RecordingObserver,
    ) -> Reconciler<MemoryStorage> {
        Reconciler::new("http://localhost:4000", storage).with_observer(Box::new(observer))
    }

    #[tokio::test]
    async fn test_live_events_reach_the_observer() {
        let observer = RecordingObserver::default();
        let reconciler = reconciler_with(MemoryStorage::default(), observer.clone());

        reconciler.absorb(event("J1", 1_000), true).await.unwrap();
        assert_eq!(observer.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_silent_merges_skip_the_observer() {
        let observer = RecordingObserver::default();
        let reconciler = reconciler_with(MemoryStorage::default(), observer.clone());

        // Replayed backfill and poll results merge without notifying.
        reconciler
            .absorb(event("J1", 1_000).into_replayed(), false)
            .await
            .unwrap();
        reconciler.absorb(event("J2", 20_000), false).await.unwrap();
        assert!(observer.seen.lock().unwrap().is_empty());
        assert_eq!(reconciler.unread_count().await, 2);
    }

    #[tokio::test]
    async fn test_duplicates_do_not_notify_or_persist_again() {
        let observer = RecordingObserver::default();
        let storage = MemoryStorage::default();
        let reconciler = reconciler_with(storage.clone(), observer.clone());

        reconciler.absorb(event("J1", 1_000), true).await.unwrap();
        let outcome = reconciler.absorb(event("J1", 2_000), true).await.unwrap();

        assert_eq!(outcome, MergeOutcome::Duplicate);
        assert_eq!(observer.seen.lock().unwrap().len(), 1);
        assert_eq!(storage.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_restores_watermark_and_records() {
        let storage = MemoryStorage::default();
        {
            let seed = Reconciler::new("http://localhost:4000", storage.clone());
            seed.absorb(event("J1", 40_000), false).await.unwrap();
            seed.mark_all_read().await.unwrap();
        }

        let reconciler = Reconciler::new("http://localhost:4000", storage);
        reconciler.load().await.unwrap();
        assert_eq!(reconciler.last_seen().await, 40_000);
        assert_eq!(reconciler.records().await.len(), 1);
        assert_eq!(reconciler.unread_count().await, 0);
    }

    #[tokio::test]
    async fn test_mark_all_read_persists_once() {
        let storage = MemoryStorage::default();
        let reconciler = Reconciler::new("http://localhost:4000", storage.clone());
        reconciler.absorb(event("J1", 1_000), false).await.unwrap();

        assert_eq!(reconciler.mark_all_read().await.unwrap(), 1);
        assert_eq!(storage.saves.load(Ordering::SeqCst), 2);
        // Nothing left unread, so no further write.
        assert_eq!(reconciler.mark_all_read().await.unwrap(), 0);
        assert_eq!(storage.saves.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stream_frame_dispatch() {
        let observer = RecordingObserver::default();
        let reconciler = reconciler_with(MemoryStorage::default(), observer.clone());

        reconciler
            .handle_frame("connected", r#"{"kind":"connected","client_id":7}"#)
            .await;
        reconciler
            .handle_frame(
                "job_created",
                r#"{"kind":"created","title":"Engineer","company":"Acme","occurred_at":1000}"#,
            )
            .await;
        reconciler
            .handle_frame(
                "job_removed",
                r#"{"kind":"removed","title":"Engineer","company":"Acme","occurred_at":60000,"replayed":true}"#,
            )
            .await;
        // Malformed payloads are logged and dropped.
        reconciler.handle_frame("job_created", "not json").await;

        assert_eq!(reconciler.records().await.len(), 2);
        // Only the non-replayed frame counted as live.
        assert_eq!(observer.seen.lock().unwrap().len(), 1);
        assert_eq!(reconciler.last_seen().await, 60_000);
    }
}
