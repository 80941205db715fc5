use anyhow::Result;
use colored::*;
use events::JobEvent;
use reconciler::{EventObserver, FileStorage, Reconciler};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::api_client::ApiClient;
use crate::output::TestResult;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_STEP: Duration = Duration::from_millis(200);

/// Observer that records every live event for later assertions.
#[derive(Default, Clone)]
pub struct RecordingObserver {
    seen: Arc<Mutex<Vec<JobEvent>>>,
}

impl EventObserver for RecordingObserver {
    fn on_live_event(&self, event: &JobEvent) {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

impl RecordingObserver {
    fn count(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// A unique job id per run so reruns against a live server do not collide
/// with the de-duplication window.
fn unique_job_id(label: &str) -> String {
    format!(
        "{}-{}-{}",
        label,
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
    )
}

fn fresh_storage(label: &str) -> (FileStorage, PathBuf) {
    let path = std::env::temp_dir().join(format!("sse-test-{}-{}.json", label, std::process::id()));
    let _ = std::fs::remove_file(&path);
    (FileStorage::new(&path), path)
}

/// Restore persisted state, then start both delivery loops in the
/// background. Loading first keeps the reconnect watermark honest.
async fn spawn_reconciler(
    base_url: &str,
    storage: FileStorage,
    observer: RecordingObserver,
) -> Result<(Arc<Reconciler<FileStorage>>, JoinHandle<()>)> {
    let reconciler = Arc::new(
        Reconciler::new(base_url.to_string(), storage).with_observer(Box::new(observer)),
    );
    reconciler.load().await?;
    let handle = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.run().await }
    });
    Ok((reconciler, handle))
}

/// Wait until the server reports more connected clients than `baseline`.
async fn wait_for_connection(api: &ApiClient, baseline: u64) -> Result<()> {
    let deadline = Instant::now() + CONNECT_TIMEOUT;
    loop {
        let status = api.get_status().await?;
        if status["connected_clients"].as_u64().unwrap_or(0) > baseline {
            return Ok(());
        }
        if Instant::now() >= deadline {
            anyhow::bail!("Timed out waiting for the stream connection to register");
        }
        tokio::time::sleep(POLL_STEP).await;
    }
}

async fn connected_clients(api: &ApiClient) -> Result<u64> {
    Ok(api.get_status().await?["connected_clients"]
        .as_u64()
        .unwrap_or(0))
}

/// Live delivery: a freshly connected client is notified of a new event.
pub async fn test_connection(api: &ApiClient, base_url: &str) -> Result<TestResult> {
    println!("{} Running connection test...", "→".blue());
    let name = "connection";

    let baseline = connected_clients(api).await?;
    let observer = RecordingObserver::default();
    let (storage, path) = fresh_storage(name);
    let (reconciler, handle) = spawn_reconciler(base_url, storage, observer.clone()).await?;

    wait_for_connection(api, baseline).await?;
    api.post_job_event("created", "Staff Engineer", "Acme", &unique_job_id(name))
        .await?;

    let deadline = Instant::now() + EVENT_TIMEOUT;
    while observer.count() == 0 && Instant::now() < deadline {
        tokio::time::sleep(POLL_STEP).await;
    }

    let unread = reconciler.unread_count().await;
    handle.abort();
    let _ = std::fs::remove_file(path);

    // Replayed backfill from earlier traffic also lands unread, so only the
    // live count is exact.
    if observer.count() == 1 && unread >= 1 {
        Ok(TestResult::pass(name, "live event delivered and notified"))
    } else {
        Ok(TestResult::fail(
            name,
            format!("saw {} live event(s), {} unread", observer.count(), unread),
        ))
    }
}

/// Replay: events posted while a client is away arrive on reconnect, merged
/// silently instead of notifying again.
pub async fn test_replay(api: &ApiClient, base_url: &str) -> Result<TestResult> {
    println!("{} Running replay test...", "→".blue());
    let name = "replay";

    let baseline = connected_clients(api).await?;
    let observer_a = RecordingObserver::default();
    let (storage, path) = fresh_storage(name);
    let (_, handle_a) = spawn_reconciler(base_url, storage, observer_a.clone()).await?;

    wait_for_connection(api, baseline).await?;
    api.post_job_event("created", "Designer", "Acme", &unique_job_id("replay-live"))
        .await?;

    let deadline = Instant::now() + EVENT_TIMEOUT;
    while observer_a.count() == 0 && Instant::now() < deadline {
        tokio::time::sleep(POLL_STEP).await;
    }
    handle_a.abort();
    if observer_a.count() == 0 {
        let _ = std::fs::remove_file(&path);
        return Ok(TestResult::fail(name, "first client never saw the live event"));
    }

    // Posted while no client of ours is listening.
    api.post_job_event("removed", "Designer", "Acme", &unique_job_id("replay-missed"))
        .await?;

    let baseline = connected_clients(api).await?;
    let observer_b = RecordingObserver::default();
    let (reconciler_b, handle_b) =
        spawn_reconciler(base_url, FileStorage::new(&path), observer_b.clone()).await?;

    wait_for_connection(api, baseline).await?;
    let deadline = Instant::now() + EVENT_TIMEOUT;
    while reconciler_b.records().await.len() < 2 && Instant::now() < deadline {
        tokio::time::sleep(POLL_STEP).await;
    }

    let records = reconciler_b.records().await.len();
    let live_on_reconnect = observer_b.count();
    handle_b.abort();
    let _ = std::fs::remove_file(path);

    if records >= 2 && live_on_reconnect == 0 {
        Ok(TestResult::pass(
            name,
            "missed event replayed on reconnect without re-notifying",
        ))
    } else {
        Ok(TestResult::fail(
            name,
            format!("{} record(s), {} live notification(s) after reconnect", records, live_on_reconnect),
        ))
    }
}

/// Polling safety net: a client with no stream still catches up.
pub async fn test_poll(api: &ApiClient, base_url: &str) -> Result<TestResult> {
    println!("{} Running poll test...", "→".blue());
    let name = "poll";

    let observer = RecordingObserver::default();
    let (storage, path) = fresh_storage(name);
    let reconciler = Reconciler::new(base_url.to_string(), storage)
        .with_observer(Box::new(observer.clone()));

    api.post_job_event("created", "Product Manager", "Acme", &unique_job_id(name))
        .await?;
    let added = reconciler.poll_once().await?;

    let unread = reconciler.unread_count().await;
    let notified = observer.count();
    let _ = std::fs::remove_file(path);

    if added >= 1 && unread >= 1 && notified == 0 {
        Ok(TestResult::pass(name, "poll sweep caught the event silently"))
    } else {
        Ok(TestResult::fail(
            name,
            format!("added {}, unread {}, {} notification(s)", added, unread, notified),
        ))
    }
}
