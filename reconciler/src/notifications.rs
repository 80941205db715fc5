//! Client-side notification log with de-duplication.
//!
//! The stream and the polling safety net both feed this log, so the same
//! job event routinely arrives twice. Events carry no server-side identity
//! beyond their timestamp, so duplicates are detected by content: same kind,
//! same job, timestamps within a small window.

use events::{JobEvent, JobEventKind};
use serde::{Deserialize, Serialize};

/// Oldest entries are dropped once the log grows past this.
pub const MAX_STORED_NOTIFICATIONS: usize = 50;

/// Two events with matching kind and job are considered the same occurrence
/// when their timestamps differ by at most this much.
pub const DEDUP_WINDOW_MS: i64 = 10_000;

/// One entry in the notification log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub event: JobEvent,
    pub read: bool,
}

/// Result of merging an incoming event into the log.
#[derive(Debug, PartialEq)]
pub enum MergeOutcome {
    Added,
    Duplicate,
}

/// The merged, ordered, capped set of notifications a client has seen.
#[derive(Debug, Default, Clone)]
pub struct NotificationLog {
    records: Vec<NotificationRecord>,
    last_seen: i64,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from persisted state.
    pub fn from_parts(records: Vec<NotificationRecord>, last_seen: i64) -> Self {
        Self { records, last_seen }
    }

    /// Merge one incoming event, regardless of which path delivered it.
    ///
    /// Duplicates are dropped; new events are inserted unread, the log is
    /// re-sorted by timestamp, capped, and the watermark advanced.
    pub fn merge(&mut self, event: JobEvent) -> MergeOutcome {
        if self.records.iter().any(|record| is_same_occurrence(&record.event, &event)) {
            return MergeOutcome::Duplicate;
        }

        self.last_seen = self.last_seen.max(event.occurred_at);
        self.records.push(NotificationRecord { event, read: false });
        self.records.sort_by_key(|record| record.event.occurred_at);
        if self.records.len() > MAX_STORED_NOTIFICATIONS {
            let excess = self.records.len() - MAX_STORED_NOTIFICATIONS;
            self.records.drain(..excess);
        }
        MergeOutcome::Added
    }

    /// Mark every entry read. Returns how many changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for record in &mut self.records {
            if !record.read {
                record.read = true;
                changed += 1;
            }
        }
        changed
    }

    pub fn unread_count(&self) -> usize {
        self.records.iter().filter(|record| !record.read).count()
    }

    /// The watermark to hand the server on reconnect or poll: the newest
    /// timestamp this log has absorbed.
    pub fn last_seen(&self) -> i64 {
        self.last_seen
    }

    pub fn records(&self) -> &[NotificationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Content identity for de-duplication. The `replayed` tag and delivery path
/// are ignored; a replayed copy of a live event is still the same event.
fn is_same_occurrence(a: &JobEvent, b: &JobEvent) -> bool {
    a.kind == b.kind
        && a.job_id == b.job_id
        && (a.occurred_at - b.occurred_at).abs() <= DEDUP_WINDOW_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: JobEventKind, job_id: Option<&str>, occurred_at: i64) -> JobEvent {
        let mut event = JobEvent::new(kind, "Engineer", "Acme", occurred_at);
        event.job_id = job_id.map(String::from);
        event
    }

    #[test]
    fn test_duplicate_within_window_is_dropped() {
        let mut log = NotificationLog::new();
        assert_eq!(
            log.merge(event(JobEventKind::Created, Some("J1"), 1_000)),
            MergeOutcome::Added
        );
        // Same event redelivered by the poll sweep a few seconds later.
        assert_eq!(
            log.merge(event(JobEventKind::Created, Some("J1"), 1_000 + DEDUP_WINDOW_MS)),
            MergeOutcome::Duplicate
        );
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_outside_window_is_a_new_occurrence() {
        let mut log = NotificationLog::new();
        log.merge(event(JobEventKind::Created, Some("J1"), 1_000));
        assert_eq!(
            log.merge(event(
                JobEventKind::Created,
                Some("J1"),
                1_000 + DEDUP_WINDOW_MS + 1
            )),
            MergeOutcome::Added
        );
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_different_kind_or_job_is_not_a_duplicate() {
        let mut log = NotificationLog::new();
        log.merge(event(JobEventKind::Created, Some("J1"), 1_000));
        assert_eq!(
            log.merge(event(JobEventKind::Removed, Some("J1"), 1_000)),
            MergeOutcome::Added
        );
        assert_eq!(
            log.merge(event(JobEventKind::Created, Some("J2"), 1_000)),
            MergeOutcome::Added
        );
    }

    #[test]
    fn test_missing_job_ids_compare_equal() {
        let mut log = NotificationLog::new();
        log.merge(event(JobEventKind::Created, None, 1_000));
        assert_eq!(
            log.merge(event(JobEventKind::Created, None, 2_000)),
            MergeOutcome::Duplicate
        );
    }

    #[test]
    fn test_log_is_capped_dropping_oldest() {
        let mut log = NotificationLog::new();
        for i in 0..(MAX_STORED_NOTIFICATIONS as i64 + 5) {
            log.merge(event(
                JobEventKind::Created,
                Some(&format!("J{}", i)),
                i * (DEDUP_WINDOW_MS + 1),
            ));
        }
        assert_eq!(log.len(), MAX_STORED_NOTIFICATIONS);
        assert_eq!(
            log.records()[0].event.occurred_at,
            5 * (DEDUP_WINDOW_MS + 1)
        );
    }

    #[test]
    fn test_out_of_order_merge_keeps_records_sorted() {
        let mut log = NotificationLog::new();
        log.merge(event(JobEventKind::Created, Some("J2"), 50_000));
        log.merge(event(JobEventKind::Created, Some("J1"), 20_000));

        let timestamps: Vec<i64> = log
            .records()
            .iter()
            .map(|r| r.event.occurred_at)
            .collect();
        assert_eq!(timestamps, vec![20_000, 50_000]);
        // Watermark stays at the newest timestamp ever absorbed.
        assert_eq!(log.last_seen(), 50_000);
    }

    #[test]
    fn test_mark_all_read() {
        let mut log = NotificationLog::new();
        log.merge(event(JobEventKind::Created, Some("J1"), 1_000));
        log.merge(event(JobEventKind::Removed, Some("J2"), 20_000));
        assert_eq!(log.unread_count(), 2);

        assert_eq!(log.mark_all_read(), 2);
        assert_eq!(log.unread_count(), 0);
        assert_eq!(log.mark_all_read(), 0);
    }
}
