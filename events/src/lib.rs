//! Wire-level event model for the talent platform's real-time layer.
//!
//! This crate defines the job-board notification events shared by the server
//! hub (`sse`), the web layer, and the client-side `reconciler`. It has no
//! dependencies on other internal crates, avoiding circular dependencies;
//! every layer speaks the same serde-serializable frame types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Trait for getting the SSE event type name of a frame.
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// The kind of change a job event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Created,
    Removed,
}

/// A single job-board notification.
///
/// `occurred_at` is stamped in epoch milliseconds from the server clock at
/// ingest time. It orders the buffer and serves as the client watermark; it
/// is not a sequence number and may repeat under clock adjustment, so
/// consumers de-duplicate rather than compare for strict succession.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobEvent {
    pub kind: JobEventKind,
    /// Title of the job posting.
    pub title: String,
    /// Company the posting belongs to.
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub occurred_at: i64,
    /// Set only on frames re-delivered to a reconnecting client. Live
    /// deliveries omit the field entirely.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub replayed: bool,
}

impl JobEvent {
    pub fn new(
        kind: JobEventKind,
        title: impl Into<String>,
        company: impl Into<String>,
        occurred_at: i64,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            company: company.into(),
            posted_by: None,
            job_id: None,
            occurred_at,
            replayed: false,
        }
    }

    /// Tag this event as a backfill of a buffered event, so clients can merge
    /// it silently instead of treating it as fresh activity.
    pub fn into_replayed(mut self) -> Self {
        self.replayed = true;
        self
    }
}

impl EventType for JobEvent {
    fn event_type(&self) -> &'static str {
        match self.kind {
            JobEventKind::Created => "job_created",
            JobEventKind::Removed => "job_removed",
        }
    }
}

/// Handshake frame sent once when a stream connection is accepted, carrying
/// the server-assigned connection identifier.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Connected {
    pub kind: String,
    pub client_id: u64,
}

impl Connected {
    pub fn new(client_id: u64) -> Self {
        Self {
            kind: "connected".to_string(),
            client_id,
        }
    }
}

impl EventType for Connected {
    fn event_type(&self) -> &'static str {
        "connected"
    }
}
