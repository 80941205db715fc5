use events::JobEvent;
use serde::Serialize;
use utoipa::ToSchema;

/// Acknowledgement returned to the ingest caller. `delivered_to` counts the
/// channels delivery was attempted to; per-channel failures are resolved
/// inside the hub and never fail the ingest.
#[derive(Debug, Serialize, ToSchema)]
pub struct IngestResponse {
    pub accepted: bool,
    pub delivered_to: usize,
}

/// Buffered events newer than the caller-supplied watermark, ascending.
#[derive(Debug, Serialize, ToSchema)]
pub struct PollResponse {
    pub events: Vec<JobEvent>,
}

/// Operational snapshot of the hub for the status endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub connected_clients: usize,
    pub buffered_events: usize,
    pub recent_events: Vec<JobEvent>,
}
