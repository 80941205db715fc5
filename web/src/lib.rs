//! Web layer for the talent platform's real-time core: the axum router, the
//! ingest/poll/status controllers, and the SSE stream handler. All handlers
//! receive the process-wide hub through `service::AppState`.

pub(crate) mod controller;
pub mod error;
pub(crate) mod params;
pub(crate) mod response;
pub mod router;
pub(crate) mod sse;
