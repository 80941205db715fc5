//! Server-Sent Events (SSE) infrastructure for real-time job notifications.
//!
//! This crate provides the process-wide hub that fans job events out to every
//! connected dashboard client and buffers recent events for replay.
//!
//! # Architecture
//!
//! - **Bounded replay buffer**: the last 100 events within a 24h window are
//!   retained so a reconnecting client can be backfilled from its watermark.
//! - **Broadcast delivery**: every ingested event goes to every registered
//!   connection; routing by recipient is not needed for the jobs board.
//! - **Dead-channel sweeping**: a connection whose channel send fails is
//!   removed after the broadcast sweep, never mid-iteration.
//! - **Monotonic client ids**: connections are identified by a process-wide
//!   counter, returned to the client in the handshake frame.
//!
//! # Message Flow
//!
//! 1. Application code posts a job event to the ingest endpoint
//! 2. The hub stamps and stores the event, then broadcasts it
//! 3. Each open stream connection receives the frame over its channel
//! 4. Reconnecting clients present their `last_seen` watermark and receive
//!    the missed events tagged as replayed
//! 5. The poll endpoint reads the same buffer as a fallback path
//!
//! # Modules
//!
//! - `buffer`: bounded, time-windowed event buffer
//! - `connection`: connection registry with deferred dead-channel removal
//! - `hub`: high-level facade combining buffer and registry

pub mod buffer;
pub mod connection;
pub mod hub;

pub use connection::ClientId;
pub use hub::{Hub, HubStats};
