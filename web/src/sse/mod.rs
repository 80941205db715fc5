//! SSE HTTP handler for the web layer.
//!
//! This module contains only the axum handler for the stream endpoint.
//! The core infrastructure (hub, buffer, connection registry) lives in the
//! `sse` crate to avoid circular dependencies.

pub mod handler;
