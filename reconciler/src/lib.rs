//! # reconciler
//!
//! Client-side event reconciliation for the talent platform's real-time
//! layer:
//! - Live SSE stream consumption with automatic reconnect
//! - Periodic polling safety net for frames the stream missed
//! - Content-based de-duplication across both paths
//! - A capped, persisted notification log with read tracking
//!
//! The dashboard and the headless test client both embed this crate, so a
//! notification means the same thing everywhere: merged once, notified once.

pub mod client;
pub mod error;
pub mod notifications;
pub mod observer;
pub mod storage;

// Re-export commonly used types
pub use client::Reconciler;
pub use error::{Error, ErrorKind};
pub use notifications::{MergeOutcome, NotificationLog, NotificationRecord};
pub use observer::{EventObserver, LogObserver};
pub use storage::{FileStorage, PersistedState, Storage};
