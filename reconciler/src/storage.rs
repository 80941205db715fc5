//! Persistence for the notification log.
//!
//! The log survives page reloads and client restarts so reconnects can hand
//! the server a meaningful watermark instead of replaying the whole buffer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;
use crate::notifications::{NotificationLog, NotificationRecord};

/// The serialized form of a notification log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    pub records: Vec<NotificationRecord>,
    pub last_seen: i64,
}

impl PersistedState {
    pub fn from_log(log: &NotificationLog) -> Self {
        Self {
            records: log.records().to_vec(),
            last_seen: log.last_seen(),
        }
    }

    pub fn into_log(self) -> NotificationLog {
        NotificationLog::from_parts(self.records, self.last_seen)
    }
}

/// Storage backend for persisting notification state between runs.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Load the persisted state, `None` on first run.
    async fn load(&self) -> Result<Option<PersistedState>, Error>;

    /// Persist the given state, replacing any previous snapshot.
    async fn save(&self, state: &PersistedState) -> Result<(), Error>;
}

/// [`Storage`] backed by a single JSON file.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn load(&self) -> Result<Option<PersistedState>, Error> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<(), Error> {
        let bytes = serde_json::to_vec(state)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}
