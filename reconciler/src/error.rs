//! Error types for the `reconciler` crate.
//!
//! Follows the same pattern as the server crates with a root Error struct
//! and error kind enums.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the reconciler.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in the reconciler.
///
/// Stream failures have no kind here: the stream loop never propagates them,
/// it logs and reconnects.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Storage(StorageErrorKind),
    Http(HttpErrorKind),
}

/// Errors from the persistence layer.
#[derive(Debug, PartialEq)]
pub enum StorageErrorKind {
    Io,
    Serialization,
}

/// Errors from the polling HTTP client.
#[derive(Debug, PartialEq)]
pub enum HttpErrorKind {
    RequestFailed,
    Network,
    InvalidResponse,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Storage(kind) => write!(f, "Storage error: {:?}", kind),
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}", kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Storage(StorageErrorKind::Io),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Storage(StorageErrorKind::Serialization),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_decode() {
            ErrorKind::Http(HttpErrorKind::InvalidResponse)
        } else if err.is_request() {
            ErrorKind::Http(HttpErrorKind::RequestFailed)
        } else {
            ErrorKind::Http(HttpErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

