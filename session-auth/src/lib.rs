//! # session-auth
//!
//! Session lifecycle for clients of the talent platform:
//! - Sign-in against the HTTP auth backend
//! - Access-token freshness checks with a safety margin
//! - Single-flight token refresh
//! - Daily forced-logout cutoff clamping
//!
//! The web dashboard and the headless clients share this crate so they agree
//! on when a token is stale and when a session is dead.

pub mod error;
pub mod issuer;
pub mod manager;
pub mod token;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
pub use issuer::{Credentials, HttpIssuer, Issuer};
pub use manager::SessionManager;
pub use token::SessionTokens;
