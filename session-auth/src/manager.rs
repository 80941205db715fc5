//! Session manager with single-flight refresh locking.

use chrono::{Duration, Utc};
use secrecy::SecretString;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::{token_error, Error, TokenErrorKind};
use crate::issuer::{Credentials, Issuer};
use crate::token::{cap_expiry, SessionTokens, DEFAULT_LIFETIME_SECS};

/// Session manager that coordinates token retrieval and refresh with locking.
///
/// The refresh lock prevents race conditions when multiple concurrent
/// requests find the token stale at the same time. Without locking, each
/// would fire its own refresh, one would succeed, and the rest could fail
/// against a backend that rotates refresh tokens.
pub struct SessionManager<I: Issuer> {
    issuer: I,
    tokens: RwLock<Option<SessionTokens>>,
    refresh_lock: Mutex<()>,
}

impl<I: Issuer> SessionManager<I> {
    /// Create a new session manager backed by the given issuer.
    pub fn new(issuer: I) -> Self {
        Self {
            issuer,
            tokens: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Sign in with credentials and store the issued session, replacing any
    /// existing one.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<(), Error> {
        let issued = self.issuer.sign_in(credentials).await?;

        let now = Utc::now();
        let lifetime = issued.expires_in.unwrap_or(DEFAULT_LIFETIME_SECS);
        let session = SessionTokens {
            access_token: SecretString::from(issued.access_token),
            refresh_token: SecretString::from(issued.refresh_token),
            expires_at: cap_expiry(now + Duration::seconds(lifetime), now),
            roles: issued.roles.into_iter().collect(),
            refresh_failed: false,
        };

        debug!("Signed in, session expires at {}", session.expires_at);
        *self.tokens.write().await = Some(session);
        Ok(())
    }

    /// Get a usable access token, refreshing if the stored one is stale.
    ///
    /// This method:
    /// 1. Returns the stored token if it is still fresh
    /// 2. Otherwise acquires the refresh lock
    /// 3. Re-checks freshness (another request may have refreshed meanwhile)
    /// 4. Performs a single outbound refresh and stores the result
    ///
    /// A failed refresh marks the session dead. Subsequent calls fail
    /// immediately without contacting the backend until the next sign-in.
    pub async fn access_token(&self) -> Result<SecretString, Error> {
        if let Some(token) = self.fresh_token().await? {
            return Ok(token);
        }

        debug!("Access token stale, refreshing");
        let _guard = self.refresh_lock.lock().await;

        // Double-check after acquiring the lock; another request may have
        // completed the refresh while this one waited.
        if let Some(token) = self.fresh_token().await? {
            debug!("Token was refreshed by another request");
            return Ok(token);
        }

        let refresh_token = match self.tokens.read().await.as_ref() {
            Some(session) => session.refresh_token.clone(),
            None => {
                return Err(token_error(
                    TokenErrorKind::NotSignedIn,
                    "Signed out while waiting for refresh",
                ))
            }
        };

        match self.issuer.refresh(&refresh_token).await {
            Ok(refreshed) => {
                let now = Utc::now();
                let lifetime = refreshed.expires_in.unwrap_or(DEFAULT_LIFETIME_SECS);
                let access_token = SecretString::from(refreshed.access_token);

                let mut tokens = self.tokens.write().await;
                if let Some(session) = tokens.as_mut() {
                    session.access_token = access_token.clone();
                    // Keep the old refresh token unless the backend rotated it.
                    if let Some(rotated) = refreshed.refresh_token {
                        session.refresh_token = SecretString::from(rotated);
                    }
                    session.expires_at = cap_expiry(now + Duration::seconds(lifetime), now);
                    debug!("Token refreshed, session now expires at {}", session.expires_at);
                }
                Ok(access_token)
            }
            Err(e) => {
                if let Some(session) = self.tokens.write().await.as_mut() {
                    session.refresh_failed = true;
                }
                Err(token_error(
                    TokenErrorKind::Refresh,
                    &format!("Token refresh failed: {}", e),
                ))
            }
        }
    }

    /// A snapshot of the current session, if signed in. The token inside may
    /// be stale; use [`Self::access_token`] for anything sent to the backend.
    pub async fn session(&self) -> Option<SessionTokens> {
        self.tokens.read().await.clone()
    }

    /// Drop the stored session.
    pub async fn sign_out(&self) {
        debug!("Signing out, discarding session");
        *self.tokens.write().await = None;
    }

    /// The stored access token if it is fresh, an error if there is no live
    /// session to refresh, and `None` when a refresh is warranted.
    async fn fresh_token(&self) -> Result<Option<SecretString>, Error> {
        let tokens = self.tokens.read().await;
        let session = tokens.as_ref().ok_or_else(|| {
            token_error(TokenErrorKind::NotSignedIn, "No session, sign in first")
        })?;

        if session.refresh_failed {
            return Err(token_error(
                TokenErrorKind::Refresh,
                "Previous refresh failed, session requires a new sign-in",
            ));
        }

        if session.is_fresh(Utc::now()) {
            return Ok(Some(session.access_token.clone()));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::issuer::{IssuedSession, RefreshedSession};
    use async_trait::async_trait;
    use secrecy::ExposeSecret;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    struct MockIssuer {
        refresh_calls: AtomicUsize,
        fail_refresh: bool,
        rotate_refresh_token: bool,
    }

    impl MockIssuer {
        fn new() -> Self {
            Self {
                refresh_calls: AtomicUsize::new(0),
                fail_refresh: false,
                rotate_refresh_token: false,
            }
        }
    }

    #[async_trait]
    impl Issuer for MockIssuer {
        async fn sign_in(&self, _credentials: &Credentials) -> Result<IssuedSession, Error> {
            Ok(IssuedSession {
                access_token: "at-0".to_string(),
                refresh_token: "rt-0".to_string(),
                // Issued already stale so the first access_token call must refresh.
                expires_in: Some(0),
                roles: vec!["recruiter".to_string()],
                user: None,
            })
        }

        async fn refresh(&self, _refresh_token: &SecretString) -> Result<RefreshedSession, Error> {
            let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            // Hold the lock long enough for the other tasks to queue up.
            tokio::time::sleep(StdDuration::from_millis(50)).await;

            if self.fail_refresh {
                return Err(token_error(TokenErrorKind::Refresh, "backend said no"));
            }
            Ok(RefreshedSession {
                access_token: format!("at-{}", call + 1),
                refresh_token: self
                    .rotate_refresh_token
                    .then(|| format!("rt-{}", call + 1)),
                expires_in: Some(900),
            })
        }
    }

    async fn signed_in_manager(issuer: MockIssuer) -> Arc<SessionManager<MockIssuer>> {
        let manager = Arc::new(SessionManager::new(issuer));
        manager
            .sign_in(&Credentials {
                email: "recruiter@acme.test".to_string(),
                password: "hunter2".to_string(),
            })
            .await
            .unwrap();
        manager
    }

    #[tokio::test]
    async fn test_concurrent_stale_reads_trigger_one_refresh() {
        let manager = signed_in_manager(MockIssuer::new()).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move { manager.access_token().await }));
        }

        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token.expose_secret(), "at-1");
        }
        assert_eq!(manager.issuer.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_token_retained_when_not_rotated() {
        let manager = signed_in_manager(MockIssuer::new()).await;

        manager.access_token().await.unwrap();

        let session = manager.session().await.unwrap();
        assert_eq!(session.refresh_token.expose_secret(), "rt-0");
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_replaces_stored_one() {
        let manager = signed_in_manager(MockIssuer {
            rotate_refresh_token: true,
            ..MockIssuer::new()
        })
        .await;

        manager.access_token().await.unwrap();

        let session = manager.session().await.unwrap();
        assert_eq!(session.refresh_token.expose_secret(), "rt-1");
    }

    #[tokio::test]
    async fn test_failed_refresh_kills_session_until_sign_in() {
        let manager = signed_in_manager(MockIssuer {
            fail_refresh: true,
            ..MockIssuer::new()
        })
        .await;

        let error = manager.access_token().await.unwrap_err();
        assert_eq!(error.error_kind, ErrorKind::Token(TokenErrorKind::Refresh));

        // The failure is sticky and does not retry against the backend.
        let error = manager.access_token().await.unwrap_err();
        assert_eq!(error.error_kind, ErrorKind::Token(TokenErrorKind::Refresh));
        assert_eq!(manager.issuer.refresh_calls.load(Ordering::SeqCst), 1);

        // A fresh sign-in revives the session.
        manager
            .sign_in(&Credentials {
                email: "recruiter@acme.test".to_string(),
                password: "hunter2".to_string(),
            })
            .await
            .unwrap();
        assert!(!manager.session().await.unwrap().refresh_failed);
    }

    #[tokio::test]
    async fn test_access_token_without_session_fails() {
        let manager = SessionManager::new(MockIssuer::new());
        let error = manager.access_token().await.unwrap_err();
        assert_eq!(
            error.error_kind,
            ErrorKind::Token(TokenErrorKind::NotSignedIn)
        );
    }

    #[tokio::test]
    async fn test_sign_out_discards_session() {
        let manager = signed_in_manager(MockIssuer::new()).await;
        manager.sign_out().await;
        assert!(manager.session().await.is_none());
    }
}
