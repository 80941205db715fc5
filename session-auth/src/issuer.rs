//! Auth backend client.
//!
//! The backend is any HTTP service exposing `/login` and `/refresh`. The
//! [`Issuer`] trait keeps the manager testable without a live backend.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{http_error, Error, HttpErrorKind};

/// Sign-in credentials.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Response body of a successful sign-in.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuedSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires. Absent means the backend left
    /// the lifetime implicit and the default applies.
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Opaque user profile payload, passed through untouched.
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}

/// Response body of a successful token refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshedSession {
    pub access_token: String,
    /// Present only when the backend rotates refresh tokens.
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// An authority that issues and refreshes session tokens.
#[async_trait]
pub trait Issuer: Send + Sync {
    async fn sign_in(&self, credentials: &Credentials) -> Result<IssuedSession, Error>;
    async fn refresh(&self, refresh_token: &SecretString) -> Result<RefreshedSession, Error>;
}

/// [`Issuer`] backed by the platform's HTTP auth service.
pub struct HttpIssuer {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpIssuer {
    /// Create a new issuer for the auth service at `base_url` (no trailing
    /// slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http_client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Issuer for HttpIssuer {
    async fn sign_in(&self, credentials: &Credentials) -> Result<IssuedSession, Error> {
        let response = self
            .http_client
            .post(self.endpoint("/login"))
            .json(credentials)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(http_error(
                HttpErrorKind::RequestFailed,
                &format!("Sign-in rejected with status {}", response.status()),
            ));
        }

        Ok(response.json().await?)
    }

    async fn refresh(&self, refresh_token: &SecretString) -> Result<RefreshedSession, Error> {
        let response = self
            .http_client
            .post(self.endpoint("/refresh"))
            .json(&serde_json::json!({
                "refresh_token": refresh_token.expose_secret(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(http_error(
                HttpErrorKind::RequestFailed,
                &format!("Refresh rejected with status {}", response.status()),
            ));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_sign_in_parses_issued_session() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/login")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"email":"recruiter@acme.test"}"#.to_string(),
            ))
            .with_status(200)
            .with_body(
                r#"{
                    "access_token": "at-1",
                    "refresh_token": "rt-1",
                    "expires_in": 900,
                    "roles": ["recruiter"]
                }"#,
            )
            .create_async()
            .await;

        let issuer = HttpIssuer::new(server.url());
        let session = issuer
            .sign_in(&Credentials {
                email: "recruiter@acme.test".to_string(),
                password: "hunter2".to_string(),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(session.access_token, "at-1");
        assert_eq!(session.refresh_token, "rt-1");
        assert_eq!(session.expires_in, Some(900));
        assert_eq!(session.roles, vec!["recruiter".to_string()]);
    }

    #[tokio::test]
    async fn test_refresh_without_rotation_omits_refresh_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/refresh")
            .with_status(200)
            .with_body(r#"{"access_token": "at-2", "expires_in": 900}"#)
            .create_async()
            .await;

        let issuer = HttpIssuer::new(server.url());
        let refreshed = issuer
            .refresh(&SecretString::from("rt-1".to_string()))
            .await
            .unwrap();

        assert_eq!(refreshed.access_token, "at-2");
        assert!(refreshed.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_rejected_status_maps_to_request_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/refresh")
            .with_status(401)
            .create_async()
            .await;

        let issuer = HttpIssuer::new(server.url());
        let error = issuer
            .refresh(&SecretString::from("rt-stale".to_string()))
            .await
            .unwrap_err();

        assert_eq!(error.error_kind, ErrorKind::Http(HttpErrorKind::RequestFailed));
    }
}
