//! Session token types and expiry policy.

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use std::collections::HashSet;

/// Seconds before the nominal expiry at which a token stops counting as
/// fresh. Covers request latency so a token that passes the check here is
/// still accepted when it reaches the backend.
pub const EXPIRY_MARGIN_SECS: i64 = 30;

/// Lifetime assumed when the auth backend omits `expires_in`.
pub const DEFAULT_LIFETIME_SECS: i64 = 3600;

/// Hour of day (UTC) past which no session may survive. Every token expiry
/// is clamped to the next occurrence of this cutoff.
pub const FORCED_LOGOUT_HOUR_UTC: i64 = 13;

/// Tokens for one signed-in session.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    /// Access token attached to API requests.
    pub access_token: SecretString,
    /// Refresh token for obtaining new access tokens.
    pub refresh_token: SecretString,
    /// When the access token expires, after daily-cutoff clamping.
    pub expires_at: DateTime<Utc>,
    /// Roles granted to the signed-in user.
    pub roles: HashSet<String>,
    /// Set once a refresh attempt has failed. The session is then dead until
    /// a fresh sign-in; no further refreshes are attempted.
    pub refresh_failed: bool,
}

impl SessionTokens {
    /// Whether the access token can still be used, leaving the safety margin
    /// before nominal expiry.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now
    }
}

/// The next daily forced-logout cutoff strictly after `now`.
pub fn next_forced_logout(now: DateTime<Utc>) -> DateTime<Utc> {
    let day_start = now
        - Duration::seconds(now.timestamp().rem_euclid(86_400))
        - Duration::nanoseconds(i64::from(now.timestamp_subsec_nanos()));
    let cutoff = day_start + Duration::hours(FORCED_LOGOUT_HOUR_UTC);

    if cutoff > now {
        cutoff
    } else {
        cutoff + Duration::days(1)
    }
}

/// Clamp a token expiry to the next forced-logout cutoff. A token may end
/// earlier than the cutoff, never later.
pub fn cap_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    expires_at.min(next_forced_logout(now))
}
