use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use serde::Deserialize;

/// Access + refresh token pair held by an [`AuthSession`](crate::AuthSession).
///
/// The refresh token survives access-token refreshes; it is replaced only
/// by a new login.
#[derive(Debug, Clone)]
pub struct AuthTokenSet {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl AuthTokenSet {
    /// Usable iff `now < expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        !self.is_valid_at(Utc::now())
    }

    /// Build from a token-endpoint response received at `now`.
    ///
    /// Returns `None` when the response carries no refresh token, which
    /// only happens on refresh grants.
    pub(crate) fn from_response(resp: TokenResponse, now: DateTime<Utc>) -> Option<Self> {
        let expires_at = expiry_from(now, resp.expires_in);
        let refresh_token = resp.refresh_token?;
        Some(Self {
            access_token: SecretString::from(resp.access_token),
            refresh_token: SecretString::from(refresh_token),
            expires_at,
        })
    }

    /// Swap in a refreshed access token, keeping the current refresh token.
    pub(crate) fn with_refreshed_access(
        &self,
        resp: TokenResponse,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: SecretString::from(resp.access_token),
            refresh_token: self.refresh_token.clone(),
            expires_at: expiry_from(now, resp.expires_in),
        }
    }
}

fn expiry_from(now: DateTime<Utc>, expires_in: i64) -> DateTime<Utc> {
    now + TimeDelta::try_seconds(expires_in).unwrap_or(TimeDelta::zero())
}

/// Successful token-endpoint payload.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
}

/// OAuth2 error payload (`{"error": "invalid_grant", "error_description": "..."}`).
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}
