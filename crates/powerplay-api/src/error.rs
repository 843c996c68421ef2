use thiserror::Error;

/// Top-level error type for the `powerplay-api` crate.
///
/// Covers the OAuth2 credential lifecycle, transport failures, and Web API
/// responses. `powerplay-core` maps these into ride-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authorization ───────────────────────────────────────────────
    /// `complete_exchange` was called without a pending PKCE verifier.
    #[error("No PKCE code verifier found -- start the authorization flow first")]
    MissingVerifier,

    /// A refresh was requested but no refresh token is held.
    #[error("No refresh token available -- log in again")]
    NoRefreshToken,

    /// An authorized request was attempted without an access token.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The authorization server redirected back with an `error` parameter.
    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    /// The token endpoint rejected an `authorization_code` or `refresh_token` grant.
    #[error("Token request failed (HTTP {status}): {message}")]
    TokenRequest { status: u16, message: String },

    // ── Web API ─────────────────────────────────────────────────────
    /// A Web API call returned a non-success status, or kept returning 401
    /// after the single refresh-and-retry.
    #[error("API request failed (HTTP {status}): {message}")]
    ApiRequestFailed { status: u16, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Failed to build the HTTP client.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the user has to go through the login flow again
    /// before any authorized call can succeed.
    pub fn requires_login(&self) -> bool {
        match self {
            Self::Unauthenticated | Self::NoRefreshToken | Self::MissingVerifier => true,
            Self::TokenRequest { status, .. } => *status == 400 || *status == 401,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::ApiRequestFailed { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiRequestFailed { status, .. } | Self::TokenRequest { status, .. } => {
                Some(*status)
            }
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
