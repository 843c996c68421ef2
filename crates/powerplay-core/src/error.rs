// ── Core error types ──
//
// Ride-level errors from powerplay-core. Device failures originate here;
// API failures are translated from `powerplay_api::Error` so consumers see
// the auth taxonomy without raw transport details.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device errors ────────────────────────────────────────────────
    #[error("Bluetooth LE is not available on this host")]
    PlatformUnsupported,

    #[error("No power sensor was selected")]
    DeviceSelectionCancelled,

    #[error("Could not connect to power sensor: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Power sensor is not connected")]
    NotConnected,

    /// A measurement notification too short to carry flags + power.
    #[error("Malformed power measurement ({len} bytes)")]
    MalformedMeasurement { len: usize },

    // ── Authorization errors ─────────────────────────────────────────
    #[error("No PKCE code verifier found -- start the login flow again")]
    MissingVerifier,

    #[error("No refresh token available -- log in again")]
    NoRefreshToken,

    #[error("Not logged in to the music service")]
    Unauthenticated,

    #[error("Authorization failed: {message}")]
    AuthorizationFailed { message: String },

    // ── API errors ───────────────────────────────────────────────────
    #[error("Music service request failed (HTTP {status}): {message}")]
    ApiRequestFailed { status: u16, message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Device-link class errors: the sensor is absent, unreachable, or
    /// sending data that cannot be read.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            Self::PlatformUnsupported
                | Self::DeviceSelectionCancelled
                | Self::ConnectionFailed { .. }
                | Self::NotConnected
                | Self::MalformedMeasurement { .. }
        )
    }

    /// The user must log in again before music calls can succeed.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::MissingVerifier | Self::NoRefreshToken | Self::Unauthenticated
        ) || matches!(self, Self::ApiRequestFailed { status: 401, .. })
    }
}

// ── Conversion from API-layer errors ─────────────────────────────────

impl From<powerplay_api::Error> for CoreError {
    fn from(err: powerplay_api::Error) -> Self {
        use powerplay_api::Error as Api;

        match err {
            Api::MissingVerifier => Self::MissingVerifier,
            Api::NoRefreshToken => Self::NoRefreshToken,
            Api::Unauthenticated => Self::Unauthenticated,
            Api::AuthorizationDenied { reason } => Self::AuthorizationFailed { message: reason },
            Api::TokenRequest { status, message } => Self::AuthorizationFailed {
                message: format!("token endpoint returned HTTP {status}: {message}"),
            },
            Api::ApiRequestFailed { status, message } => Self::ApiRequestFailed { status, message },
            Api::Transport(e) => {
                if let Some(status) = e.status() {
                    Self::ApiRequestFailed {
                        status: status.as_u16(),
                        message: e.to_string(),
                    }
                } else {
                    Self::Network {
                        message: e.to_string(),
                    }
                }
            }
            Api::Tls(message) => Self::Network { message },
            Api::InvalidUrl(e) => Self::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Deserialization { message, body: _ } => {
                Self::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
