//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use powerplay_config::ConfigError;
use powerplay_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const DEVICE: i32 = 4;
    pub const API: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Authorization ────────────────────────────────────────────────
    #[error("Not logged in to Spotify")]
    #[diagnostic(code(powerplay::not_logged_in), help("Run: powerplay login"))]
    NotLoggedIn,

    #[error("Spotify authorization failed: {message}")]
    #[diagnostic(
        code(powerplay::auth_failed),
        help("Run `powerplay login` again and paste the full redirect URL.")
    )]
    AuthFailed { message: String },

    #[error("No Spotify client id configured")]
    #[diagnostic(
        code(powerplay::no_client_id),
        help(
            "Create an app at https://developer.spotify.com/dashboard, then add\n\
             client_id = \"...\" under [spotify] in {path}\n\
             or set POWERPLAY_SPOTIFY__CLIENT_ID."
        )
    )]
    NoClientId { path: String },

    // ── Sensor ───────────────────────────────────────────────────────
    #[error("Power sensor error: {message}")]
    #[diagnostic(code(powerplay::sensor), help("{hint}"))]
    Sensor { message: String, hint: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Spotify API error (HTTP {status}): {message}")]
    #[diagnostic(code(powerplay::api_error))]
    Api { status: u16, message: String },

    #[error("Could not reach Spotify: {message}")]
    #[diagnostic(
        code(powerplay::network),
        help("Check your network connection and try again.")
    )]
    Network { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(powerplay::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(powerplay::config))]
    Config(#[from] ConfigError),

    // ── Internal / IO ────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(powerplay::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(powerplay::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotLoggedIn | Self::AuthFailed { .. } | Self::NoClientId { .. } => {
                exit_code::AUTH
            }
            Self::Sensor { .. } => exit_code::DEVICE,
            Self::Api { .. } => exit_code::API,
            Self::Network { .. } => exit_code::CONNECTION,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    fn sensor(message: impl Into<String>, hint: &str) -> Self {
        Self::Sensor {
            message: message.into(),
            hint: hint.into(),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::PlatformUnsupported => CliError::sensor(
                "Bluetooth LE is not available",
                "Check that Bluetooth is switched on, or try: powerplay ride --simulate 150,220,280",
            ),
            CoreError::DeviceSelectionCancelled => CliError::sensor(
                "no power sensor selected",
                "Wake the sensor (turn the cranks) and run the command again.",
            ),
            CoreError::ConnectionFailed { reason } => CliError::sensor(
                format!("could not connect: {reason}"),
                "Make sure no other app is connected to the sensor.",
            ),
            CoreError::NotConnected => CliError::sensor(
                "sensor is not connected",
                "Run the ride again to reconnect.",
            ),
            CoreError::MalformedMeasurement { len } => CliError::sensor(
                format!("sensor sent a {len}-byte measurement"),
                "The sensor may not implement the Cycling Power profile.",
            ),

            CoreError::MissingVerifier
            | CoreError::NoRefreshToken
            | CoreError::Unauthenticated
            | CoreError::ApiRequestFailed { status: 401, .. } => CliError::NotLoggedIn,

            CoreError::AuthorizationFailed { message } => CliError::AuthFailed { message },

            CoreError::ApiRequestFailed { status, message } => CliError::Api { status, message },

            CoreError::Network { message } => CliError::Network { message },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Config { message } | CoreError::Internal(message) => {
                CliError::Internal(message)
            }
        }
    }
}

impl From<powerplay_api::Error> for CliError {
    fn from(err: powerplay_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
