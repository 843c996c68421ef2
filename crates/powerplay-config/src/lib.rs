//! Configuration for powerplay.
//!
//! The TOML config file (ride settings + music service client
//! registration), its platform path, a file-backed
//! `powerplay_core::ConfigStore`, and OS-keyring persistence for the OAuth
//! token set.

mod store;
mod tokens;

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use powerplay_api::{DEFAULT_SCOPES, OAuthConfig, TransportConfig};
use powerplay_core::{CoreError, RideConfig};

pub use store::FileConfigStore;
pub use tokens::{KeyringTokenStore, StoredTokens};

/// Environment prefix for overrides, e.g. `POWERPLAY_RIDE__FTP=280`.
pub const ENV_PREFIX: &str = "POWERPLAY_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no music service client id configured (set spotify.client_id)")]
    MissingClientId,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("stored tokens are unreadable: {0}")]
    TokenFormat(#[from] serde_json::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CoreError::ValidationFailed {
                message: format!("{field}: {reason}"),
            },
            other => CoreError::Config {
                message: other.to_string(),
            },
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub ride: RideConfig,

    #[serde(default)]
    pub spotify: SpotifySettings,
}

/// Music service client registration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SpotifySettings {
    /// Client id from the developer dashboard.
    pub client_id: Option<String>,

    /// Redirect URI registered for the client.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Serve both the accounts service and the Web API from this host.
    pub base_url: Option<String>,
}

impl Default for SpotifySettings {
    fn default() -> Self {
        Self {
            client_id: None,
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            timeout: default_timeout(),
            base_url: None,
        }
    }
}

fn default_redirect_uri() -> String {
    "http://127.0.0.1:8888/callback".into()
}
fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|s| (*s).to_owned()).collect()
}
fn default_timeout() -> u64 {
    30
}

impl SpotifySettings {
    /// Build the OAuth client config. Requires `client_id`.
    pub fn oauth_config(&self) -> Result<OAuthConfig, ConfigError> {
        let client_id = self
            .client_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingClientId)?;

        let redirect_uri = parse_url("spotify.redirect_uri", &self.redirect_uri)?;
        let config = OAuthConfig::new(client_id, redirect_uri)
            .map_err(|e| validation("spotify", e))?
            .with_scopes(self.scopes.clone());

        match self.base_url.as_deref() {
            Some(base) => {
                let base = parse_url("spotify.base_url", base)?;
                config
                    .with_base_url(&base)
                    .map_err(|e| validation("spotify.base_url", e))
            }
            None => Ok(config),
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default().with_timeout(Duration::from_secs(self.timeout))
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

fn validation(field: &str, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: err.to_string(),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "powerplay", "powerplay").map_or_else(
        || PathBuf::from(".powerplay").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the canonical path plus environment overrides.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Defaults, then the TOML file at `path` (if present), then
/// `POWERPLAY_`-prefixed environment variables (`__` separates sections).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = file_figment(path).merge(Env::prefixed(ENV_PREFIX).split("__"));
    extract(&figment)
}

/// Defaults plus the file only. Used when the result will be written back.
pub fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    extract(&file_figment(path))
}

fn file_figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
}

fn extract(figment: &Figment) -> Result<Config, ConfigError> {
    let mut config: Config = figment.extract()?;
    config.ride.normalize();
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
