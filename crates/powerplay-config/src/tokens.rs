// Token persistence in the OS keyring.
//
// The whole token set is stored as one JSON secret so access token,
// refresh token, and expiry always move together.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use powerplay_api::AuthTokenSet;

use crate::ConfigError;

const KEYRING_SERVICE: &str = "powerplay";
const KEYRING_ACCOUNT: &str = "spotify/tokens";

/// Serialized form of `AuthTokenSet`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for StoredTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl From<&AuthTokenSet> for StoredTokens {
    fn from(tokens: &AuthTokenSet) -> Self {
        Self {
            access_token: tokens.access_token.expose_secret().to_owned(),
            refresh_token: tokens.refresh_token.expose_secret().to_owned(),
            expires_at: tokens.expires_at,
        }
    }
}

impl From<StoredTokens> for AuthTokenSet {
    fn from(stored: StoredTokens) -> Self {
        Self {
            access_token: SecretString::from(stored.access_token),
            refresh_token: SecretString::from(stored.refresh_token),
            expires_at: stored.expires_at,
        }
    }
}

impl StoredTokens {
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Token set stored under one keyring entry.
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    service: String,
    account: String,
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE, KEYRING_ACCOUNT)
    }
}

impl KeyringTokenStore {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, ConfigError> {
        Ok(keyring::Entry::new(&self.service, &self.account)?)
    }

    /// `None` when nothing has been stored yet.
    pub fn load(&self) -> Result<Option<AuthTokenSet>, ConfigError> {
        match self.entry()?.get_password() {
            Ok(raw) => Ok(Some(StoredTokens::from_json(&raw)?.into())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, tokens: &AuthTokenSet) -> Result<(), ConfigError> {
        let raw = StoredTokens::from(tokens).to_json()?;
        self.entry()?.set_password(&raw)?;
        debug!(account = %self.account, "tokens saved to keyring");
        Ok(())
    }

    /// Remove stored tokens. Missing entries are not an error.
    pub fn clear(&self) -> Result<(), ConfigError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
