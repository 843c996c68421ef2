//! Command dispatch and the state every handler shares.

pub mod auth;
pub mod playlists;
pub mod ride;
pub mod settings;
mod util;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use powerplay_api::{AuthSession, AuthTokenSet, OAuthConfig};
use powerplay_config::{
    Config, ConfigError, FileConfigStore, KeyringTokenStore, config_path, load_config_from,
};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Loaded configuration plus where it came from.
pub struct Context {
    pub config_path: PathBuf,
    pub config: Config,
    pub color: bool,
}

impl Context {
    pub fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let config_path = global.config.clone().unwrap_or_else(config_path);
        debug!(path = %config_path.display(), "loading config");
        let config = load_config_from(&config_path)?;
        Ok(Self {
            config_path,
            config,
            color: output::should_color(global.color),
        })
    }

    pub fn store(&self) -> FileConfigStore {
        FileConfigStore::new(&self.config_path)
    }

    pub fn token_store(&self) -> KeyringTokenStore {
        KeyringTokenStore::default()
    }

    fn oauth_config(&self) -> Result<OAuthConfig, CliError> {
        self.config
            .spotify
            .oauth_config()
            .map_err(|e| match e {
                ConfigError::MissingClientId => CliError::NoClientId {
                    path: self.config_path.display().to_string(),
                },
                other => other.into(),
            })
    }

    /// A session with no tokens, for the login flow.
    pub fn new_session(&self) -> Result<Arc<AuthSession>, CliError> {
        let session = AuthSession::new(self.oauth_config()?, &self.config.spotify.transport())?;
        Ok(Arc::new(session))
    }

    /// A session primed with the tokens saved by the last login.
    pub fn session(&self) -> Result<(Arc<AuthSession>, TokenSync), CliError> {
        let session = self.new_session()?;
        match self.token_store().load() {
            Ok(Some(tokens)) => session.restore(tokens),
            Ok(None) => debug!("no saved tokens"),
            Err(e) => warn!(error = %e, "could not read saved tokens"),
        }
        let sync = TokenSync::new(&session, self.token_store());
        Ok((session, sync))
    }

    /// A logged-in session, or `NotLoggedIn`.
    pub fn authorized_session(&self) -> Result<(Arc<AuthSession>, TokenSync), CliError> {
        let (session, sync) = self.session()?;
        if session.tokens().is_none() {
            return Err(CliError::NotLoggedIn);
        }
        Ok((session, sync))
    }
}

/// Writes refreshed tokens back to the keyring.
pub struct TokenSync {
    rx: watch::Receiver<Option<AuthTokenSet>>,
    store: KeyringTokenStore,
}

impl TokenSync {
    fn new(session: &AuthSession, store: KeyringTokenStore) -> Self {
        Self {
            rx: session.subscribe_tokens(),
            store,
        }
    }

    /// Wait for the next token replacement and persist it. Returns `false`
    /// once the session is gone.
    pub async fn persist_next(&mut self) -> bool {
        if self.rx.changed().await.is_err() {
            return false;
        }
        self.persist_current();
        true
    }

    /// Persist the latest tokens if they changed since the last call.
    pub fn flush(&mut self) {
        if self.rx.has_changed().unwrap_or(false) {
            self.persist_current();
        }
    }

    fn persist_current(&mut self) {
        let tokens = self.rx.borrow_and_update().clone();
        let result = match tokens {
            Some(tokens) => self.store.save(&tokens),
            None => self.store.clear(),
        };
        if let Err(e) = result {
            warn!(error = %e, "could not persist refreshed tokens");
        }
    }
}

/// Dispatch a parsed command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = Context::load(global)?;
    debug!(command = ?cmd, "dispatching command");

    match cmd {
        Command::Login => auth::login(&ctx, global).await,
        Command::Logout => auth::logout(&ctx, global),
        Command::Status => auth::status(&ctx, global).await,
        Command::Playlists => playlists::handle(&ctx, global).await,
        Command::Ftp(args) => settings::ftp(&ctx, args, global),
        Command::Zones(args) => settings::zones(&ctx, args, global),
        Command::Device(args) => settings::device(&ctx, args, global),
        Command::Reset => settings::reset(&ctx, global),
        Command::Ride(args) => ride::handle(&ctx, &args, global).await,
    }
}
