use url::Url;

use crate::error::Error;

/// Scopes needed to list playlists, read playback state, and switch playback.
pub const DEFAULT_SCOPES: &[&str] = &[
    "playlist-read-private",
    "user-read-playback-state",
    "user-modify-playback-state",
];

const ACCOUNTS_BASE: &str = "https://accounts.spotify.com/";
const API_BASE: &str = "https://api.spotify.com/v1/";

/// OAuth2 client registration and provider endpoints.
///
/// The base URLs are overridable so tests (and self-hosted proxies) can
/// point the session at a different host.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Public client id. PKCE clients have no secret.
    pub client_id: String,
    /// Must match a redirect URI registered for the client.
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
    /// Root of the accounts service (`/authorize`, `/api/token`).
    pub accounts_base: Url,
    /// Root of the Web API, ending in `/v1/`.
    pub api_base: Url,
}

impl OAuthConfig {
    /// Build a config against the production provider endpoints.
    pub fn new(client_id: impl Into<String>, redirect_uri: Url) -> Result<Self, Error> {
        Ok(Self {
            client_id: client_id.into(),
            redirect_uri,
            scopes: DEFAULT_SCOPES.iter().map(|s| (*s).to_owned()).collect(),
            accounts_base: Url::parse(ACCOUNTS_BASE)?,
            api_base: Url::parse(API_BASE)?,
        })
    }

    /// Point both the accounts service and the Web API at `base`.
    ///
    /// The Web API is mounted under `{base}/v1/`.
    pub fn with_base_url(mut self, base: &Url) -> Result<Self, Error> {
        let root = ensure_trailing_slash(base);
        self.api_base = root.join("v1/")?;
        self.accounts_base = root;
        Ok(self)
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// `GET {accounts}/authorize`
    pub fn authorize_url(&self) -> Result<Url, Error> {
        Ok(self.accounts_base.join("authorize")?)
    }

    /// `POST {accounts}/api/token`
    pub fn token_url(&self) -> Result<Url, Error> {
        Ok(self.accounts_base.join("api/token")?)
    }

    /// Resolve a Web API path such as `me/player` against the API root.
    ///
    /// Absolute URLs (pagination cursors) pass through unchanged.
    pub fn api_url(&self, path: &str) -> Result<Url, Error> {
        if let Ok(absolute) = Url::parse(path) {
            return Ok(absolute);
        }
        Ok(self.api_base.join(path.trim_start_matches('/'))?)
    }

    /// Space-separated scope list as sent on the authorize request.
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

fn ensure_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
