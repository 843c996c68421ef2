// OAuth2 PKCE session
//
// Owns the authorization-code exchange, the refresh-token lifecycle, and
// the bearer wrapper every Web API call goes through. Concurrent refreshes
// are coalesced behind a gate: a caller that finds the token generation
// already advanced reuses the fresh token instead of refreshing again.

use std::sync::{Mutex, PoisonError, RwLock};

use chrono::Utc;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::OAuthConfig;
use crate::error::Error;
use crate::pkce;
use crate::token::{AuthTokenSet, TokenErrorResponse, TokenResponse};
use crate::transport::TransportConfig;

/// Refresh-and-retry cycles allowed per request after a 401.
pub const MAX_AUTH_RETRIES: u8 = 1;

/// A Web API request that can be re-issued after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            body: None,
        }
    }

    pub fn put_json(url: Url, body: serde_json::Value) -> Self {
        Self {
            method: Method::PUT,
            url,
            body: Some(body),
        }
    }
}

#[derive(Default)]
struct TokenState {
    tokens: Option<AuthTokenSet>,
    /// Bumped on every token replacement; lets waiters detect that a
    /// concurrent refresh already happened.
    generation: u64,
}

/// Authorization session for the music service.
///
/// Construct once at composition time and share behind an `Arc`; every
/// outbound API call goes through [`authorized_request`](Self::authorized_request).
pub struct AuthSession {
    http: reqwest::Client,
    config: OAuthConfig,
    state: RwLock<TokenState>,
    /// Pending PKCE verifier. Lives only for one authorize/exchange round.
    verifier: Mutex<Option<SecretString>>,
    refresh_gate: AsyncMutex<()>,
    token_tx: watch::Sender<Option<AuthTokenSet>>,
}

impl AuthSession {
    /// Create a session with a client built from `transport`.
    pub fn new(config: OAuthConfig, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self::with_client(transport.build_client()?, config))
    }

    /// Create a session around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, config: OAuthConfig) -> Self {
        let (token_tx, _) = watch::channel(None);
        Self {
            http,
            config,
            state: RwLock::new(TokenState::default()),
            verifier: Mutex::new(None),
            refresh_gate: AsyncMutex::new(()),
            token_tx,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    // ── Token state ──────────────────────────────────────────────────

    /// Install previously persisted tokens (e.g. loaded from the keyring).
    pub fn restore(&self, tokens: AuthTokenSet) {
        debug!(expires_at = %tokens.expires_at, "restoring saved tokens");
        self.replace_tokens(Some(tokens));
    }

    /// Drop all tokens. Subsequent authorized calls fail with `Unauthenticated`.
    pub fn logout(&self) {
        info!("clearing session tokens");
        self.replace_tokens(None);
    }

    /// Snapshot of the current tokens.
    pub fn tokens(&self) -> Option<AuthTokenSet> {
        self.read_state().tokens.clone()
    }

    /// An access token is held and has not expired.
    pub fn is_authenticated(&self) -> bool {
        self.read_state()
            .tokens
            .as_ref()
            .is_some_and(|t| t.is_valid_at(Utc::now()))
    }

    /// Watch token replacements (login, refresh, logout) for persistence.
    pub fn subscribe_tokens(&self) -> watch::Receiver<Option<AuthTokenSet>> {
        self.token_tx.subscribe()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, TokenState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace_tokens(&self, tokens: Option<AuthTokenSet>) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.tokens.clone_from(&tokens);
            state.generation += 1;
        }
        self.token_tx.send_replace(tokens);
    }

    fn take_verifier(&self) -> Option<SecretString> {
        self.verifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    // ── Authorization code flow ──────────────────────────────────────

    /// Start a PKCE authorization round.
    ///
    /// Generates and stores a fresh verifier, then returns the authorize
    /// URL the user agent must be sent to. A previous pending verifier is
    /// discarded.
    pub fn begin_authorization(&self) -> Result<Url, Error> {
        let verifier = pkce::generate_verifier();
        let challenge = pkce::challenge_for(&verifier);
        *self.verifier.lock().unwrap_or_else(PoisonError::into_inner) = Some(verifier);

        let mut url = self.config.authorize_url()?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &self.config.scope_param())
            .append_pair("code_challenge_method", pkce::CHALLENGE_METHOD)
            .append_pair("code_challenge", &challenge);

        debug!("authorization round started");
        Ok(url)
    }

    /// Exchange an authorization code for tokens.
    ///
    /// The stored verifier is consumed by the attempt whether it succeeds
    /// or fails.
    pub async fn complete_exchange(&self, code: &str) -> Result<AuthTokenSet, Error> {
        let verifier = self.take_verifier().ok_or(Error::MissingVerifier)?;

        debug!("exchanging authorization code");
        let resp: TokenResponse = self
            .token_request(&[
                ("client_id", self.config.client_id.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("code_verifier", verifier.expose_secret()),
            ])
            .await?;

        let tokens =
            AuthTokenSet::from_response(resp, Utc::now()).ok_or_else(|| Error::TokenRequest {
                status: StatusCode::OK.as_u16(),
                message: "token response did not include a refresh token".into(),
            })?;

        self.replace_tokens(Some(tokens.clone()));
        info!(expires_at = %tokens.expires_at, "authorization complete");
        Ok(tokens)
    }

    /// Finish the flow from the full redirect URL the provider sent back.
    pub async fn complete_exchange_from_redirect(
        &self,
        redirect: &Url,
    ) -> Result<AuthTokenSet, Error> {
        let mut code = None;
        let mut denied = None;
        for (key, value) in redirect.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "error" => denied = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(reason) = denied {
            self.take_verifier();
            return Err(Error::AuthorizationDenied { reason });
        }
        let Some(code) = code else {
            self.take_verifier();
            return Err(Error::AuthorizationDenied {
                reason: "redirect URL carries no authorization code".into(),
            });
        };
        self.complete_exchange(&code).await
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Refresh the access token now, keeping the current refresh token.
    pub async fn refresh(&self) -> Result<(), Error> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// Refresh unless another caller already replaced the tokens since
    /// `seen_generation` was observed.
    async fn refresh_coalesced(&self, seen_generation: u64) -> Result<(), Error> {
        let _gate = self.refresh_gate.lock().await;
        if self.read_state().generation != seen_generation {
            debug!("tokens replaced by a concurrent refresh, reusing them");
            return Ok(());
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<(), Error> {
        let refresh_token = self
            .read_state()
            .tokens
            .as_ref()
            .map(|t| t.refresh_token.clone())
            .ok_or(Error::NoRefreshToken)?;

        debug!("POST token endpoint (refresh_token grant)");
        let resp: TokenResponse = self
            .token_request(&[
                ("client_id", self.config.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
            ])
            .await?;

        let refreshed = {
            let state = self.read_state();
            // Logged out while the refresh was in flight: stay logged out.
            let current = state.tokens.as_ref().ok_or(Error::Unauthenticated)?;
            current.with_refreshed_access(resp, Utc::now())
        };
        info!(expires_at = %refreshed.expires_at, "access token refreshed");
        self.replace_tokens(Some(refreshed));
        Ok(())
    }

    /// Current access token, refreshing first if it has expired.
    async fn usable_access_token(&self) -> Result<(SecretString, u64), Error> {
        let (tokens, generation) = {
            let state = self.read_state();
            (state.tokens.clone(), state.generation)
        };
        let tokens = tokens.ok_or(Error::Unauthenticated)?;
        if tokens.is_valid_at(Utc::now()) {
            return Ok((tokens.access_token, generation));
        }

        debug!("access token expired, refreshing before request");
        self.refresh_coalesced(generation).await?;

        let state = self.read_state();
        let tokens = state.tokens.as_ref().ok_or(Error::Unauthenticated)?;
        Ok((tokens.access_token.clone(), state.generation))
    }

    // ── Authorized requests ──────────────────────────────────────────

    /// Send `request` with the bearer token attached.
    ///
    /// A 401 triggers at most [`MAX_AUTH_RETRIES`] refresh-and-retry
    /// cycles; a 401 after that, or a failed refresh on that path, is
    /// reported as `ApiRequestFailed { status: 401 }`. Any other status is
    /// returned to the caller untouched.
    pub async fn authorized_request(&self, request: &ApiRequest) -> Result<reqwest::Response, Error> {
        let mut auth_retries: u8 = 0;

        loop {
            let (token, generation) = self.usable_access_token().await?;

            debug!("{} {}", request.method, request.url);
            let mut builder = self
                .http
                .request(request.method.clone(), request.url.clone())
                .bearer_auth(token.expose_secret());
            if let Some(ref body) = request.body {
                builder = builder.json(body);
            }
            let resp = builder.send().await?;

            if resp.status() != StatusCode::UNAUTHORIZED {
                return Ok(resp);
            }

            if auth_retries >= MAX_AUTH_RETRIES {
                warn!(url = %request.url, "still unauthorized after token refresh");
                return Err(Error::ApiRequestFailed {
                    status: StatusCode::UNAUTHORIZED.as_u16(),
                    message: "unauthorized after token refresh".into(),
                });
            }
            auth_retries += 1;

            warn!(url = %request.url, "401 from API, refreshing token and retrying");
            self.refresh_coalesced(generation)
                .await
                .map_err(|e| Error::ApiRequestFailed {
                    status: StatusCode::UNAUTHORIZED.as_u16(),
                    message: format!("token refresh failed: {e}"),
                })?;
        }
    }

    // ── Token endpoint ───────────────────────────────────────────────

    async fn token_request<T: DeserializeOwned>(
        &self,
        form: &[(&str, &str)],
    ) -> Result<T, Error> {
        let url = self.config.token_url()?;
        let resp = self.http.post(url).form(form).send().await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<TokenErrorResponse>(&body).map_or_else(
                |_| {
                    if body.is_empty() {
                        status.to_string()
                    } else {
                        body.chars().take(200).collect()
                    }
                },
                |e| match e.error_description {
                    Some(desc) => format!("{}: {desc}", e.error),
                    None => e.error,
                },
            );
            return Err(Error::TokenRequest {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }
}
