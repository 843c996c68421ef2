// Web API binding
//
// Playlist listing, playback state, and playback switching. Every call is
// routed through `AuthSession::authorized_request`, so this module only
// deals with URLs, status codes, and payload shapes.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::models::{PlayRequest, PlaybackState, PlayerResponse, Playlist, PlaylistPage};
use crate::error::Error;
use crate::session::{ApiRequest, AuthSession};

/// Page size for `/me/playlists` (provider maximum).
const PLAYLIST_PAGE_LIMIT: u32 = 50;

/// Client for the music service Web API.
///
/// Cheap to clone; shares the underlying [`AuthSession`].
#[derive(Clone)]
pub struct MusicClient {
    session: Arc<AuthSession>,
}

impl MusicClient {
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// All of the user's playlists, following the `next` cursor until the
    /// last page.
    pub async fn list_playlists(&self) -> Result<Vec<Playlist>, Error> {
        let mut playlists = Vec::new();
        let mut next = Some(format!("me/playlists?limit={PLAYLIST_PAGE_LIMIT}"));

        while let Some(path) = next.take() {
            let url = self.session.config().api_url(&path)?;
            let resp = self.session.authorized_request(&ApiRequest::get(url)).await?;
            let page: PlaylistPage = expect_json(resp).await?;

            // Unavailable playlists come back as `null` entries.
            playlists.extend(page.items.into_iter().flatten());
            next = page.next;
        }

        debug!(count = playlists.len(), "fetched playlists");
        Ok(playlists)
    }

    /// A single playlist. Accepts a bare id or a `spotify:playlist:` URI.
    pub async fn playlist(&self, playlist_id: &str) -> Result<Playlist, Error> {
        let id = playlist_id.rsplit(':').next().unwrap_or(playlist_id);
        let url = self
            .session
            .config()
            .api_url(&format!("playlists/{id}?fields=id,name,uri"))?;
        let resp = self.session.authorized_request(&ApiRequest::get(url)).await?;
        expect_json(resp).await
    }

    /// Current playback. HTTP 204 ("no active device") is an idle state,
    /// not an error.
    pub async fn playback_state(&self) -> Result<PlaybackState, Error> {
        let url = self.session.config().api_url("me/player")?;
        let resp = self.session.authorized_request(&ApiRequest::get(url)).await?;

        if resp.status() == StatusCode::NO_CONTENT {
            debug!("no active playback");
            return Ok(PlaybackState::idle());
        }

        let player: PlayerResponse = expect_json(resp).await?;
        Ok(player.into())
    }

    /// Start playing `context_uri` on the active device.
    ///
    /// The service answers with an empty body (204, sometimes 202/200),
    /// all of which count as success.
    pub async fn switch_playback(&self, context_uri: &str) -> Result<(), Error> {
        let url = self.session.config().api_url("me/player/play")?;
        let body = serde_json::to_value(PlayRequest { context_uri }).map_err(|e| {
            Error::Deserialization {
                message: format!("failed to encode play request: {e}"),
                body: String::new(),
            }
        })?;

        let resp = self
            .session
            .authorized_request(&ApiRequest::put_json(url, body))
            .await?;
        expect_success(resp).await?;

        debug!(context_uri, "playback switched");
        Ok(())
    }
}

// ── Response handling ────────────────────────────────────────────────

async fn expect_success(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let raw = resp.text().await.unwrap_or_default();
    Err(Error::ApiRequestFailed {
        status: status.as_u16(),
        message: api_error_message(&raw).unwrap_or_else(|| status.to_string()),
    })
}

async fn expect_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = expect_success(resp).await?.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body,
        }
    })
}

/// Web API errors look like `{"error": {"status": 404, "message": "..."}}`.
fn api_error_message(raw: &str) -> Option<String> {
    #[derive(serde::Deserialize)]
    struct Envelope {
        error: Inner,
    }
    #[derive(serde::Deserialize)]
    struct Inner {
        message: Option<String>,
    }

    serde_json::from_str::<Envelope>(raw)
        .ok()
        .and_then(|e| e.error.message)
        .or_else(|| (!raw.is_empty()).then(|| raw.chars().take(200).collect()))
}
