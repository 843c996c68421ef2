// Web API payload shapes. Only the fields powerplay reads are modelled;
// serde ignores the rest.

use serde::{Deserialize, Serialize};

/// A playlist owned or followed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    /// Context URI, e.g. `spotify:playlist:37i9dQZF1DXcBWIGoYBM5M`.
    pub uri: String,
}

/// Current playback as seen by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub is_playing: bool,
    /// Context being played, if any. `None` when nothing is active.
    pub context_uri: Option<String>,
}

impl PlaybackState {
    /// The "no active device" result (HTTP 204).
    pub fn idle() -> Self {
        Self::default()
    }
}

/// Context URI for a playlist id. Values that already are URIs pass through.
pub fn playlist_context_uri(playlist_id: &str) -> String {
    if playlist_id.starts_with("spotify:") {
        playlist_id.to_owned()
    } else {
        format!("spotify:playlist:{playlist_id}")
    }
}

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistPage {
    #[serde(default)]
    pub items: Vec<Option<Playlist>>,
    /// Absolute URL of the next page, `null` on the last page.
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlayerResponse {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub context: Option<PlayerContext>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlayerContext {
    #[serde(default)]
    pub uri: Option<String>,
}

impl From<PlayerResponse> for PlaybackState {
    fn from(resp: PlayerResponse) -> Self {
        Self {
            is_playing: resp.is_playing,
            context_uri: resp.context.and_then(|c| c.uri),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PlayRequest<'a> {
    pub context_uri: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ids_become_playlist_uris() {
        assert_eq!(playlist_context_uri("abc123"), "spotify:playlist:abc123");
        assert_eq!(
            playlist_context_uri("spotify:playlist:abc123"),
            "spotify:playlist:abc123"
        );
    }

    #[test]
    fn player_without_context_maps_to_none() {
        let resp: PlayerResponse =
            serde_json::from_str(r#"{"is_playing": true, "context": null}"#).expect("valid json");
        let state = PlaybackState::from(resp);
        assert!(state.is_playing);
        assert_eq!(state.context_uri, None);
    }
}
