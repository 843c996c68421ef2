#![allow(clippy::unwrap_used)]
// Integration tests for `MusicClient` using wiremock.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use powerplay_api::{
    AuthSession, AuthTokenSet, Error, MusicClient, OAuthConfig, PlaybackState, Playlist,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, MusicClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let config = OAuthConfig::new(
        "test-client",
        Url::parse("http://127.0.0.1:8888/callback").unwrap(),
    )
    .unwrap()
    .with_base_url(&base)
    .unwrap();
    let session = AuthSession::with_client(reqwest::Client::new(), config);
    session.restore(AuthTokenSet {
        access_token: SecretString::from("access-1"),
        refresh_token: SecretString::from("refresh-1"),
        expires_at: Utc::now() + TimeDelta::hours(1),
    });
    (server, MusicClient::new(Arc::new(session)))
}

fn playlist_json(id: &str, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "uri": format!("spotify:playlist:{id}"),
        "public": false,
        "tracks": { "total": 12 }
    })
}

// ── Playlists ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_playlists_follows_next_cursor() {
    let (server, client) = setup().await;
    let next = format!("{}/v1/me/playlists?offset=2&limit=50", server.uri());

    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [playlist_json("p3", "Cooldown")],
            "next": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .and(query_param("limit", "50"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [playlist_json("p1", "Threshold"), null, playlist_json("p2", "Sprint")],
            "next": next
        })))
        .expect(1)
        .mount(&server)
        .await;

    let playlists = client.list_playlists().await.unwrap();

    let ids: Vec<&str> = playlists.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
    assert_eq!(
        playlists[2],
        Playlist {
            id: "p3".into(),
            name: "Cooldown".into(),
            uri: "spotify:playlist:p3".into(),
        }
    );
}

#[tokio::test]
async fn test_playlist_lookup_accepts_uri() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/playlists/p9"))
        .and(query_param("fields", "id,name,uri"))
        .respond_with(ResponseTemplate::new(200).set_body_json(playlist_json("p9", "VO2")))
        .expect(2)
        .mount(&server)
        .await;

    let by_id = client.playlist("p9").await.unwrap();
    let by_uri = client.playlist("spotify:playlist:p9").await.unwrap();
    assert_eq!(by_id, by_uri);
    assert_eq!(by_id.name, "VO2");
}

#[tokio::test]
async fn test_list_playlists_surfaces_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/playlists"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "status": 429, "message": "API rate limit exceeded" }
        })))
        .mount(&server)
        .await;

    let result = client.list_playlists().await;

    let err = result.unwrap_err();
    assert!(err.is_transient());
    match err {
        Error::ApiRequestFailed { status, message } => {
            assert_eq!(status, 429);
            assert_eq!(message, "API rate limit exceeded");
        }
        other => panic!("expected ApiRequestFailed, got: {other:?}"),
    }
}

// ── Playback state ──────────────────────────────────────────────────

#[tokio::test]
async fn test_playback_state_no_content_is_idle() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let state = client.playback_state().await.unwrap();

    assert_eq!(state, PlaybackState::idle());
}

#[tokio::test]
async fn test_playback_state_reads_context() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "is_playing": true,
            "progress_ms": 1200,
            "context": { "type": "playlist", "uri": "spotify:playlist:p1" },
            "device": { "id": "dev-1", "name": "Kitchen" }
        })))
        .mount(&server)
        .await;

    let state = client.playback_state().await.unwrap();

    assert_eq!(
        state,
        PlaybackState {
            is_playing: true,
            context_uri: Some("spotify:playlist:p1".into()),
        }
    );
}

// ── Playback switch ─────────────────────────────────────────────────

#[tokio::test]
async fn test_switch_playback_accepts_empty_success() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/v1/me/player/play"))
        .and(body_json(json!({ "context_uri": "spotify:playlist:p2" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.switch_playback("spotify:playlist:p2").await.unwrap();
}

#[tokio::test]
async fn test_switch_playback_without_device_fails() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/v1/me/player/play"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "status": 404,
                "message": "Player command failed: No active device found",
                "reason": "NO_ACTIVE_DEVICE"
            }
        })))
        .mount(&server)
        .await;

    let result = client.switch_playback("spotify:playlist:p2").await;

    match result {
        Err(Error::ApiRequestFailed { status, message }) => {
            assert_eq!(status, 404);
            assert!(message.contains("No active device"), "got: {message}");
        }
        other => panic!("expected ApiRequestFailed, got: {other:?}"),
    }
}
