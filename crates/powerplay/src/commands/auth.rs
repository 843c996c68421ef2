//! Login, logout, and status.

use chrono::Utc;
use dialoguer::Input;
use serde::Serialize;
use url::Url;

use powerplay_api::MusicClient;

use super::{Context, util};
use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Login / logout ──────────────────────────────────────────────────

pub async fn login(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let session = ctx.new_session()?;
    let authorize_url = session.begin_authorization()?;

    eprintln!("Open this URL in your browser and approve access:\n");
    eprintln!("  {}\n", output::accent(authorize_url.as_str(), ctx.color));
    eprintln!(
        "{}",
        output::muted(
            "Your browser will land on the redirect URI (the page may not load).",
            ctx.color
        )
    );

    let pasted: String = Input::new()
        .with_prompt("Paste the full URL from the address bar")
        .interact_text()
        .map_err(util::prompt_err)?;
    let redirect = Url::parse(pasted.trim()).map_err(|e| CliError::Validation {
        field: "redirect URL".into(),
        reason: e.to_string(),
    })?;

    let tokens = session.complete_exchange_from_redirect(&redirect).await?;
    ctx.token_store().save(&tokens)?;

    if !global.quiet {
        eprintln!(
            "Logged in. Access token refreshes automatically (current one valid until {}).",
            tokens.expires_at.format("%H:%M UTC")
        );
    }
    Ok(())
}

pub fn logout(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    ctx.token_store().clear()?;
    if !global.quiet {
        eprintln!("Logged out");
    }
    Ok(())
}

// ── Status ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Status {
    logged_in: bool,
    token_expires_at: Option<chrono::DateTime<Utc>>,
    ftp: i32,
    device_address: Option<String>,
    zones: usize,
    is_playing: Option<bool>,
    playing_context: Option<String>,
    playing_name: Option<String>,
}

pub async fn status(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let ride = &ctx.config.ride;
    let mut status = Status {
        logged_in: false,
        token_expires_at: None,
        ftp: ride.ftp,
        device_address: ride.device_address.clone(),
        zones: ride.zones.len(),
        is_playing: None,
        playing_context: None,
        playing_name: None,
    };

    // Missing client id or tokens just means "not logged in" here.
    if let Ok((session, mut sync)) = ctx.authorized_session() {
        status.logged_in = true;
        let client = MusicClient::new(session.clone());
        match client.playback_state().await {
            Ok(playback) => {
                status.is_playing = Some(playback.is_playing);
                if let Some(uri) = playback.context_uri.as_deref() {
                    status.playing_name = playlist_name(&client, uri).await;
                }
                status.playing_context = playback.context_uri;
            }
            Err(e) if e.requires_login() => status.logged_in = false,
            Err(e) => tracing::warn!(error = %e, "could not read playback state"),
        }
        status.token_expires_at = session.tokens().map(|t| t.expires_at);
        sync.flush();
    }

    let rendered = output::render_single(
        global.output,
        &status,
        |s| detail(s, ctx.color),
        |s| if s.logged_in { "logged-in" } else { "logged-out" }.to_owned(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

async fn playlist_name(client: &MusicClient, context_uri: &str) -> Option<String> {
    if !context_uri.starts_with("spotify:playlist:") {
        return None;
    }
    match client.playlist(context_uri).await {
        Ok(playlist) => Some(playlist.name),
        Err(e) => {
            tracing::debug!(error = %e, "could not look up playing playlist");
            None
        }
    }
}

fn detail(s: &Status, color: bool) -> String {
    let login = if s.logged_in {
        output::accent("logged in", color)
    } else {
        output::muted("not logged in (run: powerplay login)", color)
    };
    let device = s
        .device_address
        .clone()
        .unwrap_or_else(|| output::muted("none remembered", color));
    let playing = s.playing_name.as_ref().or(s.playing_context.as_ref());
    let playback = match (s.is_playing, playing) {
        (Some(true), Some(what)) => format!("playing {what}"),
        (Some(true), None) => "playing".into(),
        (Some(false), _) => "paused / no active device".into(),
        (None, _) => output::muted("unknown", color),
    };

    format!(
        "Spotify:  {login}\n\
         FTP:      {} W\n\
         Zones:    {}\n\
         Sensor:   {device}\n\
         Playback: {playback}",
        s.ftp, s.zones
    )
}
