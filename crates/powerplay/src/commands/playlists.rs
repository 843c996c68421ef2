//! Playlist listing.

use tabled::Tabled;

use powerplay_api::{MusicClient, Playlist};

use super::Context;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct PlaylistRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "URI")]
    uri: String,
}

impl From<&Playlist> for PlaylistRow {
    fn from(p: &Playlist) -> Self {
        Self {
            name: p.name.clone(),
            id: p.id.clone(),
            uri: p.uri.clone(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let (session, mut sync) = ctx.authorized_session()?;
    let client = MusicClient::new(session);
    let result = client.list_playlists().await;
    sync.flush();

    let playlists = result?;
    if playlists.is_empty() && matches!(global.output, OutputFormat::Table) {
        if !global.quiet {
            eprintln!("No playlists found");
        }
        return Ok(());
    }
    let out = output::render_list(
        global.output,
        &playlists,
        |p| PlaylistRow::from(p),
        |p| p.id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
