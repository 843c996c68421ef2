//! Clap derive structures for the `powerplay` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// powerplay -- switch playlists by cycling power zone
#[derive(Debug, Parser)]
#[command(
    name = "powerplay",
    version,
    about = "Switch Spotify playlists as your cycling power moves between zones",
    long_about = "Reads instantaneous power from a Bluetooth Cycling Power sensor,\n\
        compares it with your FTP, and starts the playlist bound to the\n\
        zone you are riding in.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "POWERPLAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authorize powerplay with your Spotify account
    Login,

    /// Forget stored Spotify tokens
    Logout,

    /// Show login, ride settings, and current playback
    Status,

    /// List your playlists (ids to use with `zones add`)
    #[command(alias = "pl")]
    Playlists,

    /// Show or set functional threshold power
    Ftp(FtpArgs),

    /// Manage power zones
    #[command(alias = "z")]
    Zones(ZonesArgs),

    /// Show or forget the remembered power sensor
    Device(DeviceArgs),

    /// Reset FTP and zones to defaults
    Reset,

    /// Connect to the sensor and switch playlists as you ride
    Ride(RideArgs),
}

// ── FTP ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct FtpArgs {
    #[command(subcommand)]
    pub command: Option<FtpCommand>,
}

#[derive(Debug, Subcommand)]
pub enum FtpCommand {
    /// Print the current FTP
    Show,

    /// Set FTP in watts
    Set {
        /// Watts, must be positive
        #[arg(allow_negative_numbers = true)]
        watts: i32,
    },
}

// ── Zones ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ZonesArgs {
    #[command(subcommand)]
    pub command: Option<ZonesCommand>,
}

#[derive(Debug, Subcommand)]
pub enum ZonesCommand {
    /// List zones, highest threshold first
    #[command(alias = "ls")]
    List,

    /// Add a zone
    Add {
        /// Lowest effort (percent of FTP) for this zone
        #[arg(allow_negative_numbers = true)]
        min_percent: i32,

        /// Playlist id or spotify: URI (empty leaves the zone unassigned)
        #[arg(long, short = 'p', default_value = "")]
        playlist: String,
    },

    /// Replace the zone at a position shown by `zones list`
    Update {
        /// 1-based position
        position: usize,

        #[arg(allow_negative_numbers = true)]
        min_percent: i32,

        #[arg(long, short = 'p', default_value = "")]
        playlist: String,
    },

    /// Remove the zone at a position shown by `zones list`
    #[command(alias = "rm")]
    Remove {
        /// 1-based position
        position: usize,
    },

    /// Replace all zones with the single catch-all default
    Reset,
}

// ── Device ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DeviceArgs {
    #[command(subcommand)]
    pub command: Option<DeviceCommand>,
}

#[derive(Debug, Subcommand)]
pub enum DeviceCommand {
    /// Print the remembered sensor
    Show,

    /// Forget the remembered sensor so the next ride asks again
    Forget,
}

// ── Ride ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RideArgs {
    /// Replay these watt readings from a simulated sensor instead of
    /// scanning for a real one
    #[arg(
        long,
        value_delimiter = ',',
        allow_negative_numbers = true,
        value_name = "WATTS"
    )]
    pub simulate: Option<Vec<i16>>,

    /// Delay between simulated readings
    #[arg(long, default_value = "1000")]
    pub interval_ms: u64,

    /// Print zone changes instead of switching playback
    #[arg(long)]
    pub dry_run: bool,

    /// Seconds to scan for sensors
    #[arg(long, default_value = "5")]
    pub scan_secs: u64,
}
