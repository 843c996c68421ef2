//! FTP, zone, and sensor settings.
//!
//! Reads come from the effective config (file plus environment overrides);
//! writes go through `FileConfigStore` so overrides never land in the file.

use serde::Serialize;
use tabled::Tabled;

use powerplay_core::{ConfigStore, RideConfig, Zone};

use super::{Context, util};
use crate::cli::{
    DeviceArgs, DeviceCommand, FtpArgs, FtpCommand, GlobalOpts, ZonesArgs, ZonesCommand,
};
use crate::error::CliError;
use crate::output;

// ── FTP ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct FtpView {
    ftp: i32,
}

pub fn ftp(ctx: &Context, args: FtpArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command.unwrap_or(FtpCommand::Show) {
        FtpCommand::Show => {
            let view = FtpView {
                ftp: ctx.config.ride.ftp,
            };
            let out = output::render_single(
                global.output,
                &view,
                |v| format!("FTP: {} W", v.ftp),
                |v| v.ftp.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        FtpCommand::Set { watts } => {
            ctx.store().update(|ride| ride.set_ftp(watts))?;
            if !global.quiet {
                eprintln!("FTP set to {watts} W");
            }
            Ok(())
        }
    }
}

// ── Zones ───────────────────────────────────────────────────────────

#[derive(Tabled)]
struct ZoneRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Min %")]
    min_percent: i32,
    #[tabled(rename = "Playlist")]
    playlist: String,
}

#[derive(Serialize)]
struct ZoneView {
    position: usize,
    #[serde(flatten)]
    zone: Zone,
}

fn zone_views(zones: &[Zone]) -> Vec<ZoneView> {
    zones
        .iter()
        .enumerate()
        .map(|(i, zone)| ZoneView {
            position: i + 1,
            zone: zone.clone(),
        })
        .collect()
}

fn print_zones(zones: &[Zone], global: &GlobalOpts) -> Result<(), CliError> {
    let views = zone_views(zones);
    let out = output::render_list(
        global.output,
        &views,
        |v| ZoneRow {
            position: v.position,
            min_percent: v.zone.min_power_percent,
            playlist: if v.zone.is_assigned() {
                v.zone.playlist_id.clone()
            } else {
                "(unassigned)".into()
            },
        },
        |v| format!("{}\t{}", v.zone.min_power_percent, v.zone.playlist_id),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub fn zones(ctx: &Context, args: ZonesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let store = ctx.store();
    match args.command.unwrap_or(ZonesCommand::List) {
        ZonesCommand::List => print_zones(&ctx.config.ride.zones, global),

        ZonesCommand::Add {
            min_percent,
            playlist,
        } => {
            let saved = store.update(|ride| {
                ride.add_zone(Zone::new(min_percent, playlist));
                Ok(())
            })?;
            if !global.quiet {
                eprintln!("Zone added at {min_percent}%");
            }
            warn_without_catch_all(&saved);
            Ok(())
        }

        ZonesCommand::Update {
            position,
            min_percent,
            playlist,
        } => {
            let index = util::zone_index(position)?;
            let saved =
                store.update(|ride| ride.update_zone(index, Zone::new(min_percent, playlist)))?;
            if !global.quiet {
                eprintln!("Zone {position} updated");
            }
            warn_without_catch_all(&saved);
            Ok(())
        }

        ZonesCommand::Remove { position } => {
            let index = util::zone_index(position)?;
            let saved = store.update(|ride| ride.remove_zone(index).map(drop))?;
            if !global.quiet {
                eprintln!("Zone {position} removed");
            }
            warn_without_catch_all(&saved);
            Ok(())
        }

        ZonesCommand::Reset => {
            store.update(|ride| {
                ride.set_zones(RideConfig::default().zones);
                Ok(())
            })?;
            if !global.quiet {
                eprintln!("Zones reset to a single unassigned zone");
            }
            Ok(())
        }
    }
}

fn warn_without_catch_all(ride: &RideConfig) {
    if !ride.zone_map().has_catch_all() {
        eprintln!(
            "warning: no zone starts at 0%; efforts below the lowest zone still use it"
        );
    }
}

// ── Device ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DeviceView {
    device_address: Option<String>,
}

pub fn device(ctx: &Context, args: DeviceArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command.unwrap_or(DeviceCommand::Show) {
        DeviceCommand::Show => {
            let view = DeviceView {
                device_address: ctx.config.ride.device_address.clone(),
            };
            let out = output::render_single(
                global.output,
                &view,
                |v| match &v.device_address {
                    Some(address) => format!("Sensor: {address}"),
                    None => "No sensor remembered; the next ride will scan".into(),
                },
                |v| v.device_address.clone().unwrap_or_default(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DeviceCommand::Forget => {
            ctx.store().update(|ride| {
                ride.set_device_address(None);
                Ok(())
            })?;
            if !global.quiet {
                eprintln!("Sensor forgotten");
            }
            Ok(())
        }
    }
}

// ── Reset ───────────────────────────────────────────────────────────

pub fn reset(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    if !util::confirm("Reset FTP and zones to defaults?", global.yes)? {
        return Ok(());
    }
    ctx.store().update(|ride| {
        ride.reset();
        Ok(())
    })?;
    if !global.quiet {
        eprintln!("FTP and zones reset");
    }
    Ok(())
}
