//! The ride loop: sensor samples in, playlist switches out.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use dialoguer::Select;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, warn};

use powerplay_api::MusicClient;
use powerplay_core::{
    ConfigStore, CoreError, DeviceFilter, DeviceInfo, PlaybackController, PlaybackTarget,
    PowerSample, SensorPlatform, SimulatedPlatform, SimulatedSensor, SwitchOutcome, TelemetrySource,
};

use super::{Context, TokenSync};
use crate::cli::{GlobalOpts, RideArgs};
use crate::error::CliError;
use crate::output;

const SIMULATED_SENSOR_ID: &str = "SIM-0001";

// ── Playback target ─────────────────────────────────────────────────

/// Spotify, or nowhere at all for `--dry-run`.
enum RideTarget {
    Music(MusicClient),
    DryRun,
}

impl PlaybackTarget for RideTarget {
    async fn switch_playback(&self, playlist_id: &str) -> Result<(), CoreError> {
        match self {
            Self::Music(client) => PlaybackTarget::switch_playback(client, playlist_id).await,
            Self::DryRun => {
                debug!(playlist = playlist_id, "dry run, not switching");
                Ok(())
            }
        }
    }
}

// ── Summary ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize)]
struct RideSummary {
    sensor: String,
    samples: u64,
    switches: u64,
    max_watts: Option<i32>,
    last_playlist: Option<String>,
}

impl RideSummary {
    fn detail(&self) -> String {
        let max = self
            .max_watts
            .map_or_else(|| "-".to_owned(), |w| format!("{w} W"));
        format!(
            "Ride finished on {}\n  samples:  {}\n  switches: {}\n  max:      {max}",
            self.sensor, self.samples, self.switches
        )
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: &RideArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(watts) = &args.simulate {
        let sensor = SimulatedSensor::from_watts(SIMULATED_SENSOR_ID, watts)
            .with_interval(Duration::from_millis(args.interval_ms));
        let platform = SimulatedPlatform::new(vec![sensor]);
        return ride(ctx, args, global, platform, false).await;
    }
    let platform = hardware_platform(args)?;
    ride(ctx, args, global, platform, true).await
}

#[cfg(feature = "bluetooth")]
#[allow(clippy::unnecessary_wraps)]
fn hardware_platform(
    args: &RideArgs,
) -> Result<powerplay_core::telemetry::btle::BlePlatform, CliError> {
    Ok(powerplay_core::telemetry::btle::BlePlatform::default()
        .with_scan_window(Duration::from_secs(args.scan_secs)))
}

#[cfg(not(feature = "bluetooth"))]
fn hardware_platform(args: &RideArgs) -> Result<SimulatedPlatform, CliError> {
    Err(CliError::Sensor {
        message: format!(
            "this build cannot scan for sensors (asked for a {}s scan)",
            args.scan_secs
        ),
        hint: "Rebuild with `--features bluetooth`, or try: powerplay ride --simulate 150,220,280"
            .into(),
    })
}

/// Offer discovered sensors. A single candidate is used without asking.
fn choose_sensor(candidates: &[DeviceInfo]) -> Option<usize> {
    match candidates {
        [] => None,
        [only] => {
            eprintln!("Found {only}");
            Some(0)
        }
        _ => Select::new()
            .with_prompt("Pick your power sensor")
            .items(candidates)
            .default(0)
            .interact_opt()
            .ok()
            .flatten(),
    }
}

async fn next_tokens(sync: &mut Option<TokenSync>) -> bool {
    match sync {
        Some(sync) => sync.persist_next().await,
        None => false,
    }
}

/// Errors no later sample can recover from. A 401 that survived the
/// refresh-and-retry is left to the next sample like any other failed switch.
fn is_fatal(err: &CoreError) -> bool {
    matches!(
        err,
        CoreError::Unauthenticated
            | CoreError::NoRefreshToken
            | CoreError::MissingVerifier
            | CoreError::AuthorizationFailed { .. }
    )
}

/// Handle one sample unless `interrupted` fires first. A pending switch
/// must not hold off Ctrl-C.
async fn handle_or_interrupt<T, F>(
    controller: &PlaybackController<T>,
    sample: PowerSample,
    interrupted: Pin<&mut F>,
) -> Option<Result<SwitchOutcome, CoreError>>
where
    T: PlaybackTarget,
    F: Future,
{
    tokio::select! {
        biased;
        _ = interrupted => None,
        outcome = controller.handle_sample(sample) => Some(outcome),
    }
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

#[allow(clippy::too_many_lines)]
async fn ride<P: SensorPlatform>(
    ctx: &Context,
    args: &RideArgs,
    global: &GlobalOpts,
    platform: P,
    remember: bool,
) -> Result<(), CliError> {
    let ride_config = &ctx.config.ride;

    // Log in before touching the sensor so a missing login fails fast.
    let (target, mut sync) = if args.dry_run {
        (RideTarget::DryRun, None)
    } else {
        let (session, sync) = ctx.authorized_session()?;
        (RideTarget::Music(MusicClient::new(session)), Some(sync))
    };

    let mut source = TelemetrySource::new(platform);
    let filter = if remember {
        DeviceFilter::cycling_power().with_address(ride_config.device_address.clone())
    } else {
        DeviceFilter::cycling_power()
    };
    if !global.quiet {
        eprintln!("Scanning for power sensors...");
    }
    let device = source.select_device(&filter, choose_sensor).await?;

    if remember && ride_config.device_address.as_deref() != Some(device.id.as_str()) {
        let saved = ctx.store().update(|ride| {
            ride.set_device_address(Some(device.id.clone()));
            Ok(())
        });
        if let Err(e) = saved {
            warn!(error = %e, "could not remember sensor");
        }
    }

    if let Err(e) = source.connect().await {
        source.disconnect().await;
        return Err(e.into());
    }
    let mut samples = match source.subscribe().await {
        Ok(samples) => samples,
        Err(e) => {
            source.disconnect().await;
            return Err(e.into());
        }
    };

    let controller = PlaybackController::new(target, ride_config.ftp, ride_config.zone_map());
    let status = controller.subscribe();
    let bar = spinner(global.quiet);
    bar.set_message(format!("riding with {} (ctrl-c to stop)", device.display_name()));

    let mut summary = RideSummary {
        sensor: device.to_string(),
        ..RideSummary::default()
    };
    let mut watching_tokens = sync.is_some();
    let mut failure = None;

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            biased;
            _ = &mut interrupted => {
                debug!("interrupted");
                break;
            }
            alive = next_tokens(&mut sync), if watching_tokens => {
                watching_tokens = alive;
            }
            sample = samples.recv() => {
                let Some(sample) = sample else {
                    debug!("sample stream ended");
                    break;
                };
                summary.samples += 1;
                summary.max_watts = summary.max_watts.max(Some(sample.watts));

                let Some(outcome) =
                    handle_or_interrupt(&controller, sample, interrupted.as_mut()).await
                else {
                    debug!("interrupted during a playback switch");
                    break;
                };
                let percent = status.borrow().percent.unwrap_or_default();
                bar.set_message(format!("{:>4} W  {percent:>3}% FTP", sample.watts));

                match outcome {
                    Ok(SwitchOutcome::Switched(playlist)) => {
                        summary.switches += 1;
                        let line = format!(
                            "{:>4} W {percent:>4}%  -> {}",
                            sample.watts,
                            output::accent(&playlist, ctx.color)
                        );
                        if !global.quiet {
                            bar.suspend(|| println!("{line}"));
                        }
                        summary.last_playlist = Some(playlist);
                    }
                    Ok(outcome) => debug!(?outcome, "sample handled"),
                    Err(e) if is_fatal(&e) => {
                        failure = Some(e);
                        break;
                    }
                    Err(e) => {
                        bar.suspend(|| eprintln!("warning: {e}"));
                    }
                }
            }
        }
    }

    bar.finish_and_clear();
    source.disconnect().await;
    controller.reset();
    if let Some(sync) = sync.as_mut() {
        sync.flush();
    }

    if let Some(e) = failure {
        return Err(e.into());
    }

    let out = output::render_single(
        global.output,
        &summary,
        RideSummary::detail,
        |s| s.switches.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use powerplay_core::{Zone, ZoneMap};

    use super::*;

    /// A service that never answers.
    struct Stalled;

    impl PlaybackTarget for Stalled {
        async fn switch_playback(&self, _playlist_id: &str) -> Result<(), CoreError> {
            std::future::pending().await
        }
    }

    fn zones() -> ZoneMap {
        ZoneMap::new(vec![Zone::new(0, "easy")])
    }

    #[tokio::test]
    async fn interrupt_wins_over_a_stalled_switch() {
        let controller = PlaybackController::new(Stalled, 200, zones());
        let interrupted = std::future::ready(());
        tokio::pin!(interrupted);

        let outcome =
            handle_or_interrupt(&controller, PowerSample::now(100), interrupted.as_mut()).await;

        assert!(outcome.is_none());
        assert_eq!(controller.active_playlist(), None);
    }

    #[tokio::test]
    async fn switch_completes_without_interrupt() {
        let controller = PlaybackController::new(RideTarget::DryRun, 200, zones());
        let interrupted = std::future::pending::<()>();
        tokio::pin!(interrupted);

        let outcome =
            handle_or_interrupt(&controller, PowerSample::now(100), interrupted.as_mut()).await;

        assert_eq!(
            outcome.unwrap().unwrap(),
            SwitchOutcome::Switched("easy".into())
        );
    }

    #[test]
    fn lost_login_ends_the_ride() {
        for err in [
            CoreError::Unauthenticated,
            CoreError::NoRefreshToken,
            CoreError::AuthorizationFailed {
                message: "invalid_grant".into(),
            },
        ] {
            assert!(is_fatal(&err), "{err}");
        }
    }

    #[test]
    fn failed_switches_keep_the_ride_going() {
        for err in [
            CoreError::ApiRequestFailed {
                status: 401,
                message: "token still rejected after refresh".into(),
            },
            CoreError::ApiRequestFailed {
                status: 404,
                message: "no active device".into(),
            },
            CoreError::Network {
                message: "timed out".into(),
            },
        ] {
            assert!(!is_fatal(&err), "{err}");
        }
    }
}
