// ── Playback controller ──
//
// Turns a stream of power samples into playlist switches. Each sample is
// resolved to a zone; a switch is issued only when the zone's playlist
// differs from the one last switched to successfully. Switches are
// serialized. A switch that completes after the rider has moved on is
// still recorded as active, since it is what the service plays; one that
// completes after `reset` is not.

use std::future::Future;
use std::sync::{Mutex, PoisonError, RwLock};

use powerplay_api::{MusicClient, playlist_context_uri};
use tokio::sync::{Mutex as AsyncMutex, watch};
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{PowerSample, Zone, ZoneMap, effort_percent};

/// Where playlist switches go.
pub trait PlaybackTarget: Send + Sync {
    fn switch_playback(
        &self,
        playlist_id: &str,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

impl PlaybackTarget for MusicClient {
    async fn switch_playback(&self, playlist_id: &str) -> Result<(), CoreError> {
        let context_uri = playlist_context_uri(playlist_id);
        MusicClient::switch_playback(self, &context_uri)
            .await
            .map_err(CoreError::from)
    }
}

/// What `handle_sample` did with a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The resolved playlist is already active.
    Unchanged,
    /// Playback was switched to this playlist.
    Switched(String),
    /// A newer sample or a reset changed the target while this one waited.
    Superseded,
    /// No zones configured.
    NoZones,
    /// The resolved zone has no playlist assigned.
    Unassigned,
}

/// Latest controller view, published after every sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RideStatus {
    pub watts: Option<i32>,
    pub percent: Option<i32>,
    pub zone: Option<Zone>,
    pub active_playlist: Option<String>,
}

#[derive(Debug)]
struct Settings {
    ftp: i32,
    zones: ZoneMap,
}

#[derive(Debug, Default)]
struct SwitchState {
    /// Playlist the most recent sample asked for.
    desired: Option<String>,
    /// Playlist last switched to successfully.
    active: Option<String>,
}

pub struct PlaybackController<T> {
    target: T,
    settings: RwLock<Settings>,
    state: Mutex<SwitchState>,
    switch_gate: AsyncMutex<()>,
    status_tx: watch::Sender<RideStatus>,
}

impl<T: PlaybackTarget> PlaybackController<T> {
    pub fn new(target: T, ftp: i32, zones: ZoneMap) -> Self {
        if !zones.is_empty() && !zones.has_catch_all() {
            warn!("zone table has no catch-all zone at 0%");
        }
        let (status_tx, _) = watch::channel(RideStatus::default());
        Self {
            target,
            settings: RwLock::new(Settings { ftp, zones }),
            state: Mutex::new(SwitchState::default()),
            switch_gate: AsyncMutex::new(()),
            status_tx,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn subscribe(&self) -> watch::Receiver<RideStatus> {
        self.status_tx.subscribe()
    }

    pub fn active_playlist(&self) -> Option<String> {
        self.lock_state().active.clone()
    }

    pub fn set_ftp(&self, ftp: i32) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .ftp = ftp;
    }

    pub fn set_zones(&self, zones: ZoneMap) {
        self.settings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .zones = zones;
    }

    /// Forget the active and desired playlists. An in-flight switch will
    /// not be recorded once it completes.
    pub fn reset(&self) {
        *self.lock_state() = SwitchState::default();
        self.status_tx.send_replace(RideStatus::default());
        debug!("playback controller reset");
    }

    /// Resolve `sample` to a zone and switch playback if the zone's
    /// playlist is not already active.
    ///
    /// A failed switch leaves the active playlist untouched, so the next
    /// sample in the same zone retries it.
    pub async fn handle_sample(&self, sample: PowerSample) -> Result<SwitchOutcome, CoreError> {
        let (percent, zone) = {
            let settings = self.settings.read().unwrap_or_else(PoisonError::into_inner);
            let percent = effort_percent(sample.watts, settings.ftp);
            (percent, settings.zones.resolve(percent).cloned())
        };
        self.publish(sample.watts, percent, zone.clone());

        let Some(zone) = zone else {
            return Ok(SwitchOutcome::NoZones);
        };
        if !zone.is_assigned() {
            self.lock_state().desired = None;
            return Ok(SwitchOutcome::Unassigned);
        }
        let playlist = zone.playlist_id;

        {
            let mut state = self.lock_state();
            state.desired = Some(playlist.clone());
            if state.active.as_deref() == Some(playlist.as_str()) {
                return Ok(SwitchOutcome::Unchanged);
            }
        }

        let _gate = self.switch_gate.lock().await;

        {
            let state = self.lock_state();
            if state.desired.as_deref() != Some(playlist.as_str()) {
                return Ok(SwitchOutcome::Superseded);
            }
            if state.active.as_deref() == Some(playlist.as_str()) {
                return Ok(SwitchOutcome::Unchanged);
            }
        }

        debug!(playlist = %playlist, percent, "switching playback");
        if let Err(e) = self.target.switch_playback(&playlist).await {
            warn!(playlist = %playlist, error = %e, "playback switch failed, will retry");
            return Err(e);
        }

        let mut state = self.lock_state();
        if state.desired.as_deref() != Some(playlist.as_str()) {
            // The service is playing `playlist` now. Record it so a sample
            // that matched the old active playlist mid-switch re-issues its
            // own. After a reset nothing is recorded.
            state.active = state.desired.is_some().then(|| playlist.clone());
            let active = state.active.clone();
            drop(state);
            debug!(playlist = %playlist, "switch completed for a zone no longer wanted");
            self.status_tx.send_modify(|s| s.active_playlist = active);
            return Ok(SwitchOutcome::Superseded);
        }
        state.active = Some(playlist.clone());
        drop(state);

        info!(playlist = %playlist, percent, "playback switched");
        self.status_tx
            .send_modify(|s| s.active_playlist = Some(playlist.clone()));
        Ok(SwitchOutcome::Switched(playlist))
    }

    fn publish(&self, watts: i32, percent: i32, zone: Option<Zone>) {
        self.status_tx.send_modify(|s| {
            s.watts = Some(watts);
            s.percent = Some(percent);
            s.zone = zone;
        });
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SwitchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
