// ── Domain model ──
//
// Power samples from the sensor and the zone table that maps effort to
// playlists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One decoded power reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerSample {
    /// Instantaneous power. Negative values are legal and preserved.
    pub watts: i32,
    pub timestamp: DateTime<Utc>,
}

impl PowerSample {
    pub fn new(watts: i32, timestamp: DateTime<Utc>) -> Self {
        Self { watts, timestamp }
    }

    pub fn now(watts: i32) -> Self {
        Self::new(watts, Utc::now())
    }
}

/// A power-percentage threshold bound to a target playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Lowest effort (percent of FTP) at which this zone applies.
    pub min_power_percent: i32,
    /// Playlist id or `spotify:` context URI. Empty means "no playlist yet".
    #[serde(default)]
    pub playlist_id: String,
}

impl Zone {
    pub fn new(min_power_percent: i32, playlist_id: impl Into<String>) -> Self {
        Self {
            min_power_percent,
            playlist_id: playlist_id.into(),
        }
    }

    /// A zone with no playlist assigned issues no playback switch.
    pub fn is_assigned(&self) -> bool {
        !self.playlist_id.trim().is_empty()
    }
}

/// Sort zones descending by threshold. Stable, so equal thresholds keep
/// their relative order.
pub fn sort_zones(zones: &mut [Zone]) {
    zones.sort_by(|a, b| b.min_power_percent.cmp(&a.min_power_percent));
}

/// Zone table kept sorted by `min_power_percent` descending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneMap {
    zones: Vec<Zone>,
}

impl ZoneMap {
    pub fn new(mut zones: Vec<Zone>) -> Self {
        sort_zones(&mut zones);
        Self { zones }
    }

    /// First zone whose threshold is at or below `percent`. Falls back to
    /// the lowest zone when none qualifies; `None` only for an empty map.
    pub fn resolve(&self, percent: i32) -> Option<&Zone> {
        self.zones
            .iter()
            .find(|z| z.min_power_percent <= percent)
            .or_else(|| self.zones.last())
    }

    /// The lowest zone catches every percentage at or above zero.
    pub fn has_catch_all(&self) -> bool {
        self.zones.last().is_some_and(|z| z.min_power_percent <= 0)
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }
}

impl From<Vec<Zone>> for ZoneMap {
    fn from(zones: Vec<Zone>) -> Self {
        Self::new(zones)
    }
}

/// Effort as a whole percentage of FTP, rounded half up.
///
/// Non-positive FTP yields 0.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub fn effort_percent(watts: i32, ftp: i32) -> i32 {
    if ftp <= 0 {
        return 0;
    }
    let ratio = f64::from(watts) / f64::from(ftp) * 100.0;
    (ratio + 0.5).floor() as i32
}
