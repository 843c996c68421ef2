// ── Ride configuration ──
//
// User-owned settings the core reads: FTP, the remembered sensor, and the
// zone table. Persistence lives behind `ConfigStore`; powerplay-config
// supplies the file-backed implementation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{Zone, ZoneMap, sort_zones};

/// FTP used until the rider sets their own.
pub const DEFAULT_FTP: i32 = 250;

/// Ride settings persisted between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RideConfig {
    /// Functional threshold power in watts.
    pub ftp: i32,
    /// Identifier of the last sensor the rider picked.
    pub device_address: Option<String>,
    /// Zones, kept sorted by threshold descending.
    pub zones: Vec<Zone>,
}

impl Default for RideConfig {
    fn default() -> Self {
        Self {
            ftp: DEFAULT_FTP,
            device_address: None,
            zones: vec![Zone::new(0, "")],
        }
    }
}

impl RideConfig {
    /// Re-establish ordering after deserializing a hand-edited file.
    pub fn normalize(&mut self) {
        sort_zones(&mut self.zones);
    }

    pub fn zone_map(&self) -> ZoneMap {
        ZoneMap::new(self.zones.clone())
    }

    pub fn set_ftp(&mut self, ftp: i32) -> Result<(), CoreError> {
        if ftp <= 0 {
            return Err(CoreError::ValidationFailed {
                message: format!("FTP must be a positive number of watts, got {ftp}"),
            });
        }
        self.ftp = ftp;
        Ok(())
    }

    pub fn set_device_address(&mut self, address: Option<String>) {
        self.device_address = address;
    }

    pub fn add_zone(&mut self, zone: Zone) {
        self.zones.push(zone);
        sort_zones(&mut self.zones);
    }

    /// Replace the zone at `index` (in current sorted order).
    pub fn update_zone(&mut self, index: usize, zone: Zone) -> Result<(), CoreError> {
        let len = self.zones.len();
        let slot = self
            .zones
            .get_mut(index)
            .ok_or_else(|| zone_index_error(index, len))?;
        *slot = zone;
        sort_zones(&mut self.zones);
        Ok(())
    }

    pub fn remove_zone(&mut self, index: usize) -> Result<Zone, CoreError> {
        if index >= self.zones.len() {
            return Err(zone_index_error(index, self.zones.len()));
        }
        Ok(self.zones.remove(index))
    }

    pub fn set_zones(&mut self, mut zones: Vec<Zone>) {
        sort_zones(&mut zones);
        self.zones = zones;
    }

    /// Back to factory settings. The remembered sensor is kept.
    pub fn reset(&mut self) {
        let device_address = self.device_address.take();
        *self = Self {
            device_address,
            ..Self::default()
        };
    }
}

fn zone_index_error(index: usize, len: usize) -> CoreError {
    CoreError::ValidationFailed {
        message: format!("no zone at position {index} (have {len})"),
    }
}

/// Load/save seam for `RideConfig`.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<RideConfig, CoreError>;

    fn save(&self, config: &RideConfig) -> Result<(), CoreError>;

    /// Load, mutate, save. Returns the saved config.
    fn update<F>(&self, mutate: F) -> Result<RideConfig, CoreError>
    where
        F: FnOnce(&mut RideConfig) -> Result<(), CoreError>,
        Self: Sized,
    {
        let mut config = self.load()?;
        mutate(&mut config)?;
        config.normalize();
        self.save(&config)?;
        Ok(config)
    }
}
