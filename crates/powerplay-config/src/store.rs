// File-backed `ConfigStore`.
//
// Reads and writes the `[ride]` section of the TOML config, leaving the
// rest of the file as it was. Environment overrides are not applied here,
// so they never get written back.

use std::path::{Path, PathBuf};

use tracing::debug;

use powerplay_core::{ConfigStore, CoreError, RideConfig};

use crate::{read_config_file, save_config_to};

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<RideConfig, CoreError> {
        Ok(read_config_file(&self.path)?.ride)
    }

    fn save(&self, ride: &RideConfig) -> Result<(), CoreError> {
        let mut config = read_config_file(&self.path)?;
        config.ride = ride.clone();
        config.ride.normalize();
        save_config_to(&self.path, &config)?;
        debug!(path = %self.path.display(), "ride config saved");
        Ok(())
    }
}
