//! Ride logic between the power sensor and `powerplay-api`.
//!
//! - **[`TelemetrySource`]**: Connection state machine for one Cycling
//!   Power sensor. [`select_device()`](TelemetrySource::select_device),
//!   [`connect()`](TelemetrySource::connect) and
//!   [`subscribe()`](TelemetrySource::subscribe) walk it forward;
//!   [`disconnect()`](TelemetrySource::disconnect) is always safe. The host
//!   radio sits behind [`SensorPlatform`]; a scripted
//!   [`SimulatedPlatform`] ships in-tree and a btleplug backend is behind
//!   the `bluetooth` feature.
//!
//! - **[`PlaybackController`]**: Resolves each [`PowerSample`] to a
//!   [`Zone`] and issues at most one playlist switch per zone change through
//!   a [`PlaybackTarget`] (implemented for `powerplay_api::MusicClient`).
//!
//! - **[`RideConfig`]**: FTP, remembered sensor, and zone table, persisted
//!   through the [`ConfigStore`] seam.

pub mod config;
pub mod error;
pub mod model;
pub mod playback;
pub mod telemetry;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ConfigStore, DEFAULT_FTP, RideConfig};
pub use error::CoreError;
pub use model::{PowerSample, Zone, ZoneMap, effort_percent, sort_zones};
pub use playback::{PlaybackController, PlaybackTarget, RideStatus, SwitchOutcome};
pub use telemetry::{
    CYCLING_POWER_MEASUREMENT, CYCLING_POWER_SERVICE, DeviceFilter, DeviceInfo, GattLink,
    NotificationStream, SampleStream, SensorDevice, SensorPlatform, SessionState,
    SimulatedLinkStats, SimulatedPlatform, SimulatedSensor, TelemetrySource,
};
