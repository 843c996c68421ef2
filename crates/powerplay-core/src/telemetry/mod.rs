// ── Power telemetry ──
//
// Cycling Power sensor discovery, connection lifecycle, and measurement
// decoding. The host radio sits behind the `SensorPlatform` traits so the
// state machine can run against a simulated sensor or, with the
// `bluetooth` feature, a real BLE adapter.

pub mod decode;
mod platform;
mod simulated;
mod source;

#[cfg(feature = "bluetooth")]
pub mod btle;

use uuid::Uuid;

pub use platform::{GattLink, NotificationStream, SensorDevice, SensorPlatform};
pub use simulated::{SimulatedLink, SimulatedLinkStats, SimulatedPlatform, SimulatedSensor};
pub use source::{SampleStream, SessionState, TelemetrySource};

/// GATT Cycling Power service (0x1818).
pub const CYCLING_POWER_SERVICE: Uuid = Uuid::from_u128(0x0000_1818_0000_1000_8000_0080_5f9b_34fb);

/// GATT Cycling Power Measurement characteristic (0x2A63).
pub const CYCLING_POWER_MEASUREMENT: Uuid =
    Uuid::from_u128(0x0000_2a63_0000_1000_8000_0080_5f9b_34fb);

/// Which sensors the chooser should offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    /// Advertised service the sensor must expose.
    pub service: Uuid,
    /// Previously used sensor; picked without prompting when present.
    pub address: Option<String>,
}

impl DeviceFilter {
    pub fn cycling_power() -> Self {
        Self {
            service: CYCLING_POWER_SERVICE,
            address: None,
        }
    }

    pub fn with_address(mut self, address: Option<String>) -> Self {
        self.address = address;
        self
    }
}

/// What the chooser shows for a discovered sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Platform identifier (MAC address on most hosts).
    pub id: String,
    pub name: Option<String>,
}

impl DeviceInfo {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.id),
            None => f.write_str(&self.id),
        }
    }
}
