// Bluetooth LE backend (btleplug).
//
// Scans the first adapter for sensors advertising the Cycling Power
// service and streams measurement notifications from the 0x2A63
// characteristic.

use std::time::Duration;

use btleplug::api::{Central as _, Characteristic, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures_util::StreamExt;
use tracing::debug;

use super::platform::{GattLink, NotificationStream, SensorDevice, SensorPlatform};
use super::{CYCLING_POWER_MEASUREMENT, DeviceFilter, DeviceInfo};
use crate::error::CoreError;

const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(5);

/// Host BLE radio.
#[derive(Debug, Clone)]
pub struct BlePlatform {
    scan_window: Duration,
}

impl Default for BlePlatform {
    fn default() -> Self {
        Self {
            scan_window: DEFAULT_SCAN_WINDOW,
        }
    }
}

impl BlePlatform {
    /// How long discovery listens for advertisements.
    pub fn with_scan_window(mut self, scan_window: Duration) -> Self {
        self.scan_window = scan_window;
        self
    }
}

async fn first_adapter() -> Result<Adapter, CoreError> {
    let manager = Manager::new()
        .await
        .map_err(|_| CoreError::PlatformUnsupported)?;
    manager
        .adapters()
        .await
        .map_err(|_| CoreError::PlatformUnsupported)?
        .into_iter()
        .next()
        .ok_or(CoreError::PlatformUnsupported)
}

fn link_error(err: &btleplug::Error) -> CoreError {
    CoreError::ConnectionFailed {
        reason: err.to_string(),
    }
}

impl SensorPlatform for BlePlatform {
    type Device = BleSensor;

    async fn is_supported(&self) -> bool {
        first_adapter().await.is_ok()
    }

    async fn discover(&self, filter: &DeviceFilter) -> Result<Vec<BleSensor>, CoreError> {
        let adapter = first_adapter().await?;
        adapter
            .start_scan(ScanFilter {
                services: vec![filter.service],
            })
            .await
            .map_err(|e| link_error(&e))?;
        tokio::time::sleep(self.scan_window).await;
        let peripherals = adapter.peripherals().await.map_err(|e| link_error(&e));
        if let Err(e) = adapter.stop_scan().await {
            debug!(error = %e, "stop_scan failed");
        }

        let mut sensors = Vec::new();
        for peripheral in peripherals? {
            let Ok(Some(props)) = peripheral.properties().await else {
                continue;
            };
            if !props.services.contains(&filter.service) {
                continue;
            }
            sensors.push(BleSensor {
                info: DeviceInfo {
                    id: peripheral.address().to_string(),
                    name: props.local_name,
                },
                peripheral,
            });
        }
        Ok(sensors)
    }
}

/// A discovered BLE power meter.
#[derive(Clone)]
pub struct BleSensor {
    info: DeviceInfo,
    peripheral: Peripheral,
}

impl SensorDevice for BleSensor {
    type Link = BleLink;

    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    async fn connect(&self) -> Result<BleLink, CoreError> {
        let peripheral = self.peripheral.clone();
        peripheral.connect().await.map_err(|e| link_error(&e))?;

        let resolved = match peripheral.discover_services().await {
            Ok(()) => peripheral
                .characteristics()
                .into_iter()
                .find(|c| c.uuid == CYCLING_POWER_MEASUREMENT),
            Err(e) => {
                debug!(error = %e, "service discovery failed");
                None
            }
        };

        let Some(characteristic) = resolved else {
            if let Err(e) = peripheral.disconnect().await {
                debug!(error = %e, "disconnect after failed resolve");
            }
            return Err(CoreError::ConnectionFailed {
                reason: "Cycling Power Measurement characteristic not found".into(),
            });
        };

        Ok(BleLink {
            peripheral,
            characteristic,
        })
    }
}

pub struct BleLink {
    peripheral: Peripheral,
    characteristic: Characteristic,
}

impl GattLink for BleLink {
    async fn subscribe(&self) -> Result<NotificationStream, CoreError> {
        let notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(|e| link_error(&e))?;
        self.peripheral
            .subscribe(&self.characteristic)
            .await
            .map_err(|e| link_error(&e))?;

        let uuid = self.characteristic.uuid;
        Ok(notifications
            .filter_map(move |n| std::future::ready((n.uuid == uuid).then_some(n.value)))
            .boxed())
    }

    async fn unsubscribe(&self) -> Result<(), CoreError> {
        self.peripheral
            .unsubscribe(&self.characteristic)
            .await
            .map_err(|e| link_error(&e))
    }

    async fn disconnect(&self) -> Result<(), CoreError> {
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| link_error(&e))
    }
}
