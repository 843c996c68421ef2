// Simulated sensor platform.
//
// Replays a fixed script of measurement payloads as if they came from a
// real power meter. Drives `ride --simulate` and the telemetry tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream;

use super::decode::encode_measurement;
use super::platform::{GattLink, NotificationStream, SensorDevice, SensorPlatform};
use super::{DeviceFilter, DeviceInfo};
use crate::error::CoreError;

/// A host with zero or more scripted sensors in range.
#[derive(Clone)]
pub struct SimulatedPlatform {
    supported: bool,
    sensors: Vec<SimulatedSensor>,
}

impl SimulatedPlatform {
    pub fn new(sensors: Vec<SimulatedSensor>) -> Self {
        Self {
            supported: true,
            sensors,
        }
    }

    /// A host without a radio.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            sensors: Vec::new(),
        }
    }
}

impl SensorPlatform for SimulatedPlatform {
    type Device = SimulatedSensor;

    async fn is_supported(&self) -> bool {
        self.supported
    }

    async fn discover(&self, _filter: &DeviceFilter) -> Result<Vec<SimulatedSensor>, CoreError> {
        Ok(self.sensors.clone())
    }
}

/// Counters for what the source did to a simulated link.
#[derive(Debug, Default)]
pub struct SimulatedLinkStats {
    pub connects: AtomicUsize,
    pub subscribes: AtomicUsize,
    pub unsubscribes: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl SimulatedLinkStats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn subscribes(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribes(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

/// A scripted power meter.
#[derive(Clone)]
pub struct SimulatedSensor {
    info: DeviceInfo,
    payloads: Arc<Vec<Vec<u8>>>,
    interval: Duration,
    hold_open: bool,
    fail_connect: bool,
    fail_teardown: bool,
    stats: Arc<SimulatedLinkStats>,
}

impl SimulatedSensor {
    pub fn new(id: impl Into<String>, payloads: Vec<Vec<u8>>) -> Self {
        Self {
            info: DeviceInfo {
                id: id.into(),
                name: Some("Simulated Power Meter".into()),
            },
            payloads: Arc::new(payloads),
            interval: Duration::ZERO,
            hold_open: false,
            fail_connect: false,
            fail_teardown: false,
            stats: Arc::new(SimulatedLinkStats::default()),
        }
    }

    /// A sensor that reports each of `watts` in turn.
    pub fn from_watts(id: impl Into<String>, watts: &[i16]) -> Self {
        Self::new(id, watts.iter().copied().map(encode_measurement).collect())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.info.name = Some(name.into());
        self
    }

    /// Delay before each notification.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Keep the notification stream open after the script runs out.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Teardown calls report errors, as a sensor that already dropped the
    /// link would.
    pub fn failing_teardown(mut self) -> Self {
        self.fail_teardown = true;
        self
    }

    pub fn stats(&self) -> Arc<SimulatedLinkStats> {
        Arc::clone(&self.stats)
    }
}

impl SensorDevice for SimulatedSensor {
    type Link = SimulatedLink;

    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    async fn connect(&self) -> Result<SimulatedLink, CoreError> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(CoreError::ConnectionFailed {
                reason: format!("{} did not answer", self.info.id),
            });
        }
        Ok(SimulatedLink {
            sensor: self.clone(),
            open: AtomicBool::new(true),
        })
    }
}

pub struct SimulatedLink {
    sensor: SimulatedSensor,
    open: AtomicBool,
}

impl SimulatedLink {
    fn teardown_result(&self, what: &str) -> Result<(), CoreError> {
        if self.sensor.fail_teardown {
            Err(CoreError::ConnectionFailed {
                reason: format!("{what}: link already closed"),
            })
        } else {
            Ok(())
        }
    }
}

impl GattLink for SimulatedLink {
    async fn subscribe(&self) -> Result<NotificationStream, CoreError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(CoreError::NotConnected);
        }
        self.sensor.stats.subscribes.fetch_add(1, Ordering::SeqCst);

        let interval = self.sensor.interval;
        let script = stream::iter(self.sensor.payloads.as_ref().clone()).then(move |payload| {
            async move {
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
                payload
            }
        });

        if self.sensor.hold_open {
            Ok(script.chain(stream::pending()).boxed())
        } else {
            Ok(script.boxed())
        }
    }

    async fn unsubscribe(&self) -> Result<(), CoreError> {
        self.sensor.stats.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.teardown_result("unsubscribe")
    }

    async fn disconnect(&self) -> Result<(), CoreError> {
        self.sensor.stats.disconnects.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        self.teardown_result("disconnect")
    }
}
