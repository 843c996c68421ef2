// Host radio seam.
//
// A platform discovers sensors, a sensor opens a GATT link, and a link
// yields raw measurement notifications. Implementations must tolerate
// teardown calls on links that are already gone.

use std::future::Future;

use futures_util::stream::BoxStream;

use super::{DeviceFilter, DeviceInfo};
use crate::error::CoreError;

/// Raw Cycling Power Measurement payloads, in arrival order.
pub type NotificationStream = BoxStream<'static, Vec<u8>>;

pub trait SensorPlatform: Send + Sync + 'static {
    type Device: SensorDevice;

    /// Whether the host exposes a usable radio.
    fn is_supported(&self) -> impl Future<Output = bool> + Send;

    /// Sensors advertising `filter.service`.
    fn discover(
        &self,
        filter: &DeviceFilter,
    ) -> impl Future<Output = Result<Vec<Self::Device>, CoreError>> + Send;
}

pub trait SensorDevice: Send + Sync + 'static {
    type Link: GattLink;

    fn info(&self) -> DeviceInfo;

    /// Open the GATT link and resolve the measurement characteristic.
    fn connect(&self) -> impl Future<Output = Result<Self::Link, CoreError>> + Send;
}

pub trait GattLink: Send + Sync + 'static {
    /// Enable measurement notifications.
    fn subscribe(&self) -> impl Future<Output = Result<NotificationStream, CoreError>> + Send;

    fn unsubscribe(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<(), CoreError>> + Send;
}
