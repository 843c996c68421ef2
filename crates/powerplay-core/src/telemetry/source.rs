// ── TelemetrySource ──
//
// Connection state machine for one power sensor:
//
//   Disconnected -> DeviceSelected -> Connected -> Subscribed
//
// `disconnect()` is valid from every state, never fails, and always lands
// in `Disconnected`. Notifications are decoded on a pump task and handed
// to the caller through a bounded channel; cancelling the pump stops
// delivery before `unsubscribe()`/`disconnect()` return.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::decode::decode_instantaneous_power;
use super::platform::{GattLink, NotificationStream, SensorDevice, SensorPlatform};
use super::{DeviceFilter, DeviceInfo};
use crate::error::CoreError;
use crate::model::PowerSample;

const SAMPLE_CHANNEL_SIZE: usize = 64;

type LinkOf<P> = <<P as SensorPlatform>::Device as SensorDevice>::Link;

/// Observable phase of the sensor connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SessionState {
    Disconnected,
    DeviceSelected,
    Connected,
    Subscribed,
}

enum DeviceSession<D, L> {
    Disconnected,
    DeviceSelected { device: D },
    Connected { device: D, link: L },
    Subscribed { device: D, link: L, pump: Pump },
}

struct Pump {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Pump {
    /// Stop delivery and wait for the task to drop its sender.
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "sample pump task ended abnormally");
        }
    }
}

/// Owns the device connection and turns notifications into `PowerSample`s.
pub struct TelemetrySource<P: SensorPlatform> {
    platform: P,
    session: DeviceSession<P::Device, LinkOf<P>>,
}

impl<P: SensorPlatform> TelemetrySource<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            session: DeviceSession::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.session {
            DeviceSession::Disconnected => SessionState::Disconnected,
            DeviceSession::DeviceSelected { .. } => SessionState::DeviceSelected,
            DeviceSession::Connected { .. } => SessionState::Connected,
            DeviceSession::Subscribed { .. } => SessionState::Subscribed,
        }
    }

    /// The selected sensor, in any state past `Disconnected`.
    pub fn device(&self) -> Option<DeviceInfo> {
        match &self.session {
            DeviceSession::Disconnected => None,
            DeviceSession::DeviceSelected { device }
            | DeviceSession::Connected { device, .. }
            | DeviceSession::Subscribed { device, .. } => Some(device.info()),
        }
    }

    /// Discover sensors matching `filter` and pick one.
    ///
    /// A sensor whose id equals `filter.address` is picked without asking.
    /// Otherwise `choose` sees every candidate and returns the index of the
    /// one to use, or `None` to decline. Any existing session is torn down
    /// first.
    pub async fn select_device<F>(
        &mut self,
        filter: &DeviceFilter,
        choose: F,
    ) -> Result<DeviceInfo, CoreError>
    where
        F: FnOnce(&[DeviceInfo]) -> Option<usize>,
    {
        if !matches!(self.session, DeviceSession::Disconnected) {
            self.disconnect().await;
        }
        if !self.platform.is_supported().await {
            return Err(CoreError::PlatformUnsupported);
        }

        let mut devices = self.platform.discover(filter).await?;
        let infos: Vec<DeviceInfo> = devices.iter().map(SensorDevice::info).collect();
        debug!(found = infos.len(), service = %filter.service, "sensor discovery finished");

        let remembered = filter
            .address
            .as_deref()
            .and_then(|addr| infos.iter().position(|i| i.id == addr));
        let index = match remembered {
            Some(index) => index,
            None if infos.is_empty() => return Err(CoreError::DeviceSelectionCancelled),
            None => choose(&infos).ok_or(CoreError::DeviceSelectionCancelled)?,
        };

        if index >= devices.len() {
            return Err(CoreError::DeviceSelectionCancelled);
        }
        let device = devices.swap_remove(index);
        let info = device.info();
        info!(device = %info, "power sensor selected");
        self.session = DeviceSession::DeviceSelected { device };
        Ok(info)
    }

    /// Open the GATT link to the selected sensor.
    ///
    /// On failure the source stays in `DeviceSelected`.
    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let session = std::mem::replace(&mut self.session, DeviceSession::Disconnected);
        let device = match session {
            DeviceSession::DeviceSelected { device } => device,
            DeviceSession::Disconnected => {
                return Err(CoreError::ConnectionFailed {
                    reason: "no power sensor selected".into(),
                });
            }
            already @ (DeviceSession::Connected { .. } | DeviceSession::Subscribed { .. }) => {
                self.session = already;
                debug!("connect called on a live link, ignoring");
                return Ok(());
            }
        };

        match device.connect().await {
            Ok(link) => {
                info!(device = %device.info(), "power sensor connected");
                self.session = DeviceSession::Connected { device, link };
                Ok(())
            }
            Err(err) => {
                self.session = DeviceSession::DeviceSelected { device };
                Err(match err {
                    e @ CoreError::ConnectionFailed { .. } => e,
                    other => CoreError::ConnectionFailed {
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    /// Start measurement notifications.
    ///
    /// Malformed payloads become zero-power samples so the stream survives
    /// them.
    pub async fn subscribe(&mut self) -> Result<SampleStream, CoreError> {
        let session = std::mem::replace(&mut self.session, DeviceSession::Disconnected);
        let (device, link) = match session {
            DeviceSession::Connected { device, link } => (device, link),
            other => {
                self.session = other;
                return Err(CoreError::NotConnected);
            }
        };

        let notifications = match link.subscribe().await {
            Ok(stream) => stream,
            Err(err) => {
                self.session = DeviceSession::Connected { device, link };
                return Err(err);
            }
        };

        let (tx, rx) = mpsc::channel(SAMPLE_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(pump(notifications, tx, cancel.clone()));

        debug!("measurement notifications enabled");
        self.session = DeviceSession::Subscribed {
            device,
            link,
            pump: Pump {
                cancel: cancel.clone(),
                task,
            },
        };
        Ok(SampleStream { rx, cancel })
    }

    /// Stop notifications, keeping the link open.
    pub async fn unsubscribe(&mut self) {
        let session = std::mem::replace(&mut self.session, DeviceSession::Disconnected);
        self.session = match session {
            DeviceSession::Subscribed { device, link, pump } => {
                pump.stop().await;
                if let Err(e) = link.unsubscribe().await {
                    debug!(error = %e, "ignoring unsubscribe failure");
                }
                DeviceSession::Connected { device, link }
            }
            other => other,
        };
    }

    /// Release everything, in reverse acquisition order. Safe to call in
    /// any state and any number of times.
    pub async fn disconnect(&mut self) {
        let session = std::mem::replace(&mut self.session, DeviceSession::Disconnected);
        let link = match session {
            DeviceSession::Disconnected => return,
            DeviceSession::DeviceSelected { .. } => None,
            DeviceSession::Connected { link, .. } => Some(link),
            DeviceSession::Subscribed { link, pump, .. } => {
                pump.stop().await;
                if let Err(e) = link.unsubscribe().await {
                    debug!(error = %e, "ignoring unsubscribe failure during disconnect");
                }
                Some(link)
            }
        };

        if let Some(link) = link {
            if let Err(e) = link.disconnect().await {
                debug!(error = %e, "ignoring disconnect failure");
            }
        }
        info!("power sensor disconnected");
    }
}

async fn pump(
    mut notifications: NotificationStream,
    tx: mpsc::Sender<PowerSample>,
    cancel: CancellationToken,
) {
    loop {
        let payload = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = notifications.next() => match next {
                Some(payload) => payload,
                None => {
                    debug!("sensor notification stream ended");
                    break;
                }
            },
        };

        let watts = match decode_instantaneous_power(&payload) {
            Ok(watts) => i32::from(watts),
            Err(e) => {
                warn!(error = %e, "degrading malformed measurement to zero power");
                0
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            sent = tx.send(PowerSample::now(watts)) => {
                if sent.is_err() {
                    debug!("sample receiver dropped, stopping pump");
                    break;
                }
            }
        }
    }
}

// ── SampleStream ─────────────────────────────────────────────────────

/// Decoded power samples from a subscribed sensor.
///
/// Ends when the source unsubscribes or disconnects, or when the sensor
/// stops notifying. Samples still buffered at cancellation are discarded.
pub struct SampleStream {
    rx: mpsc::Receiver<PowerSample>,
    cancel: CancellationToken,
}

impl SampleStream {
    pub async fn recv(&mut self) -> Option<PowerSample> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            sample = self.rx.recv() => sample,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for SampleStream {
    type Item = PowerSample;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}
