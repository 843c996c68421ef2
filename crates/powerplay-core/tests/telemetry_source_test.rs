#![allow(clippy::unwrap_used)]
// Integration tests for `TelemetrySource` against the simulated platform.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use pretty_assertions::assert_eq;

use powerplay_core::telemetry::decode::encode_measurement;
use powerplay_core::{
    CoreError, DeviceFilter, PlaybackController, PlaybackTarget, PowerSample, SessionState,
    SimulatedPlatform, SimulatedSensor, TelemetrySource, Zone, ZoneMap,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn source_with(sensor: SimulatedSensor) -> TelemetrySource<SimulatedPlatform> {
    TelemetrySource::new(SimulatedPlatform::new(vec![sensor]))
}

async fn subscribed(
    sensor: SimulatedSensor,
) -> (TelemetrySource<SimulatedPlatform>, powerplay_core::SampleStream) {
    let mut source = source_with(sensor);
    source
        .select_device(&DeviceFilter::cycling_power(), |_| Some(0))
        .await
        .unwrap();
    source.connect().await.unwrap();
    let samples = source.subscribe().await.unwrap();
    (source, samples)
}

fn watts(samples: &[PowerSample]) -> Vec<i32> {
    samples.iter().map(|s| s.watts).collect()
}

// ── Selection ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_unsupported_platform_rejects_selection() {
    let mut source = TelemetrySource::new(SimulatedPlatform::unsupported());

    let result = source
        .select_device(&DeviceFilter::cycling_power(), |_| Some(0))
        .await;

    assert!(matches!(result, Err(CoreError::PlatformUnsupported)));
    assert_eq!(source.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_declined_chooser_cancels_selection() {
    let mut source = source_with(SimulatedSensor::from_watts("AA:01", &[100]));

    let result = source
        .select_device(&DeviceFilter::cycling_power(), |_| None)
        .await;

    assert!(matches!(result, Err(CoreError::DeviceSelectionCancelled)));
    assert_eq!(source.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_remembered_sensor_is_picked_without_prompt() {
    let platform = SimulatedPlatform::new(vec![
        SimulatedSensor::from_watts("AA:01", &[100]).with_name("Left crank"),
        SimulatedSensor::from_watts("AA:02", &[100]).with_name("Hub"),
    ]);
    let mut source = TelemetrySource::new(platform);
    let filter = DeviceFilter::cycling_power().with_address(Some("AA:02".into()));

    let info = source
        .select_device(&filter, |_| panic!("chooser must not run"))
        .await
        .unwrap();

    assert_eq!(info.id, "AA:02");
    assert_eq!(info.name.as_deref(), Some("Hub"));
    assert_eq!(source.state(), SessionState::DeviceSelected);
}

#[tokio::test]
async fn test_chooser_sees_every_candidate() {
    let platform = SimulatedPlatform::new(vec![
        SimulatedSensor::from_watts("AA:01", &[100]),
        SimulatedSensor::from_watts("AA:02", &[100]),
    ]);
    let mut source = TelemetrySource::new(platform);

    let info = source
        .select_device(&DeviceFilter::cycling_power(), |found| {
            assert_eq!(found.len(), 2);
            found.iter().position(|d| d.id == "AA:02")
        })
        .await
        .unwrap();

    assert_eq!(info.id, "AA:02");
    assert_eq!(source.device().unwrap().id, "AA:02");
}

// ── Connection ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_connect_keeps_selection() {
    let sensor = SimulatedSensor::from_watts("AA:01", &[100]).failing_connect();
    let stats = sensor.stats();
    let mut source = source_with(sensor);
    source
        .select_device(&DeviceFilter::cycling_power(), |_| Some(0))
        .await
        .unwrap();

    let result = source.connect().await;

    assert!(matches!(result, Err(CoreError::ConnectionFailed { .. })));
    assert_eq!(source.state(), SessionState::DeviceSelected);
    assert_eq!(stats.connects(), 1);
}

#[tokio::test]
async fn test_connect_without_selection_fails() {
    let mut source = source_with(SimulatedSensor::from_watts("AA:01", &[100]));

    let result = source.connect().await;

    assert!(matches!(result, Err(CoreError::ConnectionFailed { .. })));
    assert_eq!(source.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_subscribe_requires_connection() {
    let mut source = source_with(SimulatedSensor::from_watts("AA:01", &[100]));
    assert!(matches!(
        source.subscribe().await,
        Err(CoreError::NotConnected)
    ));

    source
        .select_device(&DeviceFilter::cycling_power(), |_| Some(0))
        .await
        .unwrap();
    assert!(matches!(
        source.subscribe().await,
        Err(CoreError::NotConnected)
    ));
    assert_eq!(source.state(), SessionState::DeviceSelected);
}

// ── Samples ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_samples_arrive_in_order() {
    let (source, samples) =
        subscribed(SimulatedSensor::from_watts("AA:01", &[120, -4, 0, 310])).await;
    assert_eq!(source.state(), SessionState::Subscribed);

    let received: Vec<PowerSample> = samples.collect().await;

    assert_eq!(watts(&received), vec![120, -4, 0, 310]);
}

#[tokio::test]
async fn test_malformed_payload_degrades_to_zero() {
    let sensor = SimulatedSensor::new(
        "AA:01",
        vec![
            encode_measurement(200),
            vec![0x00, 0x00, 0x10],
            vec![0x01, 0x00, 0x2C, 0x01],
            encode_measurement(180),
        ],
    );
    let (_source, samples) = subscribed(sensor).await;

    let received: Vec<PowerSample> = samples.collect().await;

    assert_eq!(watts(&received), vec![200, 0, 0, 180]);
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let sensor = SimulatedSensor::from_watts("AA:01", &[100, 110, 120, 130])
        .with_interval(Duration::from_millis(20))
        .hold_open();
    let stats = sensor.stats();
    let (mut source, mut samples) = subscribed(sensor).await;

    assert_eq!(samples.recv().await.map(|s| s.watts), Some(100));
    source.unsubscribe().await;

    assert_eq!(samples.recv().await, None);
    assert!(samples.is_closed());
    assert_eq!(source.state(), SessionState::Connected);
    assert_eq!(stats.unsubscribes(), 1);
    assert_eq!(stats.disconnects(), 0);
}

// ── Disconnect ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_without_connect_is_harmless() {
    let mut source = source_with(SimulatedSensor::from_watts("AA:01", &[100]));

    source.disconnect().await;
    source.disconnect().await;

    assert_eq!(source.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_double_disconnect_tears_down_once() {
    let sensor = SimulatedSensor::from_watts("AA:01", &[100])
        .with_interval(Duration::from_millis(20))
        .hold_open();
    let stats = sensor.stats();
    let (mut source, mut samples) = subscribed(sensor).await;

    source.disconnect().await;
    source.disconnect().await;

    assert_eq!(samples.recv().await, None);
    assert_eq!(source.state(), SessionState::Disconnected);
    assert!(source.device().is_none());
    assert_eq!(stats.unsubscribes(), 1);
    assert_eq!(stats.disconnects(), 1);
}

#[tokio::test]
async fn test_teardown_errors_are_swallowed() {
    let sensor = SimulatedSensor::from_watts("AA:01", &[100])
        .hold_open()
        .failing_teardown();
    let stats = sensor.stats();
    let (mut source, _samples) = subscribed(sensor).await;

    source.disconnect().await;

    assert_eq!(source.state(), SessionState::Disconnected);
    assert_eq!(stats.disconnects(), 1);
}

#[tokio::test]
async fn test_disconnect_from_selected_state() {
    let sensor = SimulatedSensor::from_watts("AA:01", &[100]);
    let stats = sensor.stats();
    let mut source = source_with(sensor);
    source
        .select_device(&DeviceFilter::cycling_power(), |_| Some(0))
        .await
        .unwrap();

    source.disconnect().await;

    assert_eq!(source.state(), SessionState::Disconnected);
    assert_eq!(stats.disconnects(), 0);
}

// ── Ride loop ───────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl PlaybackTarget for Recorder {
    async fn switch_playback(&self, playlist_id: &str) -> Result<(), CoreError> {
        self.0.lock().unwrap().push(playlist_id.to_owned());
        Ok(())
    }
}

#[tokio::test]
async fn test_sensor_drives_playlist_switches() {
    let recorder = Recorder::default();
    let zones = ZoneMap::new(vec![
        Zone::new(0, "recovery"),
        Zone::new(90, "threshold"),
        Zone::new(50, "endurance"),
    ]);
    let controller = PlaybackController::new(recorder.clone(), 250, zones);
    let (mut source, mut samples) = subscribed(SimulatedSensor::from_watts(
        "AA:01",
        &[100, 130, 140, 240, 250, 60, 55],
    ))
    .await;

    while let Some(sample) = samples.recv().await {
        controller.handle_sample(sample).await.unwrap();
    }
    source.disconnect().await;
    controller.reset();

    assert_eq!(
        *recorder.0.lock().unwrap(),
        vec!["recovery", "endurance", "threshold", "recovery"]
    );
    assert_eq!(controller.active_playlist(), None);
}
