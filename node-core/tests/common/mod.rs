//! Shared fixtures for the scheduler integration tests: a simulated clock,
//! a transport that records every command, and sensors whose readings change
//! on each sample so payload freshness is observable.

use core::ops::Add;
use core::time::Duration;

use node_core::link::{DownlinkSink, TransportCommands};
use node_core::payload::SensorSource;
use node_core::scheduler::{UplinkConfig, UplinkScheduler};
use node_core::telemetry::{TelemetryInstant, TelemetryRecorder};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SimInstant(u64);

impl SimInstant {
    #[must_use]
    pub fn at_secs(secs: u64) -> Self {
        Self(secs * 1_000_000)
    }

}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX))
    }
}

impl TelemetryInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentUplink {
    pub bytes: Vec<u8>,
    pub port: u8,
    pub confirmed: bool,
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub join_calls: usize,
    pub sends: Vec<SentUplink>,
}

impl TransportCommands for RecordingTransport {
    fn join(&mut self) {
        self.join_calls += 1;
    }

    fn send(&mut self, payload: &[u8], port: u8, confirmed: bool) {
        self.sends.push(SentUplink {
            bytes: payload.to_vec(),
            port,
            confirmed,
        });
    }
}

/// Sensor pair whose readings advance on every sample.
#[derive(Copy, Clone, Debug)]
pub struct SweepSensors {
    battery: u16,
    pressure: u16,
}

impl Default for SweepSensors {
    fn default() -> Self {
        Self {
            battery: 400,
            pressure: 700,
        }
    }
}

impl SensorSource for SweepSensors {
    fn read_battery_voltage(&mut self) -> u16 {
        self.battery = self.battery.wrapping_add(1);
        self.battery
    }

    fn read_pressure(&mut self) -> u16 {
        self.pressure = self.pressure.wrapping_add(3);
        self.pressure
    }
}

#[derive(Debug, Default)]
pub struct CapturingSink {
    pub frames: Vec<Vec<u8>>,
}

impl DownlinkSink for CapturingSink {
    fn on_downlink(&mut self, frame: &[u8]) {
        self.frames.push(frame.to_vec());
    }
}

pub type SimScheduler = UplinkScheduler<SimInstant, RecordingTransport, SweepSensors, CapturingSink>;
pub type SimTelemetry = TelemetryRecorder<SimInstant>;

#[must_use]
pub fn new_node() -> (SimScheduler, SimTelemetry) {
    let scheduler = UplinkScheduler::new(
        UplinkConfig::default(),
        RecordingTransport::default(),
        SweepSensors::default(),
        CapturingSink::default(),
    );
    (scheduler, TelemetryRecorder::new())
}
