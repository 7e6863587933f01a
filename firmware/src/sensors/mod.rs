//! Battery and pressure measurement sources.
//!
//! The battery rail reaches the ADC through a 2:1 resistive divider, so the
//! raw reading is scaled back to centivolts at the battery terminals before
//! it goes on the wire. The pressure transducer is reported as its raw ADC
//! count; the receiving application owns the conversion to physical units.

#[cfg(target_os = "none")]
use embassy_stm32::Peri;
#[cfg(target_os = "none")]
use embassy_stm32::adc::{Adc, SampleTime};
#[cfg(target_os = "none")]
use embassy_stm32::peripherals::{ADC1, PA0, PA1};

#[cfg(target_os = "none")]
use node_core::payload::SensorSource;

/// Full-scale reading of the 12-bit ADC.
pub const ADC_FULL_SCALE: u16 = 4095;

/// ADC reference rail in millivolts.
pub const VREF_MILLIVOLTS: u32 = 3300;

/// Battery divider ratio: the pin sees half the terminal voltage.
pub const BATTERY_DIVIDER: u32 = 2;

/// Converts a raw battery-pin reading to centivolts at the battery terminals.
#[must_use]
pub fn battery_centivolts(raw: u16) -> u16 {
    let millivolts = u32::from(raw) * VREF_MILLIVOLTS * BATTERY_DIVIDER / u32::from(ADC_FULL_SCALE);
    u16::try_from(millivolts / 10).unwrap_or(u16::MAX)
}

/// ADC-backed sensor source sampling the battery divider on PA0 and the
/// pressure transducer on PA1.
#[cfg(target_os = "none")]
pub struct AdcSensors<'d> {
    adc: Adc<'d, ADC1>,
    battery_pin: Peri<'d, PA0>,
    pressure_pin: Peri<'d, PA1>,
}

#[cfg(target_os = "none")]
impl<'d> AdcSensors<'d> {
    /// Takes ownership of the ADC and both analog pins.
    pub fn new(mut adc: Adc<'d, ADC1>, battery_pin: Peri<'d, PA0>, pressure_pin: Peri<'d, PA1>) -> Self {
        adc.set_sample_time(SampleTime::CYCLES160_5);
        Self {
            adc,
            battery_pin,
            pressure_pin,
        }
    }
}

#[cfg(target_os = "none")]
impl SensorSource for AdcSensors<'_> {
    fn read_battery_voltage(&mut self) -> u16 {
        battery_centivolts(self.adc.blocking_read(&mut self.battery_pin))
    }

    fn read_pressure(&mut self) -> u16 {
        self.adc.blocking_read(&mut self.pressure_pin)
    }
}
