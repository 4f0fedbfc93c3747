//! Sensor/data provider collaborator

use crate::error::SensorError;

/// One set of environmental readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReadings {
    /// °C
    pub temperature: f32,
    /// %
    pub humidity: f32,
    /// Hundredths of in.Hg
    pub pressure: u16,
    /// V
    pub battery_voltage: f32,
}

impl SensorReadings {
    /// Values shown until real sensors are fitted.
    pub const PLACEHOLDER: SensorReadings = SensorReadings {
        temperature: -12.4,
        humidity: 27.4,
        pressure: 730,
        battery_voltage: 3.347,
    };
}

impl Default for SensorReadings {
    fn default() -> Self {
        Self::PLACEHOLDER
    }
}

/// Supplies readings on demand.
///
/// Called from the controller's sampling timer, so `read` has to return
/// quickly. A failed read leaves the previous values on screen.
pub trait SensorProvider {
    fn read(&mut self) -> Result<SensorReadings, SensorError>;
}

/// Provider that always returns [`SensorReadings::PLACEHOLDER`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderSensors;

impl SensorProvider for PlaceholderSensors {
    fn read(&mut self) -> Result<SensorReadings, SensorError> {
        Ok(SensorReadings::PLACEHOLDER)
    }
}
