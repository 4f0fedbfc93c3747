//! The values shown on the panel

use core::net::Ipv4Addr;

use crate::sensors::SensorReadings;
use crate::time::LocalTime;

/// Everything the render loop draws, in one place.
///
/// Owned by the controller. The clock sync writes the time/address pair
/// through [`DisplaySnapshot::publish_sync`], the sensor provider writes the
/// readings through [`DisplaySnapshot::publish_readings`], and rendering only
/// ever borrows it immutably.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySnapshot {
    /// 0.0.0.0 until an address has been assigned
    pub address: Ipv4Addr,
    /// `None` until the first successful sync
    pub local_time: Option<LocalTime>,
    /// Outdoor temperature, °C
    pub temperature: f32,
    /// Relative humidity, %
    pub humidity: f32,
    /// Pressure in display units (hundredths of in.Hg)
    pub pressure: u16,
    /// Battery voltage, V
    pub battery_voltage: f32,
}

impl Default for DisplaySnapshot {
    fn default() -> Self {
        Self::with_readings(SensorReadings::PLACEHOLDER)
    }
}

impl DisplaySnapshot {
    /// A snapshot that has never been synced, showing `readings`.
    pub const fn with_readings(readings: SensorReadings) -> Self {
        Self {
            address: Ipv4Addr::UNSPECIFIED,
            local_time: None,
            temperature: readings.temperature,
            humidity: readings.humidity,
            pressure: readings.pressure,
            battery_voltage: readings.battery_voltage,
        }
    }

    /// Store the result of one sync cycle.
    ///
    /// Time and address are written together. A `None` time leaves the
    /// previous time in place (stale but valid).
    pub fn publish_sync(&mut self, local_time: Option<LocalTime>, address: Ipv4Addr) {
        if let Some(time) = local_time {
            self.local_time = Some(time);
        }
        self.address = address;
    }

    pub fn publish_readings(&mut self, readings: SensorReadings) {
        self.temperature = readings.temperature;
        self.humidity = readings.humidity;
        self.pressure = readings.pressure;
        self.battery_voltage = readings.battery_voltage;
    }

    pub fn readings(&self) -> SensorReadings {
        SensorReadings {
            temperature: self.temperature,
            humidity: self.humidity,
            pressure: self.pressure,
            battery_voltage: self.battery_voltage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noon() -> LocalTime {
        LocalTime {
            year: 2024,
            month: 7,
            day: 1,
            weekday: 1,
            hour: 12,
            minute: 0,
            second: 0,
            dst: true,
        }
    }

    #[test]
    fn test_defaults() {
        let snapshot = DisplaySnapshot::default();

        assert_eq!(snapshot.address, Ipv4Addr::UNSPECIFIED);
        assert_eq!(snapshot.local_time, None);
        assert_eq!(snapshot.humidity, 27.4);
        assert_eq!(snapshot.pressure, 730);
        assert_eq!(snapshot.temperature, -12.4);
        assert_eq!(snapshot.battery_voltage, 3.347);
    }

    #[test]
    fn test_failed_time_read_keeps_previous_time() {
        let mut snapshot = DisplaySnapshot::default();
        snapshot.publish_sync(Some(noon()), Ipv4Addr::new(10, 0, 0, 2));
        snapshot.publish_sync(None, Ipv4Addr::new(10, 0, 0, 3));

        assert_eq!(snapshot.local_time, Some(noon()));
        assert_eq!(snapshot.address, Ipv4Addr::new(10, 0, 0, 3));
    }

    #[test]
    fn test_readings_round_through_snapshot() {
        let mut snapshot = DisplaySnapshot::default();
        let readings = SensorReadings {
            temperature: 21.5,
            humidity: 40.0,
            pressure: 2992,
            battery_voltage: 4.1,
        };
        snapshot.publish_readings(readings);

        assert_eq!(snapshot.readings(), readings);
        assert_eq!(snapshot.local_time, None);
    }
}
