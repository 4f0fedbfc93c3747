//! Fixed configuration for the status panel
//!
//! Grouped per collaborator and handed to the controller at construction.
//! `Config::default()` yields the production values.

use embassy_time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::time::{DaylightRule, TimeZone};

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(bound(deserialize = "'de: 'a")))]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub time: TimeSyncConfig<'a>,
    pub display: DisplayConfig,
    pub sensors: SensorConfig,
}

/// Station-mode credentials. Only the firmware reads these.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(bound(deserialize = "'de: 'a")))]
pub struct TimeSyncConfig<'a> {
    /// Time servers, queried in order
    pub servers: [&'a str; 2],
    pub zone: TimeZone,
    /// Delay between startup and the first connectivity check
    pub start_delay_ms: u64,
    /// Pause between connectivity checks while the link is down
    pub link_poll_ms: u64,
    /// Period of the recurring sync once connected
    pub sync_period_ms: u64,
}

impl TimeSyncConfig<'_> {
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn link_poll_interval(&self) -> Duration {
        Duration::from_millis(self.link_poll_ms)
    }

    pub fn sync_period(&self) -> Duration {
        Duration::from_millis(self.sync_period_ms)
    }
}

impl Default for TimeSyncConfig<'_> {
    fn default() -> Self {
        Self {
            servers: ["time.nist.gov", "pool.ntp.org"],
            zone: TimeZone {
                utc_offset_secs: 7200,
                dst_offset_secs: 3600,
                dst_rule: DaylightRule::EuropeanUnion,
            },
            start_delay_ms: 1_000,
            link_poll_ms: 100,
            sync_period_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    /// Minimum time between two rendered frames
    pub frame_period_ms: u64,
    pub bus: PanelBusConfig,
}

impl DisplayConfig {
    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(self.frame_period_ms)
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 32,
            frame_period_ms: 200,
            bus: PanelBusConfig::default(),
        }
    }
}

/// I2C parameters of the OLED panel.
///
/// Pins are fixed by the board (SDA = GPIO5, SCL = GPIO4) and are chosen in
/// the firmware's peripheral setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PanelBusConfig {
    pub address: u8,
    pub frequency_hz: u32,
}

impl Default for PanelBusConfig {
    fn default() -> Self {
        Self {
            address: 0x3C,
            frequency_hz: 400_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorConfig {
    pub sample_period_ms: u64,
}

impl SensorConfig {
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms)
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sample_period_ms: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_device_constants() {
        let config = Config::default();

        assert_eq!(config.time.servers, ["time.nist.gov", "pool.ntp.org"]);
        assert_eq!(config.time.zone.utc_offset_secs, 7200);
        assert_eq!(config.time.zone.dst_offset_secs, 3600);
        assert_eq!(config.time.sync_period(), Duration::from_secs(60));
        assert_eq!(config.time.start_delay(), Duration::from_secs(1));
        assert_eq!(config.display.width, 128);
        assert_eq!(config.display.height, 32);
        assert_eq!(config.display.bus.address, 0x3C);
        assert_eq!(config.display.bus.frequency_hz, 400_000);
    }
}
