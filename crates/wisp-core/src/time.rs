//! Wall-clock time: UTC timestamps, time zones and local calendar time
//!
//! The conversion is done in integer arithmetic on days since the Unix epoch,
//! so it works without any platform time library.

use crate::config::TimeSyncConfig;
use crate::error::TimeReadError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const SECS_PER_DAY: i64 = 86_400;

/// Seconds since the Unix epoch, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_unix_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub const fn unix_secs(self) -> i64 {
        self.0
    }
}

/// When the daylight offset applies on top of the standard offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DaylightRule {
    None,
    Always,
    /// Last Sunday of March 01:00 UTC until last Sunday of October 01:00 UTC
    EuropeanUnion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeZone {
    pub utc_offset_secs: i32,
    pub dst_offset_secs: i32,
    pub dst_rule: DaylightRule,
}

impl TimeZone {
    pub const UTC: TimeZone = TimeZone {
        utc_offset_secs: 0,
        dst_offset_secs: 0,
        dst_rule: DaylightRule::None,
    };

    /// Whether daylight saving is in effect at `ts`.
    pub fn is_dst(&self, ts: Timestamp) -> bool {
        match self.dst_rule {
            DaylightRule::None => false,
            DaylightRule::Always => true,
            DaylightRule::EuropeanUnion => {
                let secs = ts.unix_secs();
                let (year, _, _) = civil_from_days(secs.div_euclid(SECS_PER_DAY));
                let start = last_sunday(year, 3, 31) * SECS_PER_DAY + 3600;
                let end = last_sunday(year, 10, 31) * SECS_PER_DAY + 3600;
                (start..end).contains(&secs)
            }
        }
    }

    /// Total offset from UTC at `ts`, in seconds.
    pub fn offset_at(&self, ts: Timestamp) -> i64 {
        let dst = if self.is_dst(ts) {
            self.dst_offset_secs
        } else {
            0
        };
        i64::from(self.utc_offset_secs) + i64::from(dst)
    }
}

/// Broken-down local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub year: i32,
    /// 1..=12
    pub month: u8,
    /// 1..=31
    pub day: u8,
    /// 0 = Sunday
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub dst: bool,
}

/// Convert a UTC timestamp to local calendar time in `zone`.
pub fn to_local(ts: Timestamp, zone: &TimeZone) -> LocalTime {
    let local = ts.unix_secs() + zone.offset_at(ts);
    let days = local.div_euclid(SECS_PER_DAY);
    let secs_of_day = local.rem_euclid(SECS_PER_DAY);
    let (year, month, day) = civil_from_days(days);

    LocalTime {
        year,
        month,
        day,
        weekday: weekday(days),
        hour: (secs_of_day / 3600) as u8,
        minute: (secs_of_day % 3600 / 60) as u8,
        second: (secs_of_day % 60) as u8,
        dst: zone.is_dst(ts),
    }
}

/// Source of wall-clock time.
///
/// `configure` is called once when connectivity is first confirmed, with the
/// servers and zone to use. `now_utc` must never block: implementations that
/// talk to the network do so in the background and report
/// [`TimeReadError::NotSynchronized`] until they have an answer.
pub trait TimeSource {
    fn configure(&mut self, config: &TimeSyncConfig<'_>);

    fn now_utc(&mut self) -> Result<Timestamp, TimeReadError>;

    fn to_local(&self, ts: Timestamp, zone: &TimeZone) -> LocalTime {
        to_local(ts, zone)
    }
}

/// 0 = Sunday. Day 0 (1970-01-01) was a Thursday.
fn weekday(days: i64) -> u8 {
    (days + 4).rem_euclid(7) as u8
}

fn last_sunday(year: i32, month: u8, last_day: u8) -> i64 {
    let days = days_from_civil(year, month, last_day);
    days - i64::from(weekday(days))
}

fn days_from_civil(year: i32, month: u8, day: u8) -> i64 {
    let y = i64::from(year) - i64::from(month <= 2);
    let m = i64::from(month);
    let era = y.div_euclid(400);
    let yoe = y.rem_euclid(400);
    let mp = if m > 2 { m - 3 } else { m + 9 };
    let doy = (153 * mp + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i32, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year as i32, month as u8, day as u8)
}
