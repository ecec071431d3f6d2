use std::str::FromStr;
use std::time::SystemTime;

use jiff::{Timestamp, Zoned};
use jiff::civil::{Date, DateTime, Time};
use jiff::tz::TimeZone;

use crate::consts::MIN_TIME_EXAMPLE;

#[derive(Debug, thiserror::Error)]
#[error("Invalid min_time `{value}`, expected a date-time like {}", MIN_TIME_EXAMPLE)]
#[non_exhaustive]
pub struct MinTimeError {
    pub value: String,
    pub source: jiff::Error,
}

/// Parses a `min_time` threshold.
///
/// Civil date-times (`2023-12-04T20:56:48`, optionally with fractional seconds) and plain dates
/// (`2023-12-04`, midnight) are read in the local time zone, the same way file modification
/// times are displayed. Strings carrying an offset (`Z`, `+01:00`) are exact instants and a
/// bracketed time zone (`2023-12-04T20:56:48[UTC]`) is used instead of the local one.
pub fn parse_min_time(value: &str) -> Result<Timestamp, MinTimeError> {
    let value = value.trim();
    let err = |source| MinTimeError {
        value: value.to_string(),
        source,
    };

    // A time zone annotation is honored, or the string is rejected if it doesn't match
    if value.contains('[') {
        return Zoned::from_str(value).map(|z| z.timestamp()).map_err(err);
    }

    if let Ok(ts) = Timestamp::from_str(value) {
        return Ok(ts);
    }

    let civil = match DateTime::from_str(value) {
        Ok(dt) => dt,
        Err(e) => match Date::from_str(value) {
            Ok(d) => d.to_datetime(Time::midnight()),
            Err(_) => return Err(err(e)),
        },
    };

    civil
        .to_zoned(TimeZone::system())
        .map(|z| z.timestamp())
        .map_err(err)
}

pub(crate) fn from_system_time(time: SystemTime) -> Result<Timestamp, MinTimeError> {
    Timestamp::try_from(time).map_err(|source| MinTimeError {
        value: format!("{time:?}"),
        source,
    })
}
