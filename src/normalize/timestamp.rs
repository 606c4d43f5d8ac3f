use chrono::{DateTime, NaiveDateTime};
use thiserror::Error;

/// Layout of every datetime column in the output schema
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// nginx `$time_local`
const TIME_LOCAL_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("unrecognised timestamp '{0}'")]
    Unrecognised(String),
}

/// Parse the envelope's `time` field, keeping its wall-clock value.
///
/// Accepts RFC 3339 / ISO 8601 with an offset, nginx `time_local` and the
/// naive ISO forms. The offset is not applied: the canonical form records
/// the time as the web server wrote it.
pub fn parse_event_time(value: &str) -> Result<NaiveDateTime, TimestampError> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(value, TIME_LOCAL_FORMAT) {
        return Ok(dt.naive_local());
    }
    for format in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ndt);
        }
    }

    Err(TimestampError::Unrecognised(value.to_string()))
}

pub fn format_canonical(value: &NaiveDateTime) -> String {
    value.format(CANONICAL_FORMAT).to_string()
}

/// Unix epoch seconds rendered canonically (UTC); `None` for values <= 0
/// and for anything that is not an integer.
pub fn epoch_to_canonical(value: Option<&str>) -> Option<String> {
    let seconds: i64 = value?.trim().parse().ok()?;
    if seconds <= 0 {
        return None;
    }
    DateTime::from_timestamp(seconds, 0).map(|dt| format_canonical(&dt.naive_utc()))
}
