use chrono::{SecondsFormat, Utc};
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

#[inline]
pub fn get_current_time() -> Result<u128, SystemTimeError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
}

// Fast path: returns 0 on any error instead of double error handling
#[inline]
pub fn get_current_time_or_zero() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
#[inline]
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
