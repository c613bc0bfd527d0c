//! Display formatting for source timestamps.
//!
//! The persisted `ts` column holds the source timestamp shifted by a fixed
//! +2 hour offset. This is not a real timezone: no daylight-saving rules, no
//! timezone database, just a constant shift applied before formatting.

use chrono::{DateTime, Datelike, FixedOffset};

/// Fixed display offset east of UTC, in seconds.
const DISPLAY_OFFSET_SECS: i32 = 2 * 3600;

/// Sentinel for instants the display form cannot represent.
const INVALID_SENTINEL: &str = "0001-01-01 00:00:00";

/// Formats an epoch-second count as `YYYY-MM-DD HH:MM:SS`, shifted +2h.
///
/// Total over the input domain: inputs outside the representable range (or
/// past year 9999, which would overflow the 19-character form) yield the
/// sentinel `0001-01-01 00:00:00`. The output is always exactly 19 bytes.
#[must_use]
pub fn display_timestamp(epoch_secs: u64) -> String {
    let Ok(secs) = i64::try_from(epoch_secs) else {
        return INVALID_SENTINEL.to_string();
    };
    let Some(offset) = FixedOffset::east_opt(DISPLAY_OFFSET_SECS) else {
        return INVALID_SENTINEL.to_string();
    };
    match DateTime::from_timestamp(secs, 0) {
        Some(utc) => {
            let shifted = utc.with_timezone(&offset);
            if shifted.year() > 9999 {
                return INVALID_SENTINEL.to_string();
            }
            shifted.format("%Y-%m-%d %H:%M:%S").to_string()
        }
        None => INVALID_SENTINEL.to_string(),
    }
}
