use chrono::{Local, NaiveDate, TimeZone};

const DATE_ONLY_FORMAT: &str = "%Y-%m-%d";

/// Formats an epoch-millisecond timestamp as `YYYY-MM-DD` in local time.
/// `None` and out-of-range timestamps yield an empty string.
pub fn to_date_only_input_value(timestamp_ms: Option<i64>) -> String {
    timestamp_ms
        .and_then(|ms| Local.timestamp_millis_opt(ms).single())
        .map(|at| at.format(DATE_ONLY_FORMAT).to_string())
        .unwrap_or_default()
}

/// Parses a `YYYY-MM-DD` input into the local start-of-day epoch milliseconds.
pub fn to_timestamp_or_null(date_only: &str) -> Option<i64> {
    let trimmed = date_only.trim();
    if trimmed.is_empty() {
        return None;
    }

    let date = NaiveDate::parse_from_str(trimmed, DATE_ONLY_FORMAT).ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|at| at.timestamp_millis())
}
