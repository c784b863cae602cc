//! Timestamp parsing and age arithmetic.
//!
//! Every date in the input files (date of birth, lab collection time) uses
//! the fixed layout `YYYY-MM-DD HH:MM:SS.ffffff`, with one to six
//! fractional digits. Anything else is rejected.

use chrono::NaiveDateTime;

use crate::{ModelError, ModelResult};

/// `chrono` layout used to parse input timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// `chrono` layout used when writing timestamps back out.
pub const TIMESTAMP_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Length of a year in seconds, counting a quarter leap day.
pub const SECONDS_PER_YEAR: f64 = 60.0 * 60.0 * 24.0 * 365.25;

/// Parses a timestamp in the fixed `YYYY-MM-DD HH:MM:SS.ffffff` format.
///
/// The fractional part is mandatory and may carry between one and six
/// digits, so `2000-06-15 02:45:40.547` is accepted while `2000-06-15`
/// and `2000-06-15 02:45:40` are not.
///
/// # Examples
///
/// ```
/// use ehr_types::parse_timestamp;
///
/// assert!(parse_timestamp("2000-06-15 02:45:40.547").is_ok());
/// assert!(parse_timestamp("2000-06-15").is_err());
/// ```
pub fn parse_timestamp(value: &str) -> ModelResult<NaiveDateTime> {
    let malformed = || ModelError::MalformedTimestamp {
        value: value.to_string(),
    };

    // chrono treats the fraction as optional, the format here does not.
    let (_, fraction) = value.rsplit_once('.').ok_or_else(malformed)?;
    if fraction.is_empty() || fraction.len() > 6 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|_| malformed())
}

/// Formats a timestamp with six fractional digits.
pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_OUTPUT_FORMAT).to_string()
}

/// Whole years elapsed from `from` to `to`, truncated toward zero.
///
/// # Examples
///
/// ```
/// use ehr_types::{parse_timestamp, years_between};
///
/// let birth = parse_timestamp("1980-06-15 02:45:40.547").unwrap();
/// let lab = parse_timestamp("2000-07-01 03:20:24.070").unwrap();
/// assert_eq!(years_between(birth, lab), 20);
/// ```
pub fn years_between(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    let elapsed = to - from;
    let seconds = match elapsed.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => elapsed.num_seconds() as f64,
    };
    (seconds / SECONDS_PER_YEAR) as i64
}
