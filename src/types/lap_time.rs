//! Lap time parsing for `M:SS.fff` timing strings

use std::time::Duration;

/// Parse a lap time of the form `minutes:seconds.fraction`.
///
/// Minutes and seconds are one or two digits below 60 and the fraction has one
/// to six digits. Anything else yields `None`, so an odd value from the feed is
/// skipped rather than treated as an error.
pub fn parse_lap_time(text: &str) -> Option<Duration> {
    let (minutes, rest) = text.trim().split_once(':')?;
    let (seconds, fraction) = rest.split_once('.')?;

    let minutes = two_digit_field(minutes)?;
    let seconds = two_digit_field(seconds)?;

    if fraction.is_empty() || fraction.len() > 6 || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    // Right-pad to microseconds: "552" -> 552000
    let micros: u64 = format!("{:0<6}", fraction).parse().ok()?;

    Some(Duration::from_secs(minutes * 60 + seconds) + Duration::from_micros(micros))
}

fn two_digit_field(field: &str) -> Option<u64> {
    if field.is_empty() || field.len() > 2 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u64 = field.parse().ok()?;
    (value < 60).then_some(value)
}
