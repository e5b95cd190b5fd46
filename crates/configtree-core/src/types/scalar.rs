//! Canonical scalar text helpers shared by the codecs

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Shortest text that parses back to the same `f64`
///
/// Very large and very small magnitudes use exponent form (`1e300`).
pub fn format_float(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-5..1e16).contains(&magnitude) {
        format!("{:e}", value)
    } else {
        format!("{}", value)
    }
}

/// Parse `true` / `false` (any letter case)
pub fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Canonical text of a boolean
pub fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Whether the text is a date or date-time literal
///
/// Accepts RFC3339 timestamps, offset-less `YYYY-MM-DD[T ]HH:MM:SS[.fff]`
/// and plain `YYYY-MM-DD` dates.
pub fn is_datetime(text: &str) -> bool {
    if text.len() < 10 || !text.as_bytes()[0].is_ascii_digit() {
        return false;
    }
    DateTime::parse_from_rfc3339(text).is_ok()
        || NAIVE_DATETIME_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(text, fmt).is_ok())
        || NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}

/// Parse an offset-aware timestamp, treating offset-less date-times as UTC
pub fn parse_offset_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Render a timestamp as RFC3339 in UTC (`1979-05-27T07:32:00Z`)
pub fn format_utc(dt: DateTime<FixedOffset>) -> String {
    dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float_round_trips() {
        for v in [0.5, -12.25, 1e300, 3.0, f64::MIN_POSITIVE] {
            let text = format_float(v);
            assert_eq!(text.parse::<f64>().unwrap(), v);
        }
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(1e300), "1e300");
        assert_eq!(format_float(-2.5e-9), "-2.5e-9");
        assert_eq!(format_float(123456.0), "123456");
        assert_eq!(format_float(0.0), "0");
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("yes"), None);
        assert_eq!(format_bool(true), "true");
    }

    #[test]
    fn test_is_datetime() {
        assert!(is_datetime("1979-05-27T07:32:00Z"));
        assert!(is_datetime("1979-05-27T00:32:00.999-07:00"));
        assert!(is_datetime("1979-05-27 07:32:00"));
        assert!(is_datetime("1979-05-27"));
        assert!(!is_datetime("1979"));
        assert!(!is_datetime("hello world"));
        assert!(!is_datetime("27/05/1979"));
        assert!(!is_datetime(" 2024-01-01"));
        assert!(!is_datetime("2024-01-01 "));
    }

    #[test]
    fn test_utc_normalization() {
        let dt = parse_offset_datetime("1979-05-27T00:32:00-07:00").unwrap();
        assert_eq!(format_utc(dt), "1979-05-27T07:32:00Z");

        let naive = parse_offset_datetime("1979-05-27T07:32:00.5").unwrap();
        assert_eq!(format_utc(naive), "1979-05-27T07:32:00.500Z");

        assert!(parse_offset_datetime("1979-05-27").is_none());
    }
}
