// Timestamp text form for the JSON-safe target
//
// Fixed-width RFC 3339 in UTC with nanosecond precision, so the text sorts
// the same way the instants do and decoding is lossless.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};

use crate::internal::error::{Error, Result};

/// Formats a timestamp as `YYYY-MM-DDTHH:MM:SS.nnnnnnnnnZ`.
///
/// RFC 3339 has four-digit years only; instants outside 0000..=9999 fail.
pub fn format(value: &DateTime<Utc>) -> Result<String> {
    if !(0..=9999).contains(&value.year()) {
        return Err(Error::conversion(format!(
            "Year {} of {value} has no RFC 3339 text form",
            value.year()
        )));
    }
    Ok(render(value))
}

pub(crate) fn render(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parses any RFC 3339 timestamp and normalizes it to UTC.
pub fn parse(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| Error::conversion(format!("Invalid timestamp text {text:?}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_is_fixed_width() {
        let early = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let late = Utc.with_ymd_and_hms(2021, 11, 12, 13, 14, 15).unwrap();
        assert_eq!(format(&early).unwrap(), "2020-01-02T03:04:05.000000000Z");
        assert_eq!(format(&early).unwrap().len(), format(&late).unwrap().len());
        assert!(format(&early).unwrap() < format(&late).unwrap());
    }

    #[test]
    fn test_parse_round_trips_nanoseconds() {
        let value = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(parse(&format(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn test_years_outside_four_digits_are_rejected() {
        let far = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(format(&far).unwrap_err(), Error::ConversionError { .. }));
        let ancient = Utc.with_ymd_and_hms(-1, 6, 1, 0, 0, 0).unwrap();
        assert!(format(&ancient).is_err());
        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(parse(&format(&last).unwrap()).unwrap(), last);
    }

    #[test]
    fn test_parse_normalizes_offsets() {
        let parsed = parse("2020-01-01T02:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("yesterday").is_err());
    }
}
