//! Serde helpers for the `deadlineISO` field.
//!
//! The service emits ISO-8601 timestamps that may or may not carry a UTC
//! offset. Offset-less timestamps are stored in UTC, so we read them as such.

use chrono::{DateTime, NaiveDateTime, ParseError, TimeZone, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

/// Accepted layout for timestamps without an offset; the fraction is optional.
const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parse a deadline, treating a missing offset as UTC.
pub fn parse(s: &str) -> Result<DateTime<Utc>, ParseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(s, NAIVE_FORMAT).map(|n| Utc.from_utc_datetime(&n)))
}

pub fn serialize<S>(deadline: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match deadline {
        Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
        None => serializer.serialize_none(),
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.trim().is_empty() => parse(s.trim()).map(Some).map_err(D::Error::custom),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    #[test]
    fn offsets_are_respected() {
        let dt = parse("2024-05-01T12:30:00+03:00").unwrap();
        assert_eq!(dt.hour(), 9);
        assert_eq!(dt.minute(), 30);

        let dt = parse("2024-05-01T12:30:00Z").unwrap();
        assert_eq!(dt.hour(), 12);
    }

    #[test]
    fn naive_timestamps_are_utc() {
        let dt = parse("2024-05-01T12:30:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap());

        let dt = parse("2024-05-01T12:30:00.250000").unwrap();
        assert_eq!(dt.nanosecond(), 250_000_000);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse("next tuesday").is_err());
        assert!(parse("2024-13-01T00:00:00").is_err());
    }
}
