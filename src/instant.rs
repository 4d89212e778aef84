//! Parsing and serialization of performance time bounds
//!
//! Instants are written as RFC 3339 in UTC. Reading also accepts naive
//! ISO 8601 date-times (`2024-01-01T10:00:00`), which are taken as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Parse an instant from user input or a stored declaration.
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Ok(naive.and_utc()),
        Err(e) => NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .map(|date| date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
            .map_err(|_| e),
    }
}

/// Canonical text form of an instant.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// `#[serde(with = "crate::instant::serde_instant")]`
pub mod serde_instant {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_instant(instant))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_instant(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_instant("2024-01-01T10:00:00").unwrap(), expected);
        assert_eq!(parse_instant("2024-01-01T10:00:00Z").unwrap(), expected);
        assert_eq!(parse_instant("2024-01-01T12:00:00+02:00").unwrap(), expected);
        assert_eq!(
            parse_instant("2024-01-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert!(parse_instant("yesterday").is_err());
    }

    #[test]
    fn test_format_is_utc_rfc3339() {
        let instant = parse_instant("2024-03-05T07:08:09").unwrap();
        assert_eq!(format_instant(&instant), "2024-03-05T07:08:09Z");
    }
}
