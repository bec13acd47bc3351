//! Timestamp parsing for the price service's near-ISO-8601 formats
//!
//! The service uses two shapes:
//! - manifest timestamps such as `2024-01-01T10:00:00Z`, where the trailing
//!   zone designator has to be trimmed before parsing
//! - item timestamps such as `2024-01-01T09:59:00.123456`, where only the part
//!   before the first `.` is kept
//!
//! Both are UTC wall-clock times.

use crate::{error::ProviderError, types::Timestamp};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};

/// Parses a manifest timestamp (`...T10:00:00Z`)
pub fn parse_manifest_timestamp(raw: &str) -> Result<Timestamp, ProviderError> {
    let trimmed = raw.strip_suffix('Z').unwrap_or(raw);
    parse_naive(trimmed, raw)
}

/// Parses an item timestamp (`...T09:59:00.123456`), dropping the fraction
pub fn parse_listing_timestamp(raw: &str) -> Result<Timestamp, ProviderError> {
    let whole_seconds = raw.split('.').next().unwrap_or(raw);
    let trimmed = whole_seconds.strip_suffix('Z').unwrap_or(whole_seconds);
    parse_naive(trimmed, raw)
}

fn parse_naive(value: &str, raw: &str) -> Result<Timestamp, ProviderError> {
    value
        .parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(|e| ProviderError::parse(format!("bad timestamp {:?}: {}", raw, e)))
}

/// Serde adapter for fields carrying an item timestamp
pub(crate) fn deserialize_listing_timestamp<'de, D>(
    deserializer: D,
) -> Result<Timestamp, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_listing_timestamp(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_manifest_timestamp_trims_zone() {
        let ts = parse_manifest_timestamp("2024-01-01T10:00:00Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_manifest_timestamp_keeps_fraction() {
        let ts = parse_manifest_timestamp("2024-01-01T10:00:00.500Z").unwrap();
        let whole = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert!(ts > whole);
    }

    #[test]
    fn test_listing_timestamp_drops_fraction() {
        let ts = parse_listing_timestamp("2024-01-01T09:59:00.123456").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 1, 9, 59, 0).unwrap());

        let no_fraction = parse_listing_timestamp("2024-01-01T09:59:00").unwrap();
        assert_eq!(ts, no_fraction);
    }

    #[test]
    fn test_malformed_timestamp_is_parse_error() {
        let err = parse_manifest_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
        assert!(parse_listing_timestamp("").is_err());
    }
}
