use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use crate::error::{AipDriftError, Result};

/// A source "changed" value: the raw upstream string plus its parsed instant.
///
/// Equality and ordering use the instant, so `2024-01-01T00:00:00+00:00` and
/// `2024-01-01` compare equal. The raw form is what gets written to object
/// metadata and ledgers.
#[derive(Debug, Clone)]
pub struct ChangeTimestamp {
    raw: String,
    instant: DateTime<Utc>,
}

impl ChangeTimestamp {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let instant = parse_instant(trimmed)
            .ok_or_else(|| AipDriftError::Timestamp(format!("unrecognized timestamp '{}'", raw)))?;

        Ok(Self {
            raw: trimmed.to_string(),
            instant,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    pub fn is_after(&self, other: &ChangeTimestamp) -> bool {
        self.instant > other.instant
    }
}

/// Compare a source timestamp with a value read back from the store.
/// Falls back to raw string equality when the stored value does not parse.
pub fn timestamps_match(source: &ChangeTimestamp, stored: &str) -> bool {
    match parse_instant(stored.trim()) {
        Some(instant) => instant == source.instant,
        None => source.raw == stored,
    }
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl PartialEq for ChangeTimestamp {
    fn eq(&self, other: &Self) -> bool {
        self.instant == other.instant
    }
}

impl Eq for ChangeTimestamp {}

impl PartialOrd for ChangeTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChangeTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instant.cmp(&other.instant)
    }
}

impl fmt::Display for ChangeTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for ChangeTimestamp {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let ts = ChangeTimestamp::parse("2022-05-18T13:35:49+00:00").unwrap();
        assert_eq!(ts.instant(), Utc.with_ymd_and_hms(2022, 5, 18, 13, 35, 49).unwrap());
        assert_eq!(ts.as_str(), "2022-05-18T13:35:49+00:00");
    }

    #[test]
    fn test_parse_non_utc_offset_normalizes() {
        let ts = ChangeTimestamp::parse("2024-01-01T01:00:00+01:00").unwrap();
        assert_eq!(ts.instant(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_compact_offset() {
        let ts = ChangeTimestamp::parse("2024-01-01T01:01:01+0000").unwrap();
        assert_eq!(ts.instant(), Utc.with_ymd_and_hms(2024, 1, 1, 1, 1, 1).unwrap());
    }

    #[test]
    fn test_parse_date_only() {
        let ts = ChangeTimestamp::parse("2024-01-01").unwrap();
        assert_eq!(ts.instant(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_naive_datetime_is_utc() {
        let ts = ChangeTimestamp::parse("2024-05-16T16:51:52").unwrap();
        assert_eq!(ts.instant(), Utc.with_ymd_and_hms(2024, 5, 16, 16, 51, 52).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ChangeTimestamp::parse("yesterday").is_err());
        assert!(ChangeTimestamp::parse("").is_err());
    }

    #[test]
    fn test_ordering_is_chronological_not_lexicographic() {
        // "+05:00" sorts after "+00:00" as a string but is earlier in time
        let east = ChangeTimestamp::parse("2024-01-01T10:00:00+05:00").unwrap();
        let utc = ChangeTimestamp::parse("2024-01-01T06:00:00+00:00").unwrap();
        assert!(utc > east);
        assert!(utc.is_after(&east));
        assert!(east.as_str() > utc.as_str());
    }

    #[test]
    fn test_zero_padded_strings_agree_with_instants() {
        let a = ChangeTimestamp::parse("2024-09-30T23:59:59+00:00").unwrap();
        let b = ChangeTimestamp::parse("2024-10-01T00:00:00+00:00").unwrap();
        assert!(a < b);
        assert!(a.as_str() < b.as_str());
    }

    #[test]
    fn test_equal_instants_with_different_forms() {
        let a = ChangeTimestamp::parse("2024-01-01").unwrap();
        let b = ChangeTimestamp::parse("2024-01-01T00:00:00+00:00").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_timestamps_match_parsed_and_raw() {
        let src = ChangeTimestamp::parse("2024-01-01T01:01:01+00:00").unwrap();
        assert!(timestamps_match(&src, "2024-01-01T01:01:01+00:00"));
        assert!(timestamps_match(&src, "2024-01-01T02:01:01+01:00"));
        assert!(!timestamps_match(&src, "2026-01-01"));
        assert!(!timestamps_match(&src, "f"));
    }

    #[test]
    fn test_serializes_raw_form() {
        let ts = ChangeTimestamp::parse("2024-01-01").unwrap();
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"2024-01-01\"");
    }
}
