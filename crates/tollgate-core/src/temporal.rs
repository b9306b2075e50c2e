//! # Temporal Types
//!
//! UTC-only timestamp for every protocol artifact. Timestamps appear inside
//! signed payloads, so their serialized form must be deterministic: ISO 8601
//! with a `Z` suffix, truncated to whole seconds. Local time is a
//! presentation concern that never enters the protocol.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A UTC timestamp with second-level precision.
///
/// Serializes as `2026-08-07T12:00:00Z`. Subsecond precision is dropped at
/// construction so that re-serializing a deserialized timestamp reproduces
/// the exact signed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Wrap a `chrono` datetime, truncating to seconds.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let truncated = dt
            .with_nanosecond(0)
            .unwrap_or(dt);
        Self(truncated)
    }

    /// Access the underlying datetime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Seconds since the Unix epoch, as used in token claims.
    pub fn unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    /// Render as ISO 8601 with `Z` suffix and no subseconds.
    pub fn to_canonical_string(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Parse from an RFC 3339 string, truncating to seconds.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)?;
        Ok(Self::from_datetime(dt.with_timezone(&Utc)))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(dt)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
