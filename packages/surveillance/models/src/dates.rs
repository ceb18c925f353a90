//! Wire-format dates and the [`TransformDates`] normalization pass.
//!
//! The API transmits every date-bearing field (`reportedAt`, `lastTested`,
//! `timestamp`) as an ISO 8601 string. Records decode with those fields in
//! the [`DateValue::Wire`] state and are converted to
//! [`DateValue::Parsed`] by [`TransformDates::transform_dates`] before
//! anything displays or sorts them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A date field that is either still in wire format or already parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateValue {
    /// The raw string exactly as received.
    Wire(String),
    /// A structured UTC instant.
    Parsed(DateTime<Utc>),
}

impl DateValue {
    /// Wraps a raw wire string.
    #[must_use]
    pub fn wire(raw: impl Into<String>) -> Self {
        Self::Wire(raw.into())
    }

    /// Returns the structured instant, if this value has been parsed.
    #[must_use]
    pub const fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Parsed(dt) => Some(dt),
            Self::Wire(_) => None,
        }
    }

    /// Whether this value is in the structured state.
    #[must_use]
    pub const fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }
}

impl From<DateTime<Utc>> for DateValue {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::Parsed(dt)
    }
}

impl std::fmt::Display for DateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wire(raw) => f.write_str(raw),
            Self::Parsed(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

impl Serialize for DateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::Wire)
    }
}

/// Parses an ISO 8601 wire date into a UTC instant.
///
/// Accepts RFC 3339 timestamps with an offset, naive timestamps (taken as
/// UTC, which is what the backend emits), and plain `YYYY-MM-DD` dates
/// (midnight UTC). Returns `None` for anything else.
#[must_use]
pub fn parse_wire_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Converts wire-format date fields into structured dates.
///
/// Implementations must be idempotent: applying the pass to an already
/// transformed value returns it unchanged.
pub trait TransformDates: Sized {
    /// Returns `self` with every date field in the parsed state.
    #[must_use]
    fn transform_dates(self) -> Self;
}

impl TransformDates for DateValue {
    fn transform_dates(self) -> Self {
        match self {
            Self::Wire(raw) => parse_wire_date(&raw).map_or_else(
                || {
                    log::warn!("Leaving unparseable date {raw:?} in wire format");
                    Self::Wire(raw)
                },
                Self::Parsed,
            ),
            parsed @ Self::Parsed(_) => parsed,
        }
    }
}

impl<T: TransformDates> TransformDates for Option<T> {
    fn transform_dates(self) -> Self {
        self.map(T::transform_dates)
    }
}

impl<T: TransformDates> TransformDates for Vec<T> {
    fn transform_dates(self) -> Self {
        self.into_iter().map(T::transform_dates).collect()
    }
}
