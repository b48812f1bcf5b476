use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Naive formats the backend emits when it serializes timezone-less datetimes.
/// Minute precision covers values echoed from `datetime-local` inputs.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A point in time reported by the backend.
///
/// Accepts RFC 3339 strings as well as naive ISO-8601 date-times, which are
/// interpreted as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// Parses a backend timestamp string.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(Self(dt.with_timezone(&Utc)));
        }
        NAIVE_FORMATS.iter().find_map(|fmt| {
            NaiveDateTime::parse_from_str(value, fmt)
                .ok()
                .map(|naive| Self(naive.and_utc()))
        })
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M UTC"))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Timestamp::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

/// A post time as the backend reports it.
///
/// Schedule directives travel to the backend verbatim, so whatever comes back
/// is kept: parsed when it reads as a timestamp, raw text otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PostTime {
    At(Timestamp),
    Raw(String),
}

impl PostTime {
    pub fn timestamp(&self) -> Option<Timestamp> {
        match self {
            PostTime::At(ts) => Some(*ts),
            PostTime::Raw(_) => None,
        }
    }
}

impl From<String> for PostTime {
    fn from(value: String) -> Self {
        match Timestamp::parse(&value) {
            Some(ts) => PostTime::At(ts),
            None => PostTime::Raw(value),
        }
    }
}

impl From<PostTime> for String {
    fn from(time: PostTime) -> Self {
        match time {
            PostTime::At(ts) => ts.0.to_rfc3339(),
            PostTime::Raw(raw) => raw,
        }
    }
}

impl fmt::Display for PostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostTime::At(ts) => fmt::Display::fmt(ts, f),
            PostTime::Raw(raw) => f.write_str(raw),
        }
    }
}
