use serde::{Deserialize, Serialize};
use std::fmt::Display;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Wall-clock instant, always UTC and always rendered as RFC 3339 so reports from
/// different experiments compare directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(#[serde(with = "time::serde::rfc3339")] OffsetDateTime);

impl Timestamp {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn from_unix_seconds(secs: i64) -> Option<Self> {
        OffsetDateTime::from_unix_timestamp(secs).ok().map(Self)
    }

    pub fn seconds_since(&self, earlier: &Timestamp) -> f64 {
        (self.0 - earlier.0).as_seconds_f64()
    }

    pub fn inner(&self) -> OffsetDateTime {
        self.0
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.format(&Rfc3339) {
            Ok(s) => write!(f, "{s}"),
            Err(_) => write!(f, "{}", self.0.unix_timestamp()),
        }
    }
}
