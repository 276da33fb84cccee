//! Time primitives.
//!
//! The control core runs on a monotonic millisecond uptime ([`Millis`]). Wall
//! clock ([`Timestamp`]) is only used to stamp persisted events and, through a
//! [`TimeZone`], to place the lights window in the local day.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Milliseconds since the controller started.
pub type Millis = u64;

/// UTC timestamp used across the domain.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// A fixed-offset zone written the POSIX `TZ` way, e.g. `UTC0`, `EST5`, `CET-1`
/// or `IST-5:30`.
///
/// The POSIX sign is inverted: `EST5` is five hours *behind* UTC. Daylight
/// saving rules are not supported, so a trailing DST section is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeZone {
    raw: String,
    /// Seconds east of UTC.
    offset_secs: i32,
}

impl TimeZone {
    #[must_use]
    pub fn utc() -> Self {
        Self {
            raw: "UTC0".to_string(),
            offset_secs: 0,
        }
    }

    #[must_use]
    pub fn offset_secs(&self) -> i32 {
        self.offset_secs
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Minute of the local day (0-1439) for a wall-clock instant.
    #[must_use]
    pub fn minute_of_day(&self, at: Timestamp) -> u16 {
        let local = at + Duration::seconds(i64::from(self.offset_secs));
        // hour < 24 and minute < 60, so this always fits
        u16::try_from(local.hour() * 60 + local.minute()).unwrap_or(0)
    }
}

impl Default for TimeZone {
    fn default() -> Self {
        Self::utc()
    }
}

impl fmt::Display for TimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for TimeZone {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTimezone(s.to_string());

        let name_len = s.chars().take_while(char::is_ascii_alphabetic).count();
        if name_len < 3 {
            return Err(invalid());
        }
        let rest = &s[name_len..];

        let (sign, digits) = match rest.as_bytes().first() {
            Some(b'+') => (1, &rest[1..]),
            Some(b'-') => (-1, &rest[1..]),
            _ => (1, rest),
        };

        // anything after the offset is a DST name and its transition rules
        let offset_len = digits
            .bytes()
            .take_while(|b| b.is_ascii_digit() || *b == b':')
            .count();
        let (digits, dst) = digits.split_at(offset_len);
        let dst_found = dst.starts_with(|c: char| c.is_ascii_alphabetic() || c == '<' || c == ',');
        if !dst.is_empty() && !dst_found {
            return Err(invalid());
        }

        let (hours, minutes) = match digits.split_once(':') {
            Some((h, m)) => (h, Some(m)),
            None => (digits, None),
        };
        if hours.is_empty() || hours.len() > 2 || !hours.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = match minutes {
            Some(m) if m.len() == 2 && m.bytes().all(|b| b.is_ascii_digit()) => {
                m.parse().map_err(|_| invalid())?
            }
            Some(_) => return Err(invalid()),
            None => 0,
        };
        if hours > 24 || minutes > 59 {
            return Err(invalid());
        }

        if dst_found {
            return Err(ValidationError::UnsupportedDst(s.to_string()));
        }

        Ok(Self {
            raw: s.to_string(),
            offset_secs: -sign * (hours * 3600 + minutes * 60),
        })
    }
}

impl TryFrom<String> for TimeZone {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeZone> for String {
    fn from(tz: TimeZone) -> Self {
        tz.raw
    }
}
