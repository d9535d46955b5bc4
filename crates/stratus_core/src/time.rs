//! Duration type for Stratus.
//!
//! Durations are written the way configurations spell them,
//! `"<number> <unit>"`, and always resolve to whole seconds because that is
//! the granularity of every workflow field that takes one.

use crate::error::{CoreError, CoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\s*(second|seconds|minute|minutes|hour|hours|day|days)\s*$")
        .expect("duration pattern is a valid regex")
});

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;

/// Whole-second duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Duration {
    seconds: u64,
}

impl Duration {
    /// Zero duration
    #[must_use]
    pub const fn zero() -> Self {
        Self { seconds: 0 }
    }

    /// Create from seconds
    #[must_use]
    pub const fn from_secs(seconds: u64) -> Self {
        Self { seconds }
    }

    /// Create from minutes
    #[must_use]
    pub const fn from_mins(minutes: u64) -> Self {
        Self {
            seconds: minutes.saturating_mul(SECONDS_PER_MINUTE),
        }
    }

    /// Create from hours
    #[must_use]
    pub const fn from_hours(hours: u64) -> Self {
        Self {
            seconds: hours.saturating_mul(SECONDS_PER_HOUR),
        }
    }

    /// Create from days
    #[must_use]
    pub const fn from_days(days: u64) -> Self {
        Self {
            seconds: days.saturating_mul(SECONDS_PER_DAY),
        }
    }

    /// Parse the `"<number> <unit>"` form, e.g. `"2 seconds"` or `"1 day"`
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDuration`] if the text does not match
    pub fn parse(input: &str) -> CoreResult<Self> {
        let invalid = || CoreError::InvalidDuration {
            input: input.to_string(),
        };

        let captures = DURATION_PATTERN.captures(input).ok_or_else(invalid)?;
        let amount: u64 = captures[1].parse().map_err(|_| invalid())?;
        let unit = match &captures[2] {
            "second" | "seconds" => 1,
            "minute" | "minutes" => SECONDS_PER_MINUTE,
            "hour" | "hours" => SECONDS_PER_HOUR,
            _ => SECONDS_PER_DAY,
        };

        let seconds = amount.checked_mul(unit).ok_or_else(invalid)?;
        Ok(Self { seconds })
    }

    /// Get total seconds
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.seconds
    }

    /// Check if zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.seconds == 0
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for Duration {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Duration {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Duration {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Duration> for String {
    fn from(value: Duration) -> Self {
        value.to_string()
    }
}

impl From<std::time::Duration> for Duration {
    fn from(value: std::time::Duration) -> Self {
        Self::from_secs(value.as_secs())
    }
}

impl std::fmt::Display for Duration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.seconds == 1 {
            write!(f, "1 second")
        } else {
            write!(f, "{} seconds", self.seconds)
        }
    }
}
