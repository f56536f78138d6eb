//! Wall-clock and monotonic time sampling
//!
//! The host keeps two clocks apart:
//! - the calendar clock seeds the engine and stamps saves, so the engine can
//!   fast-forward across real-world gaps between sessions
//! - the monotonic clock paces ticks and autosaves, so DST or NTP steps never
//!   show up as a huge (or negative) tick delta

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize};

/// Monotonic clock sample in nanoseconds since an arbitrary origin.
pub type Nanos = u64;

/// Civil wall-clock timestamp with second resolution and no timezone.
///
/// Only built from a real local time (`From<NaiveDateTime>`) or by
/// deserializing fields that form a valid date and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CalendarTime {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
}

impl CalendarTime {
    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn second(&self) -> u32 {
        self.second
    }

    /// Convert back into a chrono timestamp.
    pub fn to_naive(&self) -> NaiveDateTime {
        // Fields are validated at construction, so this cannot fail.
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|date| {
                NaiveTime::from_hms_opt(self.hour, self.minute, self.second)
                    .map(|time| NaiveDateTime::new(date, time))
            })
            .unwrap_or_default()
    }

    /// Signed seconds from `earlier` to `self`.
    ///
    /// Negative when the wall clock was set back since `earlier` was taken;
    /// engines decide how to treat that.
    pub fn seconds_since(&self, earlier: &CalendarTime) -> i64 {
        (self.to_naive() - earlier.to_naive()).num_seconds()
    }

    fn from_parts(parts: CalendarParts) -> Option<Self> {
        let date = NaiveDate::from_ymd_opt(parts.year, parts.month, parts.day)?;
        let time = NaiveTime::from_hms_opt(parts.hour, parts.minute, parts.second)?;
        Some(NaiveDateTime::new(date, time).into())
    }
}

impl From<NaiveDateTime> for CalendarTime {
    fn from(value: NaiveDateTime) -> Self {
        Self {
            year: value.year(),
            month: value.month(),
            day: value.day(),
            hour: value.hour(),
            minute: value.minute(),
            // Leap seconds report second 59 with extra nanos; nanos are dropped.
            second: value.second(),
        }
    }
}

impl fmt::Display for CalendarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[derive(Deserialize)]
struct CalendarParts {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
}

impl<'de> Deserialize<'de> for CalendarTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parts = CalendarParts::deserialize(deserializer)?;
        let shown = format!(
            "{}-{}-{} {}:{}:{}",
            parts.year, parts.month, parts.day, parts.hour, parts.minute, parts.second
        );
        CalendarTime::from_parts(parts).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid calendar time {shown}"))
        })
    }
}

/// Source of calendar and monotonic time for the host loop.
pub trait TimeSource {
    /// Sample the real-time clock as local civil time.
    fn now_calendar(&self) -> CalendarTime;

    /// Sample the monotonic clock in nanoseconds.
    ///
    /// Only meaningful as a difference between two samples of the same source.
    fn now_monotonic(&self) -> Nanos;
}

/// Delta between two monotonic samples.
///
/// A sample that went backwards yields zero rather than wrapping.
pub fn elapsed_between(earlier: Nanos, later: Nanos) -> Duration {
    Duration::from_nanos(later.saturating_sub(earlier))
}

/// Time source backed by the operating system clocks.
#[derive(Debug, Clone)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now_calendar(&self) -> CalendarTime {
        chrono::Local::now().naive_local().into()
    }

    fn now_monotonic(&self) -> Nanos {
        // u64 nanoseconds cover ~584 years of uptime.
        self.origin.elapsed().as_nanos() as Nanos
    }
}
