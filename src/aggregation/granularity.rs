//! Window sizes for down-sampling a series.

use crate::core::{Result, TelemetryError};
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar unit of an interval window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

/// Output resolution of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    /// One value per raw sample
    Shortest,
    /// Fixed windows of `count` units
    Interval { unit: IntervalUnit, count: u32 },
}

impl Granularity {
    pub fn interval(unit: IntervalUnit, count: u32) -> Self {
        Granularity::Interval { unit, count }
    }

    pub fn milliseconds(count: u32) -> Self {
        Self::interval(IntervalUnit::Millisecond, count)
    }

    pub fn seconds(count: u32) -> Self {
        Self::interval(IntervalUnit::Second, count)
    }

    pub fn minutes(count: u32) -> Self {
        Self::interval(IntervalUnit::Minute, count)
    }

    pub fn hours(count: u32) -> Self {
        Self::interval(IntervalUnit::Hour, count)
    }

    pub fn days(count: u32) -> Self {
        Self::interval(IntervalUnit::Day, count)
    }

    pub fn is_shortest(&self) -> bool {
        matches!(self, Granularity::Shortest)
    }

    /// Reject zero-width windows
    pub fn validate(&self) -> Result<()> {
        match self {
            Granularity::Interval { count: 0, unit } => Err(TelemetryError::range(format!(
                "interval count must be at least 1 for {:?} granularity",
                unit
            ))),
            _ => Ok(()),
        }
    }

    /// Raise a millisecond window narrower than `floor` up to it
    pub fn with_floor(self, floor: std::time::Duration) -> Self {
        match self {
            Granularity::Interval {
                unit: IntervalUnit::Millisecond,
                count,
            } => {
                let floor_ms = u32::try_from(floor.as_millis()).unwrap_or(u32::MAX).max(1);
                if count < floor_ms {
                    tracing::debug!(requested = count, floor = floor_ms, "Raised millisecond interval to timer floor");
                }
                Granularity::milliseconds(count.max(floor_ms))
            },
            other => other,
        }
    }

    /// End of the window starting at `from`; `None` for `Shortest` or on overflow
    pub fn advance(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let Granularity::Interval { unit, count } = *self else {
            return None;
        };
        let count = i64::from(count);
        match unit {
            IntervalUnit::Millisecond => from.checked_add_signed(Duration::try_milliseconds(count)?),
            IntervalUnit::Second => from.checked_add_signed(Duration::try_seconds(count)?),
            IntervalUnit::Minute => from.checked_add_signed(Duration::try_minutes(count)?),
            IntervalUnit::Hour => from.checked_add_signed(Duration::try_hours(count)?),
            IntervalUnit::Day => from.checked_add_signed(Duration::try_days(count)?),
            IntervalUnit::Week => from.checked_add_signed(Duration::try_weeks(count)?),
            IntervalUnit::Month => from.checked_add_months(Months::new(u32::try_from(count).ok()?)),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Shortest => f.write_str("shortest"),
            Granularity::Interval { unit, count } => write!(f, "{} x {:?}", count, unit),
        }
    }
}
