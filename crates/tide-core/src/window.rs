//! Inclusive calendar-day windows used by recompute tasks and read queries.

use chrono::{Days, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// An inclusive `[start, end]` range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Build a window, rejecting `end < start`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidRange` when `end` precedes `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CoreError> {
        if end < start {
            return Err(CoreError::InvalidRange {
                from: start,
                to: end,
                reason: "end precedes start".into(),
            });
        }
        Ok(Self { start, end })
    }

    /// `[day - radius, day + radius]`, saturating at the ends of the calendar.
    #[must_use]
    pub fn around(day: NaiveDate, radius_days: i64) -> Self {
        let radius = Days::new(radius_days.unsigned_abs());
        Self {
            start: day.checked_sub_days(radius).unwrap_or(NaiveDate::MIN),
            end: day.checked_add_days(radius).unwrap_or(NaiveDate::MAX),
        }
    }

    /// A single-day window.
    #[must_use]
    pub const fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// Number of days covered, inclusive.
    #[must_use]
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Whether the two windows share a day or are directly adjacent.
    #[must_use]
    pub fn overlaps_or_touches(&self, other: &Self) -> bool {
        let after = |day: NaiveDate| day.succ_opt().unwrap_or(NaiveDate::MAX);
        self.start <= after(other.end) && other.start <= after(self.end)
    }

    /// Smallest window covering both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Intersect with `[lo, hi]`. `None` when nothing is left.
    #[must_use]
    pub fn clamp(&self, lo: NaiveDate, hi: NaiveDate) -> Option<Self> {
        let start = self.start.max(lo);
        let end = self.end.min(hi);
        (start <= end).then_some(Self { start, end })
    }

    /// Iterate every day in the window in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
