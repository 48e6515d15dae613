//! Recurrence rules with calendar-correct repeat arithmetic.
//!
//! A [`TimePeriod`] is a recurrence unit plus a positive multiplier. The
//! hour/day-based units repeat after a fixed duration; the Monthly and
//! Yearly units follow the calendar, so the duration until the next
//! occurrence depends on which months (and leap days) the span crosses.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LicenseError;

/// The base unit of a recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepeatUnit {
    /// Every hour.
    Hourly,
    /// Every day.
    Daily,
    /// Every seven days.
    Weekly,
    /// Every fourteen days.
    Fortnightly,
    /// Every calendar month (28-31 days depending on the months spanned).
    Monthly,
    /// Every calendar year (365 or 366 days depending on leap days spanned).
    Yearly,
}

/// A recurrence rule: a unit repeated `modifier` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimePeriod {
    unit: RepeatUnit,
    modifier: u8,
}

impl TimePeriod {
    /// Build a rule that repeats after exactly one unit.
    #[must_use]
    pub const fn new(unit: RepeatUnit) -> Self {
        Self { unit, modifier: 1 }
    }

    /// Build a rule that repeats after `modifier` units.
    ///
    /// # Errors
    ///
    /// Returns an error if `modifier` is zero.
    pub fn with_modifier(unit: RepeatUnit, modifier: u8) -> Result<Self, LicenseError> {
        if modifier == 0 {
            return Err(LicenseError::ZeroPeriodModifier);
        }
        Ok(Self { unit, modifier })
    }

    /// The standard hourly cadence.
    #[must_use]
    pub const fn hourly() -> Self {
        Self::new(RepeatUnit::Hourly)
    }

    /// The recurrence unit.
    #[must_use]
    pub const fn unit(&self) -> RepeatUnit {
        self.unit
    }

    /// How many units elapse between occurrences.
    #[must_use]
    pub const fn modifier(&self) -> u8 {
        self.modifier
    }

    /// Duration from `start` until the next occurrence of this rule.
    ///
    /// Hourly through Fortnightly yield a fixed duration independent of
    /// `start`. Monthly and Yearly follow the calendar: the target day of
    /// month is clamped when the destination month is shorter, and leap
    /// days lengthen the spans that cross them.
    #[must_use]
    pub fn repeat_after(&self, start: DateTime<Utc>) -> Duration {
        let modifier = i64::from(self.modifier);
        match self.unit {
            RepeatUnit::Hourly => Duration::hours(modifier),
            RepeatUnit::Daily => Duration::days(modifier),
            RepeatUnit::Weekly => Duration::weeks(modifier),
            RepeatUnit::Fortnightly => Duration::weeks(2 * modifier),
            RepeatUnit::Monthly => calendar_distance(start, u32::from(self.modifier)),
            RepeatUnit::Yearly => calendar_distance(start, 12 * u32::from(self.modifier)),
        }
    }
}

/// Distance from `start` to `start` plus the given number of calendar
/// months. Saturates at the maximum representable instant if the addition
/// would leave the supported date range.
fn calendar_distance(start: DateTime<Utc>, months: u32) -> Duration {
    let next = start
        .checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    next - start
}
