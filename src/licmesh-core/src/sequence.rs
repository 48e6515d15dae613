//! Scheduled validation recurrences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LicenseError;
use crate::period::TimePeriod;

/// One scheduled recurrence of validation checks: the cadence to validate
/// at, and the next instant a check is due.
///
/// The scheduler treats these as consumable values: when a sequence's check
/// succeeds, the entry is replaced by a new sequence with an advanced due
/// instant rather than mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSequence {
    period: TimePeriod,
    next_due: DateTime<Utc>,
}

impl ValidationSequence {
    /// Build a sequence due at `next_due`.
    ///
    /// # Errors
    ///
    /// Returns an error if `next_due` is a sentinel instant.
    pub fn new(period: TimePeriod, next_due: DateTime<Utc>) -> Result<Self, LicenseError> {
        if next_due == DateTime::<Utc>::MIN_UTC || next_due == DateTime::<Utc>::MAX_UTC {
            return Err(LicenseError::SentinelInstant { field: "next_due" });
        }
        Ok(Self { period, next_due })
    }

    /// The cadence this sequence validates at.
    #[must_use]
    pub const fn period(&self) -> TimePeriod {
        self.period
    }

    /// The next instant a check is due.
    #[must_use]
    pub const fn next_due(&self) -> DateTime<Utc> {
        self.next_due
    }

    /// Whether a check is due at the given instant.
    #[must_use]
    pub fn is_due_at(&self, now: DateTime<Utc>) -> bool {
        self.next_due <= now
    }
}

/// The default scheduler workload for hosts that do not configure their
/// own: a single hourly sequence due immediately.
///
/// # Errors
///
/// Returns an error if `now` is a sentinel instant.
pub fn standard_sequences(now: DateTime<Utc>) -> Result<Vec<ValidationSequence>, LicenseError> {
    Ok(vec![ValidationSequence::new(TimePeriod::hourly(), now)?])
}
