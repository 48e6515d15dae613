//! Configuration and fixed protocol numbers.

use serde::{Deserialize, Serialize};

use crate::period::TimePeriod;

/// Default interval between watchdog ticks.
pub const DEFAULT_WATCHDOG_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

/// Validity window granted to a cache's optimistic bootstrap result.
///
/// A freshly-started boundary reports success for this long (or until its
/// first invalidation) so mesh members can bootstrap from each other.
#[must_use]
pub fn bootstrap_validity_window() -> chrono::Duration {
    chrono::Duration::minutes(5)
}

/// How far a result's generation instant may sit ahead of the current time
/// before the adapter treats it as clock-skew corruption.
#[must_use]
pub fn clock_skew_tolerance() -> chrono::Duration {
    chrono::Duration::seconds(1)
}

/// Host-tunable validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Interval between watchdog ticks.
    pub watchdog_interval: std::time::Duration,

    /// Cadence used when building the standard sequence set.
    pub standard_cadence: TimePeriod,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            standard_cadence: TimePeriod::hourly(),
        }
    }
}
