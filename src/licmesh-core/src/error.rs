//! Error types for license validation operations.

use thiserror::Error;

/// Errors that can occur while building license values or running the
/// validation machinery.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// A checksum was constructed with empty text.
    #[error("Checksum text must not be empty")]
    EmptyChecksumText,

    /// An instant field was set to the minimum or maximum representable
    /// value, which are reserved as sentinels.
    #[error("{field} must not be the minimum or maximum representable instant")]
    SentinelInstant {
        /// Which field carried the sentinel value.
        field: &'static str,
    },

    /// A validity window ends before it starts.
    #[error("Validity window is inverted: expires {expires} precedes generated {generated}")]
    InvertedWindow {
        /// Start of the window (RFC 3339).
        generated: String,
        /// End of the window (RFC 3339).
        expires: String,
    },

    /// A time period was constructed with a zero modifier.
    #[error("TimePeriod modifier must be at least 1")]
    ZeroPeriodModifier,

    /// The real validator reported an internal fault (distinct from a
    /// negative validation outcome).
    #[error("Validator fault: {reason}")]
    ValidatorFault {
        /// What went wrong inside the validator.
        reason: String,
    },

    /// A cache's internal lock was poisoned by a panic on another thread.
    #[error("Cache state poisoned")]
    StatePoisoned,

    /// The validation service was started without any sequences to track.
    #[error("Cannot validate without at least one validation sequence")]
    EmptySequenceSet,

    /// The is-alive probe reported the host as unhealthy.
    #[error("Host liveness probe failed: {reason}")]
    ProbeFailed {
        /// Why the probe rejected the host.
        reason: String,
    },

    /// Every due sequence in a single watchdog tick failed verification.
    #[error("All {processed} due sequences failed verification ({failures} failures)")]
    AllSequencesFailed {
        /// Number of sequences processed in the tick.
        processed: usize,
        /// Number of failures recorded in the tick.
        failures: usize,
    },

    /// The service already escalated to the fatal phase and cannot tick.
    #[error("Validation service has halted")]
    ServiceHalted,
}

impl LicenseError {
    /// Check if this error is terminal for the hosting process.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StatePoisoned
                | Self::EmptySequenceSet
                | Self::ProbeFailed { .. }
                | Self::AllSequencesFailed { .. }
                | Self::ServiceHalted
        )
    }

    /// Check if this error rejects an invalid value at construction time.
    #[must_use]
    pub fn is_invalid_value(&self) -> bool {
        matches!(
            self,
            Self::EmptyChecksumText
                | Self::SentinelInstant { .. }
                | Self::InvertedWindow { .. }
                | Self::ZeroPeriodModifier
        )
    }
}
