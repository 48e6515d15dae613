//! Validation-outcome fingerprints and the immutable result snapshot.
//!
//! A [`Checksum`] tags a validation outcome (success or failure, encoded in
//! its text) with the time window it applies to. A [`LicenseCheckResult`]
//! pairs that checksum with the generation and expiration instants the
//! owning cache observed. Both are built fresh for every validation outcome
//! and never mutated.

use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::LicenseError;

/// Checksum text recorded for a successful validation.
pub const VALIDATION_SUCCESS: &str = "ValidationSuccess";

/// Checksum text recorded for a failed validation.
pub const VALIDATION_FAILURE: &str = "ValidationFailure";

/// Reject instants reserved as sentinel values.
fn check_instant(value: DateTime<Utc>, field: &'static str) -> Result<(), LicenseError> {
    if value == DateTime::<Utc>::MIN_UTC || value == DateTime::<Utc>::MAX_UTC {
        return Err(LicenseError::SentinelInstant { field });
    }
    Ok(())
}

/// An immutable fingerprint of a validation outcome.
///
/// Two checksums are equal exactly when their validation hashes are equal;
/// the hash is a SHA-256 digest over the text and both window instants,
/// rendered as lowercase hex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checksum {
    text: String,
    generated: DateTime<Utc>,
    expires: DateTime<Utc>,
    validation_hash: String,
}

impl Checksum {
    /// Build a checksum over the given outcome text and validity window.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` is empty, either instant is a sentinel
    /// value, or `expires` does not lie strictly after `generated`.
    pub fn new(
        text: impl Into<String>,
        generated: DateTime<Utc>,
        expires: DateTime<Utc>,
    ) -> Result<Self, LicenseError> {
        let text = text.into();
        if text.is_empty() {
            return Err(LicenseError::EmptyChecksumText);
        }
        check_instant(generated, "generated")?;
        check_instant(expires, "expires")?;
        if expires <= generated {
            return Err(LicenseError::InvertedWindow {
                generated: generated.to_rfc3339(),
                expires: expires.to_rfc3339(),
            });
        }

        let validation_hash = compute_hash(&text, generated, expires);
        Ok(Self {
            text,
            generated,
            expires,
            validation_hash,
        })
    }

    /// Build a success checksum for the given window.
    ///
    /// # Errors
    ///
    /// Returns an error if the window violates the checksum invariants.
    pub fn success(
        generated: DateTime<Utc>,
        expires: DateTime<Utc>,
    ) -> Result<Self, LicenseError> {
        Self::new(VALIDATION_SUCCESS, generated, expires)
    }

    /// Build a failure checksum for the given window.
    ///
    /// # Errors
    ///
    /// Returns an error if the window violates the checksum invariants.
    pub fn failure(
        generated: DateTime<Utc>,
        expires: DateTime<Utc>,
    ) -> Result<Self, LicenseError> {
        Self::new(VALIDATION_FAILURE, generated, expires)
    }

    /// The outcome text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Start of the window this checksum applies to.
    #[must_use]
    pub fn generated(&self) -> DateTime<Utc> {
        self.generated
    }

    /// End of the window this checksum applies to.
    #[must_use]
    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    /// The derived hash that defines checksum identity.
    #[must_use]
    pub fn validation_hash(&self) -> &str {
        &self.validation_hash
    }
}

impl PartialEq for Checksum {
    fn eq(&self, other: &Self) -> bool {
        self.validation_hash == other.validation_hash
    }
}

impl Eq for Checksum {}

impl Hash for Checksum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.validation_hash.hash(state);
    }
}

fn compute_hash(text: &str, generated: DateTime<Utc>, expires: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update([0u8]);
    hasher.update(generated.timestamp().to_le_bytes());
    hasher.update(generated.timestamp_subsec_nanos().to_le_bytes());
    hasher.update(expires.timestamp().to_le_bytes());
    hasher.update(expires.timestamp_subsec_nanos().to_le_bytes());
    hex::encode(hasher.finalize())
}

/// An immutable snapshot of one validation outcome: when it was generated,
/// when it lapses, and the checksum that was in effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseCheckResult {
    generated: DateTime<Utc>,
    expires: DateTime<Utc>,
    checksum: Checksum,
}

impl LicenseCheckResult {
    /// Build a result snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if either instant is a sentinel value or `expires`
    /// precedes `generated`.
    pub fn new(
        generated: DateTime<Utc>,
        expires: DateTime<Utc>,
        checksum: Checksum,
    ) -> Result<Self, LicenseError> {
        check_instant(generated, "generated")?;
        check_instant(expires, "expires")?;
        if expires < generated {
            return Err(LicenseError::InvertedWindow {
                generated: generated.to_rfc3339(),
                expires: expires.to_rfc3339(),
            });
        }

        Ok(Self {
            generated,
            expires,
            checksum,
        })
    }

    /// When this result was generated.
    #[must_use]
    pub fn generated(&self) -> DateTime<Utc> {
        self.generated
    }

    /// When this result lapses.
    #[must_use]
    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    /// The checksum in effect for this result.
    #[must_use]
    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// Length of this result's validity window.
    #[must_use]
    pub fn validity_span(&self) -> chrono::Duration {
        self.expires - self.generated
    }

    /// Whether this result has lapsed at the given instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires < now
    }

    /// Whether this result carries a failure checksum for its own window.
    ///
    /// Detection recomputes the failure checksum over this result's window
    /// and compares; a result whose window cannot form a valid checksum can
    /// never match and reports `false`.
    #[must_use]
    pub fn reports_failure(&self) -> bool {
        Checksum::failure(self.generated, self.expires)
            .map(|expected| expected == self.checksum)
            .unwrap_or(false)
    }
}
