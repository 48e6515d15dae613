//! Bridges the watchdog to the cache.
//!
//! [`CacheVerifier`] decides whether the cached result can be reported
//! as-is or the cache must revalidate first: a result generated in the
//! future beyond a small tolerance is treated as clock corruption, an
//! expired result triggers a consensus pass, and every verification that
//! completes reports exactly one checksum triple through the
//! [`ResultSink`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::LicenseCache;
use crate::checksum::Checksum;
use crate::clock::Clock;
use crate::config;
use crate::error::LicenseError;
use crate::period::TimePeriod;

/// Receives every confirmed validation outcome.
pub trait ResultSink: Send + Sync {
    /// Accept a confirmed outcome together with the window it covers.
    fn on_result(&self, checksum: &Checksum, generated: DateTime<Utc>, expires: DateTime<Utc>);
}

/// The verification surface the watchdog drives.
pub trait Verifier: Send + Sync {
    /// Verify at the standard hourly cadence.
    ///
    /// # Errors
    ///
    /// Returns an error only on an unrecoverable cache fault.
    fn verify(&self) -> Result<(), LicenseError>;

    /// Verify, treating a revalidated result as good for the given cadence.
    ///
    /// # Errors
    ///
    /// Returns an error only on an unrecoverable cache fault.
    fn verify_for(&self, next_expiration: &TimePeriod) -> Result<(), LicenseError>;
}

/// [`Verifier`] over a boundary's cache.
pub struct CacheVerifier {
    cache: Arc<dyn LicenseCache>,
    sink: Arc<dyn ResultSink>,
    clock: Arc<dyn Clock>,
}

impl CacheVerifier {
    /// Wire a cache to a result sink.
    pub fn new(
        cache: Arc<dyn LicenseCache>,
        sink: Arc<dyn ResultSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { cache, sink, clock }
    }

    fn synthesize_failure(&self, next_expiration: &TimePeriod) -> Result<(), LicenseError> {
        let generated = self.clock.now();
        let expires = generated
            .checked_add_signed(next_expiration.repeat_after(generated))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let checksum = Checksum::failure(generated, expires)?;
        self.sink.on_result(&checksum, generated, expires);
        Ok(())
    }
}

impl Verifier for CacheVerifier {
    fn verify(&self) -> Result<(), LicenseError> {
        self.verify_for(&TimePeriod::hourly())
    }

    fn verify_for(&self, next_expiration: &TimePeriod) -> Result<(), LicenseError> {
        let latest = self.cache.latest_result();
        let now = self.clock.now();

        // A result generated ahead of "now" beyond the tolerance means the
        // clock moved or the result was tampered with. The cache fault on
        // this path is the one error this adapter lets escape.
        let horizon = now
            .checked_add_signed(config::clock_skew_tolerance())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if latest.generated() > horizon {
            tracing::warn!(
                generated = %latest.generated(),
                %now,
                "result generated in the future, revalidating"
            );
            self.cache.invalidate(next_expiration)?;
            return self.synthesize_failure(next_expiration);
        }

        if latest.is_expired_at(now) {
            tracing::debug!(expires = %latest.expires(), %now, "result expired, revalidating");
            if let Err(error) = self.cache.invalidate(next_expiration) {
                tracing::error!(error = %error, "revalidation failed, reporting failure");
                return self.synthesize_failure(next_expiration);
            }
        }

        let latest = self.cache.latest_result();
        self.sink
            .on_result(latest.checksum(), latest.generated(), latest.expires());
        Ok(())
    }
}

/// One outcome captured by a [`ResultStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResult {
    /// The checksum in effect for the window.
    pub checksum: Checksum,
    /// When the outcome was generated.
    pub generated: DateTime<Utc>,
    /// When the outcome stops being valid.
    pub expires: DateTime<Utc>,
}

impl StoredResult {
    /// Whether the stored checksum is a failure fingerprint over its window.
    #[must_use]
    pub fn reports_failure(&self) -> bool {
        Checksum::failure(self.generated, self.expires)
            .map(|expected| expected == self.checksum)
            .unwrap_or(false)
    }
}

/// In-memory [`ResultSink`] retaining the most recent outcome.
#[derive(Default)]
pub struct ResultStore {
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    latest: Option<StoredResult>,
    reports: usize,
}

impl ResultStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently reported outcome.
    #[must_use]
    pub fn latest(&self) -> Option<StoredResult> {
        self.state
            .lock()
            .map(|state| state.latest.clone())
            .unwrap_or(None)
    }

    /// Number of outcomes reported so far.
    #[must_use]
    pub fn report_count(&self) -> usize {
        self.state.lock().map(|state| state.reports).unwrap_or(0)
    }
}

impl ResultSink for ResultStore {
    fn on_result(&self, checksum: &Checksum, generated: DateTime<Utc>, expires: DateTime<Utc>) {
        if let Ok(mut state) = self.state.lock() {
            state.reports += 1;
            state.latest = Some(StoredResult {
                checksum: checksum.clone(),
                generated,
                expires,
            });
        }
    }
}
