//! The per-boundary validation cache and its consensus algorithm.
//!
//! Each isolation boundary owns one [`ValidationCache`]. The cache holds
//! the boundary's latest [`LicenseCheckResult`] plus a list of peer proxies
//! exchanged through the mesh, and decides on [`invalidate`] whether to
//! trust the peer consensus or consult the real [`Validator`]:
//!
//! ```text
//!   invalidate(period)
//!        |
//!        v
//!   snapshot peers ──── <= 1 peer ───────────> failure (isolated)
//!        |
//!        v
//!   scan peers ──────── any peer failed ─────> failure (propagated)
//!        |
//!        v
//!   possibility = min(|best_generated - now| / desired_span, 1)
//!        |
//!        +── draw <  possibility ──> real validator ──> success/failure
//!        +── draw >= possibility ──> trust peers ─────> success
//! ```
//!
//! The further the best-matching peer's generation time lies from "now"
//! relative to the requested cadence, the more likely the cache is to pay
//! for a real validation instead of trusting its peers.
//!
//! [`invalidate`]: ValidationCache::invalidate

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::checksum::{Checksum, LicenseCheckResult};
use crate::clock::{Clock, RandomSource};
use crate::config;
use crate::error::LicenseError;
use crate::period::TimePeriod;

/// The real, possibly slow or remote license check.
pub trait Validator: Send + Sync {
    /// Check whether the license is currently valid.
    ///
    /// # Errors
    ///
    /// Returns an error on an internal fault, as opposed to `Ok(false)`
    /// for a legitimate negative outcome. The cache absorbs faults into
    /// failure results.
    fn validate(&self) -> Result<bool, LicenseError>;
}

/// A read-only view of a cache's latest result.
///
/// Proxies are what peers exchange through the mesh: handed out by
/// [`ValidationCache::create_proxy`], held in other boundaries' peer lists,
/// and recomputed on demand from the owning cache. The trait keeps the
/// consensus algorithm transport-agnostic; a remote deployment implements
/// it over its own RPC.
pub trait CacheProxy: Send + Sync {
    /// The owning cache's latest result.
    fn latest_result(&self) -> LicenseCheckResult;
}

/// The cache surface the verifier drives.
pub trait LicenseCache: Send + Sync {
    /// The latest validation result.
    fn latest_result(&self) -> LicenseCheckResult;

    /// Recompute the latest result for the given revalidation cadence.
    ///
    /// # Errors
    ///
    /// Returns an error on an internal cache fault; legitimate negative
    /// outcomes are absorbed into the replacement result instead.
    fn invalidate(&self, next_expiration: &TimePeriod) -> Result<(), LicenseError>;
}

struct CacheState {
    latest: LicenseCheckResult,
    peers: Vec<Arc<dyn CacheProxy>>,
}

struct CacheShared {
    state: Mutex<CacheState>,
    validator: Arc<dyn Validator>,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
}

/// One isolation boundary's license-validity cache.
///
/// Cloning yields another handle to the same cache.
#[derive(Clone)]
pub struct ValidationCache {
    shared: Arc<CacheShared>,
}

impl ValidationCache {
    /// Build a cache with an optimistic bootstrap result.
    ///
    /// The fresh cache reports success for the bootstrap window starting
    /// at "now", and holds a proxy to itself as its first peer.
    ///
    /// # Errors
    ///
    /// Returns an error if the clock yields an instant the bootstrap
    /// result cannot be built from.
    pub fn new(
        validator: Arc<dyn Validator>,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, LicenseError> {
        let now = clock.now();
        let expires = window_end(now, config::bootstrap_validity_window());
        let checksum = Checksum::success(now, expires)?;
        let latest = LicenseCheckResult::new(now, expires, checksum)?;

        let cache = Self {
            shared: Arc::new(CacheShared {
                state: Mutex::new(CacheState {
                    latest,
                    peers: Vec::new(),
                }),
                validator,
                clock,
                random,
            }),
        };

        // Our own proxy comes first so the consensus never depends
        // entirely on remote peers.
        cache.store(cache.create_proxy());
        Ok(cache)
    }

    /// Hand out a read-only proxy to this cache.
    #[must_use]
    pub fn create_proxy(&self) -> Arc<dyn CacheProxy> {
        Arc::new(LocalProxy {
            shared: Arc::clone(&self.shared),
        })
    }

    /// The latest validation result.
    #[must_use]
    pub fn latest_result(&self) -> LicenseCheckResult {
        match self.shared.state.lock() {
            Ok(state) => state.latest.clone(),
            Err(poisoned) => poisoned.into_inner().latest.clone(),
        }
    }

    /// When the latest result was generated.
    #[must_use]
    pub fn last_validation_time(&self) -> DateTime<Utc> {
        self.latest_result().generated()
    }

    /// Number of peer proxies currently held, including our own.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        match self.shared.state.lock() {
            Ok(state) => state.peers.len(),
            Err(poisoned) => poisoned.into_inner().peers.len(),
        }
    }

    /// Add a peer proxy.
    ///
    /// Duplicates are tolerated; the mesh endpoint coordinates uniqueness
    /// per boundary.
    pub fn store(&self, proxy: Arc<dyn CacheProxy>) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.peers.push(proxy);
            tracing::debug!(peers = state.peers.len(), "stored peer proxy");
        }
    }

    /// Remove a peer proxy by handle identity. No-op if absent.
    pub fn release(&self, proxy: &Arc<dyn CacheProxy>) {
        if let Ok(mut state) = self.shared.state.lock() {
            if let Some(index) = state
                .peers
                .iter()
                .position(|held| Arc::ptr_eq(held, proxy))
            {
                state.peers.remove(index);
                tracing::debug!(peers = state.peers.len(), "released peer proxy");
            }
        }
    }

    /// Recompute the latest result for the given revalidation cadence.
    ///
    /// Snapshots the peer list, then decides outside the lock: an isolated
    /// cache fails outright; a failing peer fails the whole group; otherwise
    /// a random draw against the computed validation possibility picks
    /// between consulting the real validator and trusting the peers. A
    /// validator fault is absorbed into a failure result, never returned.
    ///
    /// # Errors
    ///
    /// Returns an error only if the cache's internal state is poisoned or
    /// the replacement result cannot be constructed.
    pub fn invalidate(&self, next_expiration: &TimePeriod) -> Result<(), LicenseError> {
        let peers = {
            let state = self
                .shared
                .state
                .lock()
                .map_err(|_| LicenseError::StatePoisoned)?;
            state.peers.clone()
        };

        let now = self.shared.clock.now();
        let desired_span = next_expiration.repeat_after(now);

        if peers.len() <= 1 {
            tracing::debug!(peers = peers.len(), "isolated cache, failing validation");
            return self.replace_latest(failure_result(now, desired_span)?);
        }

        let desired_ms = desired_span.num_milliseconds();
        let mut best_generated = now;
        let mut best_diff = desired_ms;
        for peer in &peers {
            let peer_result = peer.latest_result();

            // One failing peer fails the whole group.
            if peer_result.reports_failure() {
                tracing::warn!(
                    generated = %peer_result.generated(),
                    "peer reports validation failure, propagating"
                );
                return self.replace_latest(failure_result(now, desired_span)?);
            }

            // Track the peer whose validity span sits closest to the
            // requested cadence. Only spans strictly closer than the
            // cadence itself take over; with no such peer the best-match
            // generation time stays at "now".
            let span_ms = peer_result.validity_span().num_milliseconds();
            let diff = (span_ms - desired_ms).abs();
            if diff < best_diff {
                best_generated = peer_result.generated();
                best_diff = diff;
            }
        }

        let offset_ms = (best_generated - now).num_milliseconds().abs();
        let possibility = if desired_ms == 0 {
            1.0
        } else {
            (offset_ms as f64 / desired_ms as f64).min(1.0)
        };

        let sample = self.shared.random.next_f64();
        if sample < possibility {
            let result = match self.shared.validator.validate() {
                Ok(true) => {
                    tracing::debug!(%possibility, %sample, "validator confirmed the license");
                    success_result(now, desired_span)?
                }
                Ok(false) => {
                    tracing::warn!(%possibility, %sample, "validator rejected the license");
                    failure_result(now, desired_span)?
                }
                Err(error) => {
                    tracing::warn!(error = %error, "validator fault treated as failure");
                    failure_result(now, desired_span)?
                }
            };
            self.replace_latest(result)
        } else {
            tracing::debug!(%possibility, %sample, "trusting peer consensus");
            self.replace_latest(success_result(now, desired_span)?)
        }
    }

    fn replace_latest(&self, result: LicenseCheckResult) -> Result<(), LicenseError> {
        let mut state = self
            .shared
            .state
            .lock()
            .map_err(|_| LicenseError::StatePoisoned)?;
        state.latest = result;
        Ok(())
    }
}

impl LicenseCache for ValidationCache {
    fn latest_result(&self) -> LicenseCheckResult {
        ValidationCache::latest_result(self)
    }

    fn invalidate(&self, next_expiration: &TimePeriod) -> Result<(), LicenseError> {
        ValidationCache::invalidate(self, next_expiration)
    }
}

struct LocalProxy {
    shared: Arc<CacheShared>,
}

impl CacheProxy for LocalProxy {
    fn latest_result(&self) -> LicenseCheckResult {
        match self.shared.state.lock() {
            Ok(state) => state.latest.clone(),
            Err(poisoned) => poisoned.into_inner().latest.clone(),
        }
    }
}

fn window_end(now: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    now.checked_add_signed(span)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn success_result(
    now: DateTime<Utc>,
    span: Duration,
) -> Result<LicenseCheckResult, LicenseError> {
    let expires = window_end(now, span);
    LicenseCheckResult::new(now, expires, Checksum::success(now, expires)?)
}

fn failure_result(
    now: DateTime<Utc>,
    span: Duration,
) -> Result<LicenseCheckResult, LicenseError> {
    let expires = window_end(now, span);
    LicenseCheckResult::new(now, expires, Checksum::failure(now, expires)?)
}
