//! # licmesh-core
//!
//! Distributed license-validity caching for hosts that run several
//! isolated execution contexts at once. Each boundary owns a cache with
//! the latest validation result; a fully-connected mesh exchanges
//! read-only proxies between boundaries, and a probabilistic consensus
//! pass decides when a cache may trust its peers and when it must pay
//! for a real license check.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    ValidationService                     │
//! │        (watchdog: due sequences, Fatal escalation)       │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │ verify_for(period)
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                      CacheVerifier                       │
//! │        (skew + expiry checks, ResultSink reporting)      │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │ invalidate(period)
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ValidationCache                      │
//! │      (peer consensus, probabilistic revalidation)        │
//! │                                                          │
//! │  peers: CacheProxy ◄── CacheEndpoint ◄── CacheChannel    │
//! │                     (mesh fan-out across boundaries)     │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │ validate()
//!                              ▼
//!                 real Validator (host-provided)
//! ```
//!
//! ## Validation Properties
//!
//! - **Fail-closed**: an isolated cache can only produce failure results;
//!   trust requires peers.
//! - **Failure wins**: one failing peer fails the whole group on the next
//!   consensus pass.
//! - **Bounded validator load**: the random draw keeps real validator
//!   calls proportional to how stale the best peer result looks.
//! - **Terminal fatality**: a failed liveness probe or a tick where every
//!   due sequence fails halts the watchdog for good.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::pedantic)] // Too strict for production code
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type
#![allow(clippy::must_use_candidate)] // Not all functions need must_use

pub mod cache;
pub mod checksum;
pub mod clock;
pub mod config;
pub mod error;
pub mod mesh;
pub mod period;
pub mod sequence;
pub mod service;
pub mod verify;

pub use cache::{CacheProxy, LicenseCache, ValidationCache, Validator};
pub use checksum::{Checksum, LicenseCheckResult, VALIDATION_FAILURE, VALIDATION_SUCCESS};
pub use clock::{Clock, FixedRandom, ManualClock, RandomSource, SystemClock, ThreadRandom};
pub use config::{ValidationConfig, DEFAULT_WATCHDOG_INTERVAL};
pub use error::LicenseError;
pub use mesh::{BoundaryId, CacheChannel, CacheEndpoint};
pub use period::{RepeatUnit, TimePeriod};
pub use sequence::{standard_sequences, ValidationSequence};
pub use service::{Probe, ServicePhase, ValidationService};
pub use verify::{CacheVerifier, ResultSink, ResultStore, StoredResult, Verifier};
