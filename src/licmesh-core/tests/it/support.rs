//! Shared fixtures for the integration suite.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use licmesh_core::{CacheProxy, Checksum, LicenseCheckResult, LicenseError, Validator};

/// The verdict a [`CountingValidator`] hands out on every call.
#[derive(Clone, Copy)]
pub enum Verdict {
    Valid,
    Invalid,
    Fault,
}

/// Validator with a fixed verdict that records its invocation count.
pub struct CountingValidator {
    verdict: Verdict,
    calls: AtomicUsize,
}

impl CountingValidator {
    pub fn new(verdict: Verdict) -> Arc<Self> {
        Arc::new(Self {
            verdict,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Validator for CountingValidator {
    fn validate(&self) -> Result<bool, LicenseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.verdict {
            Verdict::Valid => Ok(true),
            Verdict::Invalid => Ok(false),
            Verdict::Fault => Err(LicenseError::ValidatorFault {
                reason: "fixture fault".to_string(),
            }),
        }
    }
}

/// Peer proxy frozen on a single result.
pub struct FrozenPeer {
    result: LicenseCheckResult,
}

impl CacheProxy for FrozenPeer {
    fn latest_result(&self) -> LicenseCheckResult {
        self.result.clone()
    }
}

pub fn instant(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap()
}

pub fn success_peer(generated: DateTime<Utc>, span: Duration) -> Arc<dyn CacheProxy> {
    let expires = generated + span;
    let checksum = Checksum::success(generated, expires).unwrap();
    Arc::new(FrozenPeer {
        result: LicenseCheckResult::new(generated, expires, checksum).unwrap(),
    })
}

pub fn failure_peer(generated: DateTime<Utc>, span: Duration) -> Arc<dyn CacheProxy> {
    let expires = generated + span;
    let checksum = Checksum::failure(generated, expires).unwrap();
    Arc::new(FrozenPeer {
        result: LicenseCheckResult::new(generated, expires, checksum).unwrap(),
    })
}
