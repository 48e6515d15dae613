//! Cross-boundary flows: channel fan-out feeding consensus, and the
//! watchdog observing a peer's failure through the mesh.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use licmesh_core::{
    standard_sequences, BoundaryId, CacheChannel, CacheEndpoint, CacheVerifier, Clock,
    FixedRandom, LicenseError, ManualClock, Probe, ResultStore, ServicePhase, TimePeriod,
    ValidationCache, ValidationService,
};

use crate::support::{instant, CountingValidator, Verdict};

struct AlwaysAlive;

impl Probe for AlwaysAlive {
    fn ping(&self, _now: DateTime<Utc>) -> Result<(), LicenseError> {
        Ok(())
    }
}

fn boundary(
    clock: &Arc<ManualClock>,
    verdict: Verdict,
    draw: f64,
) -> (ValidationCache, Arc<CacheEndpoint>, Arc<CountingValidator>) {
    let validator = CountingValidator::new(verdict);
    let clock: Arc<dyn Clock> = clock.clone();
    let cache =
        ValidationCache::new(validator.clone(), clock, Arc::new(FixedRandom::always(draw)))
            .unwrap();
    let endpoint = Arc::new(CacheEndpoint::new(cache.clone()));
    (cache, endpoint, validator)
}

#[test]
fn mesh_peers_feed_consensus() {
    let clock = Arc::new(ManualClock::new(instant(1_700_000_000)));
    let channel = CacheChannel::new();
    let mut caches = Vec::new();
    for _ in 0..4 {
        let (cache, endpoint, _) = boundary(&clock, Verdict::Valid, 0.0);
        channel.connect_to(BoundaryId::random(), endpoint);
        caches.push(cache);
    }

    for cache in &caches {
        assert_eq!(cache.peer_count(), 4, "own proxy plus three peers");
    }

    // Fresh mesh: the best match is this instant old, so the possibility
    // is 0 and even a zero draw trusts the peers.
    caches[3].invalidate(&TimePeriod::hourly()).unwrap();
    assert!(!caches[3].latest_result().reports_failure());
}

#[test]
fn failure_crosses_the_mesh_through_the_watchdog() {
    let start = instant(1_700_000_000);
    let clock = Arc::new(ManualClock::new(start));
    let (cache_a, endpoint_a, validator_a) = boundary(&clock, Verdict::Valid, 0.5);
    let (cache_b, endpoint_b, validator_b) = boundary(&clock, Verdict::Invalid, 0.0);

    let channel = CacheChannel::new();
    channel.connect_to(BoundaryId::random(), endpoint_a);
    channel.connect_to(BoundaryId::random(), endpoint_b);

    let store = Arc::new(ResultStore::new());
    let verifier = CacheVerifier::new(Arc::new(cache_a.clone()), store.clone(), clock.clone());
    let service = ValidationService::new(
        Arc::new(verifier),
        Arc::new(AlwaysAlive),
        clock.clone(),
        standard_sequences(start).unwrap(),
    );

    service.start_validation().unwrap();
    assert_eq!(store.report_count(), 1);
    assert!(!store.latest().unwrap().reports_failure());

    // Boundary B's result goes stale, its own consensus pass pays for a
    // real check, and the license is rejected.
    clock.advance(Duration::hours(2));
    cache_b.invalidate(&TimePeriod::hourly()).unwrap();
    assert!(cache_b.latest_result().reports_failure());
    assert_eq!(validator_b.calls(), 1);

    // A's next due verification finds its own result expired and adopts
    // the failure from B without ever calling A's validator.
    service.tick().unwrap();
    assert_eq!(service.phase(), ServicePhase::Scheduled);
    let reported = store.latest().unwrap();
    assert!(reported.reports_failure());
    assert_eq!(store.report_count(), 2);
    assert_eq!(validator_a.calls(), 0);
}

#[test]
fn departed_boundary_stops_influencing() {
    let start = instant(1_700_000_000);
    let clock = Arc::new(ManualClock::new(start));
    let (cache_a, endpoint_a, validator_a) = boundary(&clock, Verdict::Valid, 0.0);
    let (cache_b, endpoint_b, validator_b) = boundary(&clock, Verdict::Invalid, 0.0);
    let (_cache_c, endpoint_c, _) = boundary(&clock, Verdict::Valid, 0.5);

    let channel = CacheChannel::new();
    let id_b = BoundaryId::random();
    channel.connect_to(BoundaryId::random(), endpoint_a);
    channel.connect_to(id_b, endpoint_b);
    channel.connect_to(BoundaryId::random(), endpoint_c);
    assert_eq!(cache_a.peer_count(), 3);

    clock.advance(Duration::hours(2));
    cache_b.invalidate(&TimePeriod::hourly()).unwrap();
    assert!(cache_b.latest_result().reports_failure());
    assert_eq!(validator_b.calls(), 1);

    channel.disconnect_from(id_b);
    assert!(!channel.is_connected(id_b));
    assert_eq!(cache_a.peer_count(), 2, "B's proxy is gone from A");

    // With B out of the mesh its failure cannot spread; A's stale result
    // forces a real check, which passes.
    cache_a.invalidate(&TimePeriod::hourly()).unwrap();
    assert!(!cache_a.latest_result().reports_failure());
    assert_eq!(validator_a.calls(), 1);
}
