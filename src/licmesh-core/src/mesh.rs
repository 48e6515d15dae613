//! Peer discovery between isolation boundaries.
//!
//! One [`CacheEndpoint`] wraps each boundary's cache; a single
//! [`CacheChannel`] wires endpoints into a fully-connected mesh. Joining
//! fans out proxies both ways between the newcomer and every registered
//! boundary; leaving tears the same edges down. Proxy exchange is
//! in-process here, but nothing below the endpoint surface assumes it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::{CacheProxy, ValidationCache};

/// Identifier of one isolation boundary.
///
/// Identifiers are assumed stable for the lifetime of the boundary; the
/// channel treats a repeated connect under the same identifier as already
/// connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundaryId(Uuid);

impl BoundaryId {
    /// A fresh random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BoundaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The mesh-facing side of one boundary's cache.
///
/// Tracks which peer boundaries this cache already holds a proxy for, so
/// the channel's fan-out stays idempotent per boundary.
pub struct CacheEndpoint {
    cache: ValidationCache,
    known: Mutex<HashMap<BoundaryId, Arc<dyn CacheProxy>>>,
}

impl CacheEndpoint {
    /// Wrap a cache for mesh participation.
    #[must_use]
    pub fn new(cache: ValidationCache) -> Self {
        Self {
            cache,
            known: Mutex::new(HashMap::new()),
        }
    }

    /// A fresh proxy for the local cache, for handing to a peer.
    #[must_use]
    pub fn local_proxy(&self) -> Arc<dyn CacheProxy> {
        self.cache.create_proxy()
    }

    /// Record a peer's proxy in the local cache.
    ///
    /// Idempotent per boundary: the first proxy received for a given peer
    /// is kept, later ones for the same peer are dropped.
    pub fn connect(&self, peer: BoundaryId, proxy: Arc<dyn CacheProxy>) {
        if let Ok(mut known) = self.known.lock() {
            if known.contains_key(&peer) {
                tracing::debug!(%peer, "peer already connected, keeping first proxy");
                return;
            }
            self.cache.store(Arc::clone(&proxy));
            known.insert(peer, proxy);
        }
    }

    /// Drop a peer's proxy from the local cache. No-op if unknown.
    pub fn disconnect(&self, peer: BoundaryId) {
        if let Ok(mut known) = self.known.lock() {
            if let Some(stored) = known.remove(&peer) {
                self.cache.release(&stored);
                tracing::debug!(%peer, "peer disconnected");
            }
        }
    }

    /// Number of peer boundaries currently connected.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.known.lock().map(|known| known.len()).unwrap_or(0)
    }
}

/// Registry wiring endpoints into a fully-connected mesh.
///
/// One channel exists per deployment. Connecting boundary `n + 1` performs
/// an O(n) bidirectional proxy exchange with every registered boundary.
pub struct CacheChannel {
    endpoints: Mutex<HashMap<BoundaryId, Arc<CacheEndpoint>>>,
}

impl CacheChannel {
    /// An empty channel with no boundaries.
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    /// Join a boundary to the mesh. No-op if the identifier is already
    /// registered, even when the endpoint differs.
    pub fn connect_to(&self, boundary: BoundaryId, endpoint: Arc<CacheEndpoint>) {
        if let Ok(mut endpoints) = self.endpoints.lock() {
            if endpoints.contains_key(&boundary) {
                tracing::debug!(%boundary, "boundary already in the mesh");
                return;
            }
            for (existing_id, existing) in endpoints.iter() {
                existing.connect(boundary, endpoint.local_proxy());
                endpoint.connect(*existing_id, existing.local_proxy());
            }
            endpoints.insert(boundary, endpoint);
            tracing::info!(
                %boundary,
                boundaries = endpoints.len(),
                "boundary joined the mesh"
            );
        }
    }

    /// Remove a boundary from the mesh. No-op if unknown.
    ///
    /// Every surviving boundary drops the departing cache's proxy, and the
    /// departing endpoint drops every survivor's.
    pub fn disconnect_from(&self, boundary: BoundaryId) {
        if let Ok(mut endpoints) = self.endpoints.lock() {
            let Some(removed) = endpoints.remove(&boundary) else {
                tracing::debug!(%boundary, "boundary not in the mesh");
                return;
            };
            for (existing_id, existing) in endpoints.iter() {
                existing.disconnect(boundary);
                removed.disconnect(*existing_id);
            }
            tracing::info!(
                %boundary,
                boundaries = endpoints.len(),
                "boundary left the mesh"
            );
        }
    }

    /// Whether a boundary is currently registered.
    #[must_use]
    pub fn is_connected(&self, boundary: BoundaryId) -> bool {
        self.endpoints
            .lock()
            .map(|endpoints| endpoints.contains_key(&boundary))
            .unwrap_or(false)
    }

    /// Number of boundaries currently in the mesh.
    #[must_use]
    pub fn boundary_count(&self) -> usize {
        self.endpoints
            .lock()
            .map(|endpoints| endpoints.len())
            .unwrap_or(0)
    }
}

impl Default for CacheChannel {
    fn default() -> Self {
        Self::new()
    }
}
