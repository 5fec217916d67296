//! DashMap Location Cache
//!
//! Implements LocationCache using DashMap for lock-free concurrent access.

use crate::domain::entities::LocationRecord;
use crate::domain::ports::LocationCache;
use crate::domain::value_objects::AuthorId;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Default freshness window for a resolved location.
pub const DEFAULT_LOCATION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// DashMap-backed location cache.
///
/// Unbounded and process-lifetime only. Stale records are never evicted;
/// `get` simply stops returning them once they reach the TTL.
pub struct DashMapLocationCache {
    entries: DashMap<AuthorId, LocationRecord>,
    ttl: Duration,
}

impl DashMapLocationCache {
    /// Create a cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for DashMapLocationCache {
    fn default() -> Self {
        Self::new(DEFAULT_LOCATION_TTL)
    }
}

impl LocationCache for DashMapLocationCache {
    fn get(&self, author: &AuthorId) -> Option<LocationRecord> {
        let now = Instant::now();
        self.entries
            .get(author)
            .filter(|e| e.value().is_fresh(self.ttl, now))
            .map(|e| e.value().clone())
    }

    fn put(&self, author: AuthorId, location: Option<String>) {
        self.entries.insert(author, LocationRecord::new(location));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
