//! Last-issued certificate number cache using moka
//!
//! Process-local memo of the most recent allocation per (entity, year).
//! Entries never expire unless a TTL is configured; they are dropped
//! explicitly through the scoped invalidation methods.

use crate::types::CertificateKey;
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default maximum number of cached keys
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// Cached value for one sequence key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedNumber {
    /// Last rendered number
    pub certificate_number: String,
    /// Sequence it was rendered from
    pub sequence: u64,
    /// When the allocation was cached
    pub captured_at: DateTime<Utc>,
}

impl CachedNumber {
    /// Capture a number now
    #[inline]
    #[must_use]
    pub fn now(certificate_number: impl Into<String>, sequence: u64) -> Self {
        Self {
            certificate_number: certificate_number.into(),
            sequence,
            captured_at: Utc::now(),
        }
    }
}

/// Cache introspection for tests and diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries counted by the cache after pending maintenance
    pub size: u64,
    /// Entries currently visible to lookups
    pub entries: u64,
}

/// Cache of last-issued numbers keyed by (entity, year)
#[derive(Debug, Clone)]
pub struct CertificateCache {
    inner: Cache<CertificateKey, CachedNumber>,
}

impl CertificateCache {
    /// Create cache with max capacity and no expiry
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Create cache with time-based expiration
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Record the latest number for a key
    #[inline]
    pub fn insert(&self, key: CertificateKey, value: CachedNumber) {
        tracing::debug!(%key, number = %value.certificate_number, "caching certificate number");
        self.inner.insert(key, value);
    }

    /// Last number cached for a key
    #[inline]
    #[must_use]
    pub fn get(&self, key: &CertificateKey) -> Option<CachedNumber> {
        self.inner.get(key)
    }

    /// Drop one (entity, year) entry
    #[inline]
    pub fn invalidate(&self, key: &CertificateKey) {
        self.inner.invalidate(key);
    }

    /// Drop every year cached for an entity
    pub fn invalidate_entity(&self, entity_id: &str) {
        self.invalidate_matching(|key| key.entity_id == entity_id);
    }

    /// Drop one year across every entity
    pub fn invalidate_year(&self, year: i32) {
        self.invalidate_matching(|key| key.year == year);
    }

    /// Drop everything
    pub fn invalidate_all(&self) {
        self.invalidate_matching(|_| true);
    }

    fn invalidate_matching(&self, predicate: impl Fn(&CertificateKey) -> bool) {
        let doomed: Vec<_> = self
            .inner
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(key, _)| key)
            .collect();

        for key in doomed {
            self.inner.invalidate(key.as_ref());
        }
        self.inner.run_pending_tasks();
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks();
        CacheStats {
            size: self.inner.entry_count(),
            entries: self.inner.iter().count() as u64,
        }
    }
}

impl Default for CertificateCache {
    /// Create cache with default capacity (10,000 entries)
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
