//! Allocator configuration

use crate::cache::{CertificateCache, DEFAULT_CACHE_CAPACITY};
use crate::format::DEFAULT_FORMAT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bound on conflict-resolution attempts
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Allocator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorSettings {
    /// Template used when a request carries no format
    pub default_format: String,
    /// Generation attempts made by conflict resolution
    pub max_conflict_retries: u32,
    /// Maximum cached (entity, year) keys
    pub cache_capacity: u64,
    /// Cache entry lifetime in milliseconds; `None` keeps entries until cleared
    pub cache_ttl_ms: Option<u64>,
}

impl AllocatorSettings {
    /// Create default settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With default template
    #[inline]
    #[must_use]
    pub fn with_default_format(mut self, format: impl Into<String>) -> Self {
        self.default_format = format.into();
        self
    }

    /// With conflict retry bound
    #[inline]
    #[must_use]
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// With cache entry lifetime, kept to millisecond precision
    #[inline]
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_ms = Some(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Cache entry lifetime
    #[inline]
    #[must_use]
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_ms.map(Duration::from_millis)
    }

    /// Build the cache these settings describe
    #[must_use]
    pub fn build_cache(&self) -> CertificateCache {
        match self.cache_ttl() {
            Some(ttl) => CertificateCache::with_ttl(self.cache_capacity, ttl),
            None => CertificateCache::new(self.cache_capacity),
        }
    }
}

impl Default for AllocatorSettings {
    fn default() -> Self {
        Self {
            default_format: DEFAULT_FORMAT.to_string(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl_ms: None,
        }
    }
}
