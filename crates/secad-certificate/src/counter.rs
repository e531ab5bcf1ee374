//! Dedicated per-(entity, year) sequence counter
//!
//! Each increment-and-return happens under a single entry lock, so two
//! callers can never be handed the same sequence for a key.

use crate::error::LedgerError;
use crate::types::CertificateKey;
use async_trait::async_trait;
use dashmap::DashMap;

/// Atomic sequence store
///
/// # Invariants
/// - `next_sequence` returns strictly increasing values per key
/// - `seed` never lowers a counter
#[async_trait]
pub trait SequenceCounter: Send + Sync {
    /// Increment and return the sequence for `key`
    async fn next_sequence(&self, key: &CertificateKey) -> Result<u64, LedgerError>;

    /// Current value without incrementing; `None` if the key was never used
    async fn current(&self, key: &CertificateKey) -> Result<Option<u64>, LedgerError>;

    /// Raise the counter to at least `at_least`, returning the resulting value
    async fn seed(&self, key: &CertificateKey, at_least: u64) -> Result<u64, LedgerError>;
}

/// In-process counter backed by a sharded concurrent map
#[derive(Debug, Default)]
pub struct InMemorySequenceCounter {
    counters: DashMap<CertificateKey, u64>,
}

impl InMemorySequenceCounter {
    /// Create empty counter
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys tracked
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether no key has been used yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl SequenceCounter for InMemorySequenceCounter {
    async fn next_sequence(&self, key: &CertificateKey) -> Result<u64, LedgerError> {
        let mut entry = self.counters.entry(key.clone()).or_insert(0);
        let next = entry
            .checked_add(1)
            .ok_or_else(|| LedgerError::SequenceOverflow(key.to_string()))?;
        *entry = next;
        Ok(next)
    }

    async fn current(&self, key: &CertificateKey) -> Result<Option<u64>, LedgerError> {
        Ok(self.counters.get(key).map(|v| *v))
    }

    async fn seed(&self, key: &CertificateKey, at_least: u64) -> Result<u64, LedgerError> {
        let mut entry = self.counters.entry(key.clone()).or_insert(0);
        if *entry < at_least {
            *entry = at_least;
        }
        Ok(*entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn next_returns_increasing_values() {
        let counter = InMemorySequenceCounter::new();
        let key = CertificateKey::new("e", 2024);

        let mut prev = 0;
        for _ in 0..100 {
            let next = counter.next_sequence(&key).await.unwrap();
            assert!(next > prev, "expected {next} > {prev}");
            prev = next;
        }
        assert_eq!(counter.current(&key).await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let counter = InMemorySequenceCounter::new();
        let a = CertificateKey::new("e", 2024);
        let b = CertificateKey::new("e", 2025);

        counter.next_sequence(&a).await.unwrap();
        counter.next_sequence(&a).await.unwrap();
        assert_eq!(counter.next_sequence(&b).await.unwrap(), 1);
        assert_eq!(counter.len(), 2);
    }

    #[tokio::test]
    async fn seed_never_lowers() {
        let counter = InMemorySequenceCounter::new();
        let key = CertificateKey::new("e", 2024);

        assert_eq!(counter.current(&key).await.unwrap(), None);
        assert_eq!(counter.seed(&key, 10).await.unwrap(), 10);
        assert_eq!(counter.seed(&key, 4).await.unwrap(), 10);
        assert_eq!(counter.next_sequence(&key).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn overflow_is_an_error() {
        let counter = InMemorySequenceCounter::new();
        let key = CertificateKey::new("e", 2024);
        counter.seed(&key, u64::MAX).await.unwrap();

        let err = counter.next_sequence(&key).await.unwrap_err();
        assert!(matches!(err, LedgerError::SequenceOverflow(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_never_share_a_sequence() {
        let counter = Arc::new(InMemorySequenceCounter::new());
        let key = CertificateKey::new("e", 2024);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let counter = Arc::clone(&counter);
                let key = key.clone();
                tokio::spawn(async move {
                    let mut values = Vec::new();
                    for _ in 0..100 {
                        values.push(counter.next_sequence(&key).await.unwrap());
                    }
                    values
                })
            })
            .collect();

        let mut all: Vec<u64> = Vec::new();
        for handle in futures::future::join_all(handles).await {
            all.extend(handle.unwrap());
        }

        all.sort_unstable();
        let before = all.len();
        all.dedup();
        assert_eq!(all.len(), before, "found duplicate sequences");
        assert_eq!(all.len(), 1000);
    }
}
