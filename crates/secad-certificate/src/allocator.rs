//! Certificate number allocator
//!
//! Produces the next number for an (entity, year) by scanning the ledger for
//! the latest issued number, recovering its sequence and adding one.
//!
//! The scan and the caller's later write are not one atomic step, so two
//! concurrent requests can be handed the same number. Callers that detect a
//! collision use [`CertificateNumberAllocator::resolve_conflict`];
//! [`CertificateNumberAllocator::allocate_from_counter`] avoids the race by
//! taking sequences from a [`SequenceCounter`] instead.

use crate::cache::{CacheStats, CachedNumber, CertificateCache};
use crate::counter::SequenceCounter;
use crate::error::{AllocationError, AllocationResult, LedgerError};
use crate::format;
use crate::ledger::CertificateLedger;
use crate::settings::AllocatorSettings;
use crate::types::{Allocation, CertificateKey, CertificateNumberConfig};
use crate::validation::{self, ConfigValidation};
use std::sync::Arc;

/// Recorded as `generated_by` when no user is supplied
pub const SYSTEM_USER: &str = "system";

/// Certificate number allocator
pub struct CertificateNumberAllocator {
    ledger: Arc<dyn CertificateLedger>,
    cache: CertificateCache,
    settings: AllocatorSettings,
}

impl std::fmt::Debug for CertificateNumberAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateNumberAllocator")
            .field("cache", &self.cache)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CertificateNumberAllocator {
    /// Create allocator with default settings
    #[must_use]
    pub fn new(ledger: Arc<dyn CertificateLedger>) -> Self {
        Self::with_settings(ledger, AllocatorSettings::default())
    }

    /// Create allocator with explicit settings
    #[must_use]
    pub fn with_settings(ledger: Arc<dyn CertificateLedger>, settings: AllocatorSettings) -> Self {
        Self {
            ledger,
            cache: settings.build_cache(),
            settings,
        }
    }

    /// Active settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &AllocatorSettings {
        &self.settings
    }

    /// Check an allocation config; see [`validation::validate_config`]
    #[inline]
    #[must_use]
    pub fn validate_config(config: &CertificateNumberConfig) -> ConfigValidation {
        validation::validate_config(config)
    }

    /// Produce the next certificate number for `config`
    ///
    /// Does not validate `config` and does not persist anything; the caller
    /// writes the number into the transaction's certificate metadata.
    ///
    /// # Errors
    /// - `AllocationError::Store` if the ledger lookup fails
    pub async fn generate_certificate_number(
        &self,
        config: &CertificateNumberConfig,
        user_id: Option<&str>,
    ) -> AllocationResult<Allocation> {
        let last = match self.last_issued_sequence(config).await {
            Ok(last) => last,
            Err(e) => {
                tracing::error!(
                    entity = %config.entity_id,
                    year = config.year,
                    "certificate lookup failed: {}",
                    e
                );
                return Err(e.into());
            }
        };

        let sequence = last.map_or(1, |s| s.saturating_add(1));
        let allocation = self.finish(config, sequence, user_id);
        tracing::info!(
            entity = %allocation.entity_id,
            year = allocation.year,
            number = %allocation.certificate_number,
            "generated certificate number"
        );
        Ok(allocation)
    }

    /// Sequence of the latest number in the ledger for `config`, if any
    ///
    /// # Errors
    /// Propagates ledger failures.
    pub async fn last_issued_sequence(
        &self,
        config: &CertificateNumberConfig,
    ) -> Result<Option<u64>, LedgerError> {
        let latest = self
            .ledger
            .latest_certificate_number(&config.entity_id, config.year)
            .await?;

        Ok(latest.map(|number| {
            let sequence = format::recover_sequence(
                &number,
                self.format_for(config),
                config.year,
                config.prefix.as_deref(),
                config.suffix.as_deref(),
            );
            tracing::debug!(%number, sequence, "recovered sequence from ledger");
            sequence
        }))
    }

    /// Regenerate after a caller-detected collision, using the default format
    ///
    /// # Errors
    /// - `AllocationError::ConflictRetriesExhausted` if every attempt yields
    ///   `conflicting_number`
    /// - `AllocationError::Store` on the first ledger failure
    pub async fn resolve_conflict(
        &self,
        entity_id: &str,
        year: i32,
        conflicting_number: &str,
        user_id: Option<&str>,
    ) -> AllocationResult<Allocation> {
        let config = CertificateNumberConfig::new(entity_id, year);
        self.resolve_conflict_with(&config, conflicting_number, user_id)
            .await
    }

    /// Regenerate after a caller-detected collision for an explicit config
    ///
    /// Each attempt drops the cached entry and rescans the ledger. This
    /// narrows the collision window; it does not close it.
    ///
    /// # Errors
    /// See [`Self::resolve_conflict`].
    pub async fn resolve_conflict_with(
        &self,
        config: &CertificateNumberConfig,
        conflicting_number: &str,
        user_id: Option<&str>,
    ) -> AllocationResult<Allocation> {
        let key = config.key();
        let attempts = self.settings.max_conflict_retries;

        for attempt in 1..=attempts {
            self.cache.invalidate(&key);
            let allocation = self.generate_certificate_number(config, user_id).await?;
            if allocation.certificate_number != conflicting_number {
                tracing::info!(
                    %key,
                    attempt,
                    number = %allocation.certificate_number,
                    "resolved certificate conflict"
                );
                return Ok(allocation);
            }
            tracing::warn!(
                %key,
                attempt,
                number = conflicting_number,
                "certificate number still conflicts"
            );
        }

        tracing::error!(%key, attempts, "certificate conflict unresolved");
        Err(AllocationError::ConflictRetriesExhausted { attempts })
    }

    /// Produce the next number from a dedicated counter
    ///
    /// A key the counter has never seen is first seeded from the ledger scan
    /// so numbering continues from what was already issued.
    ///
    /// # Errors
    /// - `AllocationError::Store` if the ledger or counter fails
    pub async fn allocate_from_counter(
        &self,
        config: &CertificateNumberConfig,
        counter: &dyn SequenceCounter,
        user_id: Option<&str>,
    ) -> AllocationResult<Allocation> {
        let key = config.key();

        if counter.current(&key).await?.is_none() {
            let issued = match self
                .ledger
                .highest_sequence(&config.entity_id, config.year)
                .await?
            {
                Some(sequence) => sequence,
                None => self.last_issued_sequence(config).await?.unwrap_or(0),
            };
            tracing::debug!(%key, issued, "seeding sequence counter");
            counter.seed(&key, issued).await?;
        }

        let sequence = counter.next_sequence(&key).await?;
        let allocation = self.finish(config, sequence, user_id);
        tracing::info!(
            %key,
            number = %allocation.certificate_number,
            "allocated certificate number from counter"
        );
        Ok(allocation)
    }

    /// Clear cached numbers
    ///
    /// - neither argument: everything
    /// - entity only: every year of that entity
    /// - year only: that year across entities
    /// - both: that single entry
    pub fn clear_cache(&self, entity_id: Option<&str>, year: Option<i32>) {
        match (entity_id, year) {
            (Some(entity_id), Some(year)) => {
                self.cache.invalidate(&CertificateKey::new(entity_id, year));
            }
            (Some(entity_id), None) => self.cache.invalidate_entity(entity_id),
            (None, Some(year)) => self.cache.invalidate_year(year),
            (None, None) => self.cache.invalidate_all(),
        }
    }

    /// Cache statistics
    #[inline]
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Last number this process issued for a key
    #[inline]
    #[must_use]
    pub fn cached(&self, key: &CertificateKey) -> Option<CachedNumber> {
        self.cache.get(key)
    }

    fn format_for<'a>(&'a self, config: &'a CertificateNumberConfig) -> &'a str {
        config.format_or(&self.settings.default_format)
    }

    fn finish(
        &self,
        config: &CertificateNumberConfig,
        sequence: u64,
        user_id: Option<&str>,
    ) -> Allocation {
        let certificate_number = format::render(
            self.format_for(config),
            config.year,
            sequence,
            config.prefix.as_deref(),
            config.suffix.as_deref(),
        );

        self.cache.insert(
            config.key(),
            CachedNumber::now(certificate_number.clone(), sequence),
        );

        Allocation {
            certificate_number,
            year: config.year,
            sequence,
            entity_id: config.entity_id.clone(),
            generated_by: user_id.unwrap_or(SYSTEM_USER).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::InMemorySequenceCounter;
    use crate::ledger::MockCertificateLedger;
    use pretty_assertions::assert_eq;

    fn ledger_returning(latest: Option<&'static str>) -> Arc<dyn CertificateLedger> {
        let mut ledger = MockCertificateLedger::new();
        ledger
            .expect_latest_certificate_number()
            .returning(move |_, _| Ok(latest.map(str::to_string)));
        Arc::new(ledger)
    }

    #[tokio::test]
    async fn first_allocation_uses_default_format() {
        let allocator = CertificateNumberAllocator::new(ledger_returning(None));
        let config = CertificateNumberConfig::new("ent-1", 2024);

        let allocation = allocator
            .generate_certificate_number(&config, None)
            .await
            .unwrap();

        assert_eq!(
            allocation,
            Allocation {
                certificate_number: "2024-0001".to_string(),
                year: 2024,
                sequence: 1,
                entity_id: "ent-1".to_string(),
                generated_by: "system".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn custom_format_with_prefix() {
        let allocator = CertificateNumberAllocator::new(ledger_returning(None));
        let config = CertificateNumberConfig::new("ent-1", 2024)
            .with_format("CERT-{YEAR}-{SEQUENTIAL_NUMBER}")
            .with_prefix("CUSTOM");

        let allocation = allocator
            .generate_certificate_number(&config, Some("user-7"))
            .await
            .unwrap();

        assert_eq!(allocation.certificate_number, "CUSTOM-CERT-2024-0001");
        assert_eq!(allocation.generated_by, "user-7");
    }

    #[tokio::test]
    async fn increments_existing_number() {
        let allocator = CertificateNumberAllocator::new(ledger_returning(Some("2024-0001")));
        let config = CertificateNumberConfig::new("ent-1", 2024);

        let allocation = allocator
            .generate_certificate_number(&config, None)
            .await
            .unwrap();

        assert_eq!(allocation.sequence, 2);
        assert_eq!(allocation.certificate_number, "2024-0002");
    }

    #[tokio::test]
    async fn years_are_isolated() {
        let mut ledger = MockCertificateLedger::new();
        ledger
            .expect_latest_certificate_number()
            .returning(|_, year| Ok((year == 2024).then(|| "2024-0041".to_string())));
        let allocator = CertificateNumberAllocator::new(Arc::new(ledger));

        let a = allocator
            .generate_certificate_number(&CertificateNumberConfig::new("e", 2024), None)
            .await
            .unwrap();
        let b = allocator
            .generate_certificate_number(&CertificateNumberConfig::new("e", 2025), None)
            .await
            .unwrap();

        assert_eq!(a.sequence, 42);
        assert_eq!(b.sequence, 1);
        assert_eq!(b.certificate_number, "2025-0001");
    }

    #[tokio::test]
    async fn unparseable_latest_number_degrades_to_fallback() {
        let allocator = CertificateNumberAllocator::new(ledger_returning(Some("UNKNOWN-FORMAT")));
        let config = CertificateNumberConfig::new("e", 2024);

        let allocation = allocator
            .generate_certificate_number(&config, None)
            .await
            .unwrap();

        assert_eq!(allocation.sequence, 2);
    }

    #[tokio::test]
    async fn custom_suffix_continues_numbering() {
        let allocator = CertificateNumberAllocator::new(ledger_returning(Some("2024-0009-B")));
        let config = CertificateNumberConfig::new("e", 2024).with_suffix("B");

        let allocation = allocator
            .generate_certificate_number(&config, None)
            .await
            .unwrap();

        assert_eq!(allocation.certificate_number, "2024-0010-B");
    }

    #[tokio::test]
    async fn settings_default_format_applies() {
        let settings = AllocatorSettings::new().with_default_format("{SEQUENTIAL_NUMBER}/{YEAR}");
        let allocator = CertificateNumberAllocator::with_settings(
            ledger_returning(Some("0003/2024")),
            settings,
        );

        let allocation = allocator
            .generate_certificate_number(&CertificateNumberConfig::new("e", 2024), None)
            .await
            .unwrap();

        assert_eq!(allocation.certificate_number, "0004/2024");
    }

    #[tokio::test]
    async fn store_failure_is_returned_not_thrown() {
        let mut ledger = MockCertificateLedger::new();
        ledger
            .expect_latest_certificate_number()
            .returning(|_, _| Err(LedgerError::Unavailable("connection refused".to_string())));
        let allocator = CertificateNumberAllocator::new(Arc::new(ledger));

        let err = allocator
            .generate_certificate_number(&CertificateNumberConfig::new("e", 2024), None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AllocationError::Store("ledger unavailable: connection refused".to_string())
        );
        assert_eq!(allocator.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn allocation_is_cached() {
        let allocator = CertificateNumberAllocator::new(ledger_returning(None));
        let config = CertificateNumberConfig::new("e", 2024);
        allocator.generate_certificate_number(&config, None).await.unwrap();

        let cached = allocator.cached(&config.key()).unwrap();
        assert_eq!(cached.certificate_number, "2024-0001");
        assert_eq!(allocator.cache_stats().entries, 1);
    }

    #[tokio::test]
    async fn clear_cache_scopes() {
        let allocator = CertificateNumberAllocator::new(ledger_returning(None));
        for (entity, year) in [("A", 2024), ("A", 2025), ("B", 2024)] {
            allocator
                .generate_certificate_number(&CertificateNumberConfig::new(entity, year), None)
                .await
                .unwrap();
        }
        assert_eq!(allocator.cache_stats().entries, 3);

        allocator.clear_cache(Some("A"), None);
        assert!(allocator.cached(&CertificateKey::new("A", 2024)).is_none());
        assert!(allocator.cached(&CertificateKey::new("A", 2025)).is_none());
        assert!(allocator.cached(&CertificateKey::new("B", 2024)).is_some());

        allocator.clear_cache(None, None);
        let stats = allocator.cache_stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.size, 0);
    }

    #[tokio::test]
    async fn clear_cache_single_entry() {
        let allocator = CertificateNumberAllocator::new(ledger_returning(None));
        for year in [2024, 2025] {
            allocator
                .generate_certificate_number(&CertificateNumberConfig::new("A", year), None)
                .await
                .unwrap();
        }

        allocator.clear_cache(Some("A"), Some(2024));
        assert!(allocator.cached(&CertificateKey::new("A", 2024)).is_none());
        assert!(allocator.cached(&CertificateKey::new("A", 2025)).is_some());
    }

    #[tokio::test]
    async fn conflict_exhausts_after_retry_bound() {
        let mut ledger = MockCertificateLedger::new();
        ledger
            .expect_latest_certificate_number()
            .times(3)
            .returning(|_, _| Ok(Some("2024-0001".to_string())));
        let allocator = CertificateNumberAllocator::new(Arc::new(ledger));

        let err = allocator
            .resolve_conflict("e", 2024, "2024-0002", None)
            .await
            .unwrap_err();

        assert_eq!(err, AllocationError::ConflictRetriesExhausted { attempts: 3 });
    }

    #[tokio::test]
    async fn conflict_resolves_once_ledger_moves() {
        let mut ledger = MockCertificateLedger::new();
        let mut seq = mockall::Sequence::new();
        ledger
            .expect_latest_certificate_number()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Some("2024-0001".to_string())));
        ledger
            .expect_latest_certificate_number()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Some("2024-0002".to_string())));
        let allocator = CertificateNumberAllocator::new(Arc::new(ledger));

        let allocation = allocator
            .resolve_conflict("e", 2024, "2024-0002", Some("u"))
            .await
            .unwrap();

        assert_eq!(allocation.certificate_number, "2024-0003");
    }

    #[tokio::test]
    async fn conflict_propagates_store_failure() {
        let mut ledger = MockCertificateLedger::new();
        ledger
            .expect_latest_certificate_number()
            .times(1)
            .returning(|_, _| Err(LedgerError::Query("deadlock".to_string())));
        let allocator = CertificateNumberAllocator::new(Arc::new(ledger));

        let err = allocator
            .resolve_conflict("e", 2024, "2024-0001", None)
            .await
            .unwrap_err();
        assert!(err.is_store_failure());
    }

    #[tokio::test]
    async fn counter_allocation_seeds_from_ledger_once() {
        let mut ledger = MockCertificateLedger::new();
        ledger
            .expect_latest_certificate_number()
            .times(1)
            .returning(|_, _| Ok(Some("2024-0005".to_string())));
        ledger
            .expect_highest_sequence()
            .times(1)
            .returning(|_, _| Ok(None));
        let allocator = CertificateNumberAllocator::new(Arc::new(ledger));
        let counter = InMemorySequenceCounter::new();
        let config = CertificateNumberConfig::new("e", 2024);

        let first = allocator
            .allocate_from_counter(&config, &counter, None)
            .await
            .unwrap();
        let second = allocator
            .allocate_from_counter(&config, &counter, None)
            .await
            .unwrap();

        assert_eq!(first.certificate_number, "2024-0006");
        assert_eq!(second.certificate_number, "2024-0007");
    }

    #[tokio::test]
    async fn counter_prefers_typed_sequence() {
        let mut ledger = MockCertificateLedger::new();
        ledger
            .expect_highest_sequence()
            .times(1)
            .returning(|_, _| Ok(Some(41)));
        ledger.expect_latest_certificate_number().never();
        let allocator = CertificateNumberAllocator::new(Arc::new(ledger));
        let counter = InMemorySequenceCounter::new();

        let allocation = allocator
            .allocate_from_counter(&CertificateNumberConfig::new("e", 2024), &counter, None)
            .await
            .unwrap();
        assert_eq!(allocation.certificate_number, "2024-0042");
        assert_eq!(allocation.sequence, 42);
    }
}
