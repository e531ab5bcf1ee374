//! Certificate-generation workflow
//!
//! Validates the request, allocates a number, writes it into the
//! transaction's certificate metadata and audits the change. The ledger's
//! attach step is the uniqueness check: a number already attached within
//! the entity is rejected there and regenerated a bounded number of times.

use crate::config::{IssuerSettings, NumberingStrategy, SecadConfig};
use crate::error::{IssueError, RegistryError};
use crate::ledger::InMemoryTransactionLedger;
use crate::types::{CertificateMetadata, Transaction, TransactionId};
use secad_audit::{AuditContext, AuditLogger};
use secad_certificate::{
    Allocation, AllocationError, AllocationResponse, CertificateLedger,
    CertificateNumberAllocator, CertificateNumberConfig, InMemorySequenceCounter,
    SequenceCounter,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Audit table name for transaction rows
pub const TRANSACTIONS_TABLE: &str = "transactions";

/// Request to number one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    /// Transaction receiving the certificate
    pub transaction_id: TransactionId,
    /// Numbering configuration; `entity_id` must match the transaction
    pub config: CertificateNumberConfig,
    /// Requesting user
    #[serde(default)]
    pub user_id: Option<String>,
}

impl IssueRequest {
    /// Create request
    #[inline]
    #[must_use]
    pub fn new(transaction_id: TransactionId, config: CertificateNumberConfig) -> Self {
        Self {
            transaction_id,
            config,
            user_id: None,
        }
    }

    /// With requesting user
    #[inline]
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Outcome of a successful issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCertificate {
    /// Numbered transaction
    pub transaction_id: TransactionId,
    /// Number written into its metadata
    pub allocation: Allocation,
    /// Whether a collision had to be resolved first
    pub resolved_conflict: bool,
}

/// Issues certificate numbers into ledger transactions
pub struct CertificateIssuer {
    ledger: Arc<InMemoryTransactionLedger>,
    allocator: CertificateNumberAllocator,
    audit: AuditLogger,
    counter: Arc<dyn SequenceCounter>,
    settings: IssuerSettings,
}

impl std::fmt::Debug for CertificateIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateIssuer")
            .field("ledger_rows", &self.ledger.len())
            .field("allocator", &self.allocator)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CertificateIssuer {
    /// Create issuer whose allocator scans `ledger`
    #[must_use]
    pub fn new(
        ledger: Arc<InMemoryTransactionLedger>,
        audit: AuditLogger,
        config: &SecadConfig,
    ) -> Self {
        let scan: Arc<dyn CertificateLedger> = ledger.clone();
        let allocator = CertificateNumberAllocator::with_settings(scan, config.allocator.clone());
        Self::with_allocator(ledger, allocator, audit, config.issuer.clone())
    }

    /// Create issuer around an existing allocator
    #[must_use]
    pub fn with_allocator(
        ledger: Arc<InMemoryTransactionLedger>,
        allocator: CertificateNumberAllocator,
        audit: AuditLogger,
        settings: IssuerSettings,
    ) -> Self {
        Self {
            ledger,
            allocator,
            audit,
            counter: Arc::new(InMemorySequenceCounter::new()),
            settings,
        }
    }

    /// With a shared sequence counter for [`NumberingStrategy::Counter`]
    #[inline]
    #[must_use]
    pub fn with_counter(mut self, counter: Arc<dyn SequenceCounter>) -> Self {
        self.counter = counter;
        self
    }

    /// Underlying allocator
    #[inline]
    #[must_use]
    pub fn allocator(&self) -> &CertificateNumberAllocator {
        &self.allocator
    }

    /// Ledger being numbered
    #[inline]
    #[must_use]
    pub fn ledger(&self) -> &Arc<InMemoryTransactionLedger> {
        &self.ledger
    }

    /// Workflow settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &IssuerSettings {
        &self.settings
    }

    /// Number a transaction
    ///
    /// The request budget covers lookup, allocation and the attach. The
    /// audit write happens after the number is stored and is not bounded by
    /// it; a slow or failing audit sink is logged and never fails the call.
    ///
    /// # Errors
    /// - `IssueError::InvalidConfig` before anything is read
    /// - `IssueError::TransactionNotFound`, `EntityMismatch`, `AlreadyCertified`
    /// - `IssueError::Allocation` on store failures or unresolved collisions
    /// - `IssueError::Timeout` when the budget runs out before the attach
    pub async fn issue(&self, request: IssueRequest) -> Result<IssuedCertificate, IssueError> {
        let validation = CertificateNumberAllocator::validate_config(&request.config);
        if !validation.valid {
            tracing::debug!(errors = ?validation.errors, "rejected certificate configuration");
            return Err(IssueError::InvalidConfig(validation.errors));
        }

        let budget = self.settings.request_timeout();
        let bounded = tokio::time::timeout(budget, self.attach_within_budget(&request)).await;
        let attached = match bounded {
            Ok(result) => result?,
            Err(_) => {
                tracing::error!(
                    transaction = %request.transaction_id,
                    timeout_ms = self.settings.request_timeout_ms,
                    "certificate generation timed out"
                );
                return Err(IssueError::Timeout {
                    timeout_ms: self.settings.request_timeout_ms,
                });
            }
        };

        self.audit_attach(&attached).await;
        let issued = attached.issued;
        tracing::info!(
            transaction = %issued.transaction_id,
            entity = %issued.allocation.entity_id,
            number = %issued.allocation.certificate_number,
            "issued certificate"
        );
        Ok(issued)
    }

    /// Number a transaction and wrap the outcome for a JSON response
    ///
    /// Failures carry [`IssueError::user_message`], never internal detail.
    pub async fn issue_response(&self, request: IssueRequest) -> AllocationResponse {
        match self.issue(request).await {
            Ok(issued) => AllocationResponse {
                success: true,
                data: Some(issued.allocation),
                error: None,
            },
            Err(e) => AllocationResponse {
                success: false,
                data: None,
                error: Some(e.user_message()),
            },
        }
    }

    async fn attach_within_budget(&self, request: &IssueRequest) -> Result<Attached, IssueError> {
        let id = request.transaction_id;
        let config = &request.config;
        let user = request.user_id.as_deref();

        let tx = self.ledger.get(id).ok_or(IssueError::TransactionNotFound(id))?;
        check_issuable(&tx, config)?;

        let retries = self.allocator.settings().max_conflict_retries;
        let mut allocation = self.allocate(config, user).await?;
        let mut attempt = 0;

        loop {
            let metadata = CertificateMetadata::from_allocation(&allocation);
            match self.ledger.attach_certificate(id, metadata) {
                Ok((before, after)) => {
                    return Ok(Attached {
                        issued: IssuedCertificate {
                            transaction_id: id,
                            allocation,
                            resolved_conflict: attempt > 0,
                        },
                        before,
                        after,
                    });
                }
                Err(RegistryError::DuplicateCertificateNumber { number, .. })
                    if attempt < retries =>
                {
                    attempt += 1;
                    tracing::warn!(
                        transaction = %id,
                        %number,
                        attempt,
                        "certificate number already issued"
                    );
                    allocation = self.reallocate(config, user).await?;
                }
                Err(RegistryError::DuplicateCertificateNumber { number, .. }) => {
                    tracing::error!(
                        transaction = %id,
                        %number,
                        attempts = retries,
                        "certificate conflict unresolved"
                    );
                    let exhausted = AllocationError::ConflictRetriesExhausted { attempts: retries };
                    return Err(exhausted.into());
                }
                Err(RegistryError::AlreadyCertified { transaction, number }) => {
                    return Err(IssueError::AlreadyCertified { transaction, number });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn allocate(
        &self,
        config: &CertificateNumberConfig,
        user: Option<&str>,
    ) -> Result<Allocation, AllocationError> {
        match self.settings.numbering {
            NumberingStrategy::LedgerScan => {
                self.allocator.generate_certificate_number(config, user).await
            }
            NumberingStrategy::Counter => {
                self.allocator
                    .allocate_from_counter(config, self.counter.as_ref(), user)
                    .await
            }
        }
    }

    /// One regeneration per rejected attach, so the loop above bounds the
    /// total number of scans at the configured retry count.
    async fn reallocate(
        &self,
        config: &CertificateNumberConfig,
        user: Option<&str>,
    ) -> Result<Allocation, AllocationError> {
        if self.settings.numbering == NumberingStrategy::LedgerScan {
            self.allocator.clear_cache(Some(&config.entity_id), Some(config.year));
        }
        // The counter never repeats a value, so drawing again moves past it
        self.allocate(config, user).await
    }

    async fn audit_attach(&self, attached: &Attached) {
        let Attached { issued, before, after } = attached;
        let context = AuditContext::new(
            issued.allocation.generated_by.as_str(),
            TRANSACTIONS_TABLE,
            after.id.to_string(),
        )
        .with_entity(after.entity_id.as_str());

        if let Err(e) = self.audit.log_update(&context, before, after).await {
            tracing::warn!(transaction = %after.id, "failed to write audit entry: {}", e);
        }
    }
}

/// A stored number together with the row before and after the attach
struct Attached {
    issued: IssuedCertificate,
    before: Transaction,
    after: Transaction,
}

fn check_issuable(tx: &Transaction, config: &CertificateNumberConfig) -> Result<(), IssueError> {
    if tx.entity_id.as_str() != config.entity_id {
        return Err(IssueError::EntityMismatch {
            transaction: tx.id,
            expected: config.entity_id.clone(),
            actual: tx.entity_id.to_string(),
        });
    }
    if let Some(existing) = tx.certificate() {
        return Err(IssueError::AlreadyCertified {
            transaction: tx.id,
            number: existing.certificate_number.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionType;
    use secad_audit::MemoryAuditLog;
    use secad_certificate::SYSTEM_USER;

    fn setup() -> (Arc<InMemoryTransactionLedger>, Arc<MemoryAuditLog>, CertificateIssuer) {
        let ledger = Arc::new(InMemoryTransactionLedger::new());
        let log = Arc::new(MemoryAuditLog::new());
        let issuer = CertificateIssuer::new(
            ledger.clone(),
            AuditLogger::new(log.clone()),
            &SecadConfig::default(),
        );
        (ledger, log, issuer)
    }

    fn record_issue(
        ledger: &InMemoryTransactionLedger,
        entity: &str,
        member: &str,
    ) -> TransactionId {
        ledger
            .record(
                Transaction::new(entity, "ord", TransactionType::Issue)
                    .to_member(member)
                    .with_quantity(10),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn issues_sequential_numbers() {
        let (ledger, log, issuer) = setup();
        let t1 = record_issue(&ledger, "acme", "a");
        let t2 = record_issue(&ledger, "acme", "b");

        let config = CertificateNumberConfig::new("acme", 2024);
        let first = issuer
            .issue(IssueRequest::new(t1, config).with_user("alice"))
            .await
            .unwrap();
        let second = issuer
            .issue(IssueRequest::new(t2, CertificateNumberConfig::new("acme", 2024)))
            .await
            .unwrap();

        assert_eq!(first.allocation.certificate_number, "2024-0001");
        assert_eq!(first.allocation.generated_by, "alice");
        assert_eq!(second.allocation.certificate_number, "2024-0002");
        assert!(!second.resolved_conflict);

        let stored = ledger.get(t1).unwrap();
        assert_eq!(stored.certificate().unwrap().certificate_number, "2024-0001");
        assert_eq!(stored.certificate().unwrap().issued_by, "alice");

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].user_id, "alice");
        assert_eq!(entries[1].user_id, SYSTEM_USER);
        assert!(entries[0].change_for("metadata").is_some());
        log.verify_integrity().unwrap();
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_lookup() {
        let (_, log, issuer) = setup();
        let request = IssueRequest::new(
            TransactionId::new(),
            CertificateNumberConfig::new("", 1800).with_format("{SEQUENTIAL_NUMBER}"),
        );

        let err = issuer.issue(request).await.unwrap_err();
        match err {
            IssueError::InvalidConfig(errors) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn transaction_checks() {
        let (ledger, _, issuer) = setup();
        let id = record_issue(&ledger, "acme", "a");

        let unknown = TransactionId::new();
        let missing = issuer
            .issue(IssueRequest::new(unknown, CertificateNumberConfig::new("acme", 2024)))
            .await
            .unwrap_err();
        assert!(matches!(missing, IssueError::TransactionNotFound(_)));

        let mismatch = issuer
            .issue(IssueRequest::new(id, CertificateNumberConfig::new("other", 2024)))
            .await
            .unwrap_err();
        assert!(matches!(mismatch, IssueError::EntityMismatch { .. }));

        issuer
            .issue(IssueRequest::new(id, CertificateNumberConfig::new("acme", 2024)))
            .await
            .unwrap();
        let again = issuer
            .issue(IssueRequest::new(id, CertificateNumberConfig::new("acme", 2024)))
            .await
            .unwrap_err();
        assert!(matches!(again, IssueError::AlreadyCertified { .. }));
        assert_eq!(again.status_code(), 409);
    }

    #[tokio::test]
    async fn response_hides_internal_detail() {
        let (ledger, _, issuer) = setup();
        let id = record_issue(&ledger, "acme", "a");

        let ok = issuer
            .issue_response(IssueRequest::new(id, CertificateNumberConfig::new("acme", 2024)))
            .await;
        assert!(ok.success);
        assert_eq!(ok.data.unwrap().certificate_number, "2024-0001");

        let failed = issuer
            .issue_response(IssueRequest::new(id, CertificateNumberConfig::new("", 2024)))
            .await;
        assert!(!failed.success);
        assert!(failed.error.unwrap().contains("Entity ID is required"));
    }
}
