//! Testing utilities for secad workspace
//!
//! Shared fixtures: a small ledger history, imported certificates and a
//! wired-up issuer with an inspectable audit log.

#![allow(missing_docs)]

use chrono::{Duration, Utc};
use secad_audit::{AuditLogger, MemoryAuditLog};
use secad_certificate::CertificateNumberConfig;
use secad_registry::{
    CertificateIssuer, CertificateMetadata, InMemoryTransactionLedger, SecadConfig, Transaction,
    TransactionId, TransactionType,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const TEST_ENTITY: &str = "acme";
pub const TEST_CLASS: &str = "ord";
pub const TEST_YEAR: i32 = 2024;

/// Rows of the sample history, in recording order
#[derive(Debug, Clone, Copy)]
pub struct SampleIds {
    pub issue_alice: TransactionId,
    pub issue_bob: TransactionId,
    pub transfer: TransactionId,
}

pub fn issue_to(member: &str, quantity: u64) -> Transaction {
    Transaction::new(TEST_ENTITY, TEST_CLASS, TransactionType::Issue)
        .to_member(member)
        .with_quantity(quantity)
}

/// Alice and Bob are issued 100 and 50, then Alice transfers 10 to Bob
pub fn sample_ledger() -> (InMemoryTransactionLedger, SampleIds) {
    let ledger = InMemoryTransactionLedger::new();
    let issue_alice = ledger.record(issue_to("alice", 100)).unwrap();
    let issue_bob = ledger.record(issue_to("bob", 50)).unwrap();
    let transfer = ledger
        .record(
            Transaction::new(TEST_ENTITY, TEST_CLASS, TransactionType::Transfer)
                .from_member("alice")
                .to_member("bob")
                .with_quantity(10),
        )
        .unwrap();

    (
        ledger,
        SampleIds {
            issue_alice,
            issue_bob,
            transfer,
        },
    )
}

/// Save [`sample_ledger`] as `ledger.json` under `dir`
pub async fn write_sample_ledger(dir: &Path) -> (PathBuf, SampleIds) {
    let (ledger, ids) = sample_ledger();
    let path = dir.join("ledger.json");
    ledger.save(&path).await.unwrap();
    (path, ids)
}

/// Certificate as if imported from an earlier system, issued `age_secs` ago
pub fn imported_certificate(
    number: &str,
    year: i32,
    sequence: u64,
    age_secs: i64,
) -> CertificateMetadata {
    CertificateMetadata {
        certificate_number: number.to_string(),
        year,
        sequence,
        issued_at: Utc::now() - Duration::seconds(age_secs),
        issued_by: "import".to_string(),
    }
}

pub fn test_config() -> CertificateNumberConfig {
    CertificateNumberConfig::new(TEST_ENTITY, TEST_YEAR)
}

pub fn setup_test_issuer(
    ledger: Arc<InMemoryTransactionLedger>,
    config: &SecadConfig,
) -> (CertificateIssuer, Arc<MemoryAuditLog>) {
    let log = Arc::new(MemoryAuditLog::new());
    let issuer = CertificateIssuer::new(ledger, AuditLogger::new(log.clone()), config);
    (issuer, log)
}
