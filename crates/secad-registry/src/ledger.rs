//! In-memory transaction ledger
//!
//! Holds the transaction rows the allocator scans. Certificate numbers live
//! only in transaction metadata; [`InMemoryTransactionLedger::attach_certificate`]
//! refuses a number already attached elsewhere in the same entity, which is
//! how concurrent duplicate allocations surface to the workflow.

use crate::error::RegistryError;
use crate::holdings::Holdings;
use crate::types::{CertificateMetadata, EntityId, Transaction, TransactionId};
use crate::validation::validate_transaction;
use async_trait::async_trait;
use parking_lot::RwLock;
use secad_certificate::{CertificateLedger, LedgerError};
use std::path::Path;

/// Transaction store backed by a vector in creation order
#[derive(Debug, Default)]
pub struct InMemoryTransactionLedger {
    transactions: RwLock<Vec<Transaction>>,
}

impl InMemoryTransactionLedger {
    /// Create empty ledger
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Import existing rows without validation
    #[must_use]
    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: RwLock::new(transactions),
        }
    }

    /// Load rows from a JSON array file
    ///
    /// # Errors
    /// IO or JSON failures.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RegistryError::io_error(path, e))?;
        let transactions: Vec<Transaction> = serde_json::from_slice(&bytes)?;
        tracing::debug!(path = %path.display(), count = transactions.len(), "loaded ledger");
        Ok(Self::from_transactions(transactions))
    }

    /// Write rows to a JSON array file
    ///
    /// # Errors
    /// IO or JSON failures.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), RegistryError> {
        let path = path.as_ref();
        let bytes = serde_json::to_vec_pretty(&*self.transactions.read())?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| RegistryError::io_error(path, e))
    }

    /// Validate against the entity's current holdings and append
    ///
    /// # Errors
    /// `RegistryError::Validation` listing every violation.
    pub fn record(&self, tx: Transaction) -> Result<TransactionId, RegistryError> {
        let mut guard = self.transactions.write();
        let holdings = Holdings::from_transactions(
            guard.iter().filter(|t| t.entity_id == tx.entity_id),
        );
        validate_transaction(&tx, &holdings)?;

        let id = tx.id;
        tracing::debug!(
            transaction = %id,
            kind = %tx.transaction_type,
            entity = %tx.entity_id,
            "recording transaction"
        );
        guard.push(tx);
        Ok(id)
    }

    /// Fetch one row
    #[must_use]
    pub fn get(&self, id: TransactionId) -> Option<Transaction> {
        self.transactions.read().iter().find(|t| t.id == id).cloned()
    }

    /// Replace a row, returning the previous version
    ///
    /// Not validated: edits can invalidate holdings and certificate history.
    ///
    /// # Errors
    /// `RegistryError::TransactionNotFound`.
    pub fn update(&self, tx: Transaction) -> Result<Transaction, RegistryError> {
        let mut guard = self.transactions.write();
        let slot = guard
            .iter_mut()
            .find(|t| t.id == tx.id)
            .ok_or(RegistryError::TransactionNotFound(tx.id))?;
        Ok(std::mem::replace(slot, tx))
    }

    /// Delete a row, returning it
    ///
    /// # Errors
    /// `RegistryError::TransactionNotFound`.
    pub fn remove(&self, id: TransactionId) -> Result<Transaction, RegistryError> {
        let mut guard = self.transactions.write();
        let index = guard
            .iter()
            .position(|t| t.id == id)
            .ok_or(RegistryError::TransactionNotFound(id))?;
        Ok(guard.remove(index))
    }

    /// Rows of one entity in creation order
    #[must_use]
    pub fn list_for_entity(&self, entity_id: &EntityId) -> Vec<Transaction> {
        self.transactions
            .read()
            .iter()
            .filter(|t| &t.entity_id == entity_id)
            .cloned()
            .collect()
    }

    /// Holdings of one entity
    #[must_use]
    pub fn holdings(&self, entity_id: &EntityId) -> Holdings {
        Holdings::from_transactions(
            self.transactions
                .read()
                .iter()
                .filter(|t| &t.entity_id == entity_id),
        )
    }

    /// Whether `number` is attached to any row of the entity
    #[must_use]
    pub fn certificate_number_exists(&self, entity_id: &str, number: &str) -> bool {
        self.transactions
            .read()
            .iter()
            .any(|t| has_number(t, entity_id, number))
    }

    /// Attach certificate metadata, returning the row before and after
    ///
    /// # Errors
    /// - `RegistryError::TransactionNotFound`
    /// - `RegistryError::AlreadyCertified` if the row already has a number
    /// - `RegistryError::DuplicateCertificateNumber` if another row of the
    ///   entity carries the same number
    pub fn attach_certificate(
        &self,
        id: TransactionId,
        certificate: CertificateMetadata,
    ) -> Result<(Transaction, Transaction), RegistryError> {
        let mut guard = self.transactions.write();
        let index = guard
            .iter()
            .position(|t| t.id == id)
            .ok_or(RegistryError::TransactionNotFound(id))?;

        if let Some(existing) = guard[index].certificate() {
            return Err(RegistryError::AlreadyCertified {
                transaction: id,
                number: existing.certificate_number.clone(),
            });
        }

        let entity = guard[index].entity_id.as_str().to_string();
        if guard
            .iter()
            .any(|t| has_number(t, &entity, &certificate.certificate_number))
        {
            return Err(RegistryError::DuplicateCertificateNumber {
                entity,
                number: certificate.certificate_number,
            });
        }

        let before = guard[index].clone();
        guard[index].metadata.certificate = Some(certificate);
        Ok((before, guard[index].clone()))
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    /// Whether the ledger is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transactions.read().is_empty()
    }
}

fn has_number(tx: &Transaction, entity_id: &str, number: &str) -> bool {
    tx.entity_id.as_str() == entity_id
        && tx
            .certificate()
            .is_some_and(|c| c.certificate_number == number)
}

#[async_trait]
impl CertificateLedger for InMemoryTransactionLedger {
    async fn latest_certificate_number(
        &self,
        entity_id: &str,
        year: i32,
    ) -> Result<Option<String>, LedgerError> {
        let guard = self.transactions.read();
        let latest = guard
            .iter()
            .filter(|t| t.entity_id.as_str() == entity_id)
            .filter_map(Transaction::certificate)
            .filter(|c| c.year == year)
            .max_by_key(|c| (c.issued_at, c.sequence))
            .map(|c| c.certificate_number.clone());
        Ok(latest)
    }

    async fn highest_sequence(
        &self,
        entity_id: &str,
        year: i32,
    ) -> Result<Option<u64>, LedgerError> {
        Ok(self
            .transactions
            .read()
            .iter()
            .filter(|t| t.entity_id.as_str() == entity_id)
            .filter_map(Transaction::certificate)
            .filter(|c| c.year == year)
            .map(|c| c.sequence)
            .max())
    }
}
