//! Audit storage
//!
//! [`MemoryAuditLog`] is append-only and hash chained: every entry's hash
//! covers its content and the previous entry's hash, so editing or dropping
//! any stored entry is detected by [`MemoryAuditLog::verify_integrity`].

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

/// Hash recorded as `prev_hash` on the first entry
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Destination for audit entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist an entry, returning it as stored
    async fn append(&self, entry: AuditEntry) -> AuditResult<AuditEntry>;
}

/// In-memory hash-chained audit log
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    inner: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    /// Create empty log
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from previously stored entries
    ///
    /// New entries continue the chain from the last stored hash.
    ///
    /// # Errors
    /// Returns `AuditError::IntegrityViolation` if the stored chain is broken.
    pub fn from_entries(entries: Vec<AuditEntry>) -> AuditResult<Self> {
        let log = Self {
            inner: Mutex::new(entries),
        };
        log.verify_integrity()?;
        Ok(log)
    }

    /// Snapshot of every entry, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.inner.lock().clone()
    }

    /// Entries for one record, oldest first
    #[must_use]
    pub fn entries_for_record(&self, table_name: &str, record_id: &str) -> Vec<AuditEntry> {
        self.inner
            .lock()
            .iter()
            .filter(|e| e.table_name == table_name && e.record_id == record_id)
            .cloned()
            .collect()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Append synchronously; see [`AuditSink::append`]
    ///
    /// # Errors
    /// Returns `AuditError::Serialization` if the changes cannot be encoded.
    pub fn append_entry(&self, mut entry: AuditEntry) -> AuditResult<AuditEntry> {
        let mut guard = self.inner.lock();
        entry.prev_hash = guard
            .last()
            .map_or_else(|| GENESIS_HASH.to_string(), |e| e.hash.clone());
        entry.hash = compute_hash(&entry)?;
        guard.push(entry.clone());
        Ok(entry)
    }

    /// Recompute the chain
    ///
    /// # Errors
    /// Returns `AuditError::IntegrityViolation` at the first entry whose link
    /// or hash does not match.
    pub fn verify_integrity(&self) -> AuditResult<()> {
        let guard = self.inner.lock();
        let mut prev = GENESIS_HASH.to_string();
        for (index, entry) in guard.iter().enumerate() {
            if entry.prev_hash != prev || entry.hash != compute_hash(entry)? {
                return Err(AuditError::IntegrityViolation { index });
            }
            prev.clone_from(&entry.hash);
        }
        Ok(())
    }

    #[cfg(test)]
    fn tamper(&self, index: usize, f: impl FnOnce(&mut AuditEntry)) {
        f(&mut self.inner.lock()[index]);
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> AuditResult<AuditEntry> {
        self.append_entry(entry)
    }
}

fn compute_hash(entry: &AuditEntry) -> AuditResult<String> {
    let mut hasher = Sha256::new();
    hasher.update(entry.id.to_string().as_bytes());
    hasher.update(entry.timestamp.to_rfc3339().as_bytes());
    hasher.update([0]);
    hasher.update(entry.user_id.as_bytes());
    hasher.update([0]);
    hasher.update(entry.action.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(entry.table_name.as_bytes());
    hasher.update([0]);
    hasher.update(entry.record_id.as_bytes());
    hasher.update([0]);
    hasher.update(entry.entity_id.as_deref().unwrap_or_default().as_bytes());
    hasher.update([0]);
    hasher.update(serde_json::to_vec(&entry.changes)?);
    hasher.update(entry.prev_hash.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AuditAction, AuditContext, FieldChange};
    use serde_json::json;

    fn entry(record: &str) -> AuditEntry {
        let context = AuditContext::new("u1", "transactions", record);
        AuditEntry::new(
            &context,
            AuditAction::Update,
            vec![FieldChange {
                field: "quantity".to_string(),
                old_value: Some(json!(1)),
                new_value: Some(json!(2)),
            }],
        )
    }

    #[test]
    fn append_links_entries() {
        let log = MemoryAuditLog::new();
        let first = log.append_entry(entry("t1")).unwrap();
        let second = log.append_entry(entry("t2")).unwrap();

        assert_eq!(first.prev_hash, GENESIS_HASH);
        assert_eq!(second.prev_hash, first.hash);
        assert_eq!(first.hash.len(), 64);
        assert!(log.verify_integrity().is_ok());
    }

    #[test]
    fn tampering_is_detected() {
        let log = MemoryAuditLog::new();
        for record in ["t1", "t2", "t3"] {
            log.append_entry(entry(record)).unwrap();
        }

        log.tamper(1, |e| e.user_id = "mallory".to_string());
        let err = log.verify_integrity().unwrap_err();
        assert!(matches!(err, AuditError::IntegrityViolation { index: 1 }));
    }

    #[test]
    fn reloaded_log_continues_chain() {
        let log = MemoryAuditLog::new();
        let first = log.append_entry(entry("t1")).unwrap();

        let json = serde_json::to_string(&log.entries()).unwrap();
        let stored: Vec<AuditEntry> = serde_json::from_str(&json).unwrap();
        let reloaded = MemoryAuditLog::from_entries(stored).unwrap();
        let second = reloaded.append_entry(entry("t2")).unwrap();

        assert_eq!(second.prev_hash, first.hash);
        assert!(reloaded.verify_integrity().is_ok());
    }

    #[test]
    fn broken_stored_chain_is_rejected() {
        let log = MemoryAuditLog::new();
        log.append_entry(entry("t1")).unwrap();
        log.append_entry(entry("t2")).unwrap();

        let mut stored = log.entries();
        stored.remove(0);
        let err = MemoryAuditLog::from_entries(stored).unwrap_err();
        assert!(matches!(err, AuditError::IntegrityViolation { index: 0 }));
    }

    #[test]
    fn entries_for_record_filters() {
        let log = MemoryAuditLog::new();
        log.append_entry(entry("t1")).unwrap();
        log.append_entry(entry("t2")).unwrap();
        log.append_entry(entry("t1")).unwrap();

        assert_eq!(log.entries_for_record("transactions", "t1").len(), 2);
        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn async_sink_appends() {
        let log = MemoryAuditLog::new();
        let stored = log.append(entry("t1")).await.unwrap();
        assert!(!stored.hash.is_empty());
        assert!(!log.is_empty());
    }
}
