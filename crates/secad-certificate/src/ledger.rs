//! Data-access seam the allocator scans for previously issued numbers

use crate::error::LedgerError;
use async_trait::async_trait;

/// Source of previously issued certificate numbers
///
/// The registry's transaction store implements this by looking at the
/// certificate metadata attached to transactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CertificateLedger: Send + Sync {
    /// Number of the most recently issued certificate for (entity, year), if any
    async fn latest_certificate_number(
        &self,
        entity_id: &str,
        year: i32,
    ) -> Result<Option<String>, LedgerError>;

    /// Highest stored sequence for (entity, year)
    ///
    /// Stores that keep the sequence as its own field override this so
    /// counters can be seeded without parsing rendered numbers. `None` means
    /// no typed sequence is available.
    async fn highest_sequence(
        &self,
        entity_id: &str,
        year: i32,
    ) -> Result<Option<u64>, LedgerError> {
        let _ = (entity_id, year);
        Ok(None)
    }
}
