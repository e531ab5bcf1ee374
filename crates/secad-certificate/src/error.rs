//! Error types for certificate number allocation
//!
//! Provides error handling for:
//! - Ledger and counter access (the data-access seam)
//! - Allocation failures surfaced to callers

/// Errors raised by a [`CertificateLedger`](crate::CertificateLedger) or
/// [`SequenceCounter`](crate::SequenceCounter) implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Backing store could not be reached
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Query against the backing store failed
    #[error("ledger query failed: {0}")]
    Query(String),

    /// Sequence counter cannot advance further
    #[error("sequence overflow for {0}")]
    SequenceOverflow(String),
}

/// Allocation failure returned to callers of the allocator
///
/// The allocator never panics across its boundary; every failure is one of
/// these variants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    /// Data access failed; carries the original message
    #[error("data access failed: {0}")]
    Store(String),

    /// Every conflict-resolution attempt produced the colliding number
    #[error("failed to generate a unique certificate number after exhausting multiple attempts")]
    ConflictRetriesExhausted {
        /// Number of generation attempts made
        attempts: u32,
    },
}

impl AllocationError {
    /// Check if error came from the backing store
    #[inline]
    #[must_use]
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

impl From<LedgerError> for AllocationError {
    fn from(err: LedgerError) -> Self {
        Self::Store(err.to_string())
    }
}

/// Result type alias for allocation operations
pub type AllocationResult<T> = Result<T, AllocationError>;
