//! Error types for the audit trail

/// Audit failures
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Record could not be serialized for diffing or hashing
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored chain no longer matches its hashes
    #[error("audit chain integrity violation at entry {index}")]
    IntegrityViolation {
        /// Position of the first bad entry
        index: usize,
    },

    /// Sink refused or failed the write
    #[error("audit sink unavailable: {0}")]
    SinkUnavailable(String),
}

/// Result type alias for audit operations
pub type AuditResult<T> = Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_violation_display() {
        let err = AuditError::IntegrityViolation { index: 4 };
        assert_eq!(err.to_string(), "audit chain integrity violation at entry 4");
    }
}
