//! Error types for the registry
//!
//! Provides error handling for:
//! - Transaction validation (field requirements, holdings sufficiency)
//! - Ledger operations
//! - Configuration loading
//! - The certificate-generation workflow

use crate::types::{MemberId, SecurityClassId, TransactionId, TransactionType};
use secad_certificate::AllocationError;
use std::path::PathBuf;

/// One reason a transaction is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionValidationError {
    /// Required field absent or blank
    #[error("{field} is required for {transaction_type}")]
    MissingField {
        /// Field name
        field: &'static str,
        /// Transaction type requiring it
        transaction_type: TransactionType,
    },

    /// Unit movement with zero quantity
    #[error("quantity must be greater than zero")]
    ZeroQuantity,

    /// Capital movement with no amount
    #[error("amount must be greater than zero for {0}")]
    MissingAmount(TransactionType),

    /// Transfer to oneself
    #[error("sender and recipient must differ")]
    SameMember,

    /// Sender holds fewer units than requested
    #[error("member {member} holds {held} of {class}, cannot move {requested}")]
    InsufficientHoldings {
        /// Sending member
        member: MemberId,
        /// Security class
        class: SecurityClassId,
        /// Units currently held
        held: u64,
        /// Units requested
        requested: u64,
    },

    /// Capital movement for a member holding none of the class
    #[error("member {member} holds no {class}")]
    NotAHolder {
        /// Member named on the transaction
        member: MemberId,
        /// Security class
        class: SecurityClassId,
    },
}

/// Every reason a transaction is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transaction: {}", join(.0))]
pub struct TransactionValidationErrors(pub Vec<TransactionValidationError>);

impl TransactionValidationErrors {
    /// Whether a specific reason is present
    #[must_use]
    pub fn contains(&self, err: &TransactionValidationError) -> bool {
        self.0.contains(err)
    }

    /// Human-readable messages
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

fn join(errors: &[TransactionValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Ledger failures
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No transaction with this id
    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Transaction rejected by validation
    #[error(transparent)]
    Validation(#[from] TransactionValidationErrors),

    /// Transaction already carries a certificate
    #[error("transaction {transaction} already has certificate {number}")]
    AlreadyCertified {
        /// Transaction
        transaction: TransactionId,
        /// Existing number
        number: String,
    },

    /// Number already attached to another transaction of the entity
    #[error("certificate number {number} already issued for entity {entity}")]
    DuplicateCertificateNumber {
        /// Owning entity
        entity: String,
        /// Colliding number
        number: String,
    },

    /// Ledger file could not be read or written
    #[error("io error on {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Ledger file content is not valid JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RegistryError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration loading failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("io error reading {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`SecadConfig`](crate::SecadConfig)
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Certificate-generation workflow failures
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    /// Config rejected before allocation
    #[error("invalid certificate configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// Transaction does not exist
    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Transaction belongs to another entity
    #[error("transaction {transaction} belongs to {actual}, not {expected}")]
    EntityMismatch {
        /// Transaction
        transaction: TransactionId,
        /// Entity named in the request
        expected: String,
        /// Entity on the transaction
        actual: String,
    },

    /// Transaction already carries a certificate
    #[error("transaction {transaction} already has certificate {number}")]
    AlreadyCertified {
        /// Transaction
        transaction: TransactionId,
        /// Existing number
        number: String,
    },

    /// Allocation failed
    #[error("allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    /// Ledger write failed
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Request exceeded its wall-clock budget
    #[error("certificate generation timed out after {timeout_ms}ms")]
    Timeout {
        /// Budget in milliseconds
        timeout_ms: u64,
    },
}

impl IssueError {
    /// HTTP status a handler should answer with
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidConfig(_) | Self::EntityMismatch { .. } => 400,
            Self::TransactionNotFound(_) => 404,
            Self::AlreadyCertified { .. } => 409,
            Self::Allocation(_) | Self::Registry(_) | Self::Timeout { .. } => 500,
        }
    }

    /// Message safe to show end users
    ///
    /// Server-side failures share one message; collisions and outages are
    /// not distinguished.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidConfig(_)
            | Self::TransactionNotFound(_)
            | Self::EntityMismatch { .. }
            | Self::AlreadyCertified { .. } => self.to_string(),
            Self::Allocation(_) | Self::Registry(_) | Self::Timeout { .. } => {
                "Failed to generate certificate".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_join() {
        let errs = TransactionValidationErrors(vec![
            TransactionValidationError::ZeroQuantity,
            TransactionValidationError::SameMember,
        ]);
        assert_eq!(
            errs.to_string(),
            "invalid transaction: quantity must be greater than zero; sender and recipient must differ"
        );
        assert!(errs.contains(&TransactionValidationError::SameMember));
    }

    #[test]
    fn missing_field_display() {
        let err = TransactionValidationError::MissingField {
            field: "toMember",
            transaction_type: TransactionType::Issue,
        };
        assert_eq!(err.to_string(), "toMember is required for ISSUE");
    }

    #[test]
    fn server_failures_share_user_message() {
        let timeout = IssueError::Timeout { timeout_ms: 5000 };
        let store = IssueError::Allocation(AllocationError::Store("down".to_string()));
        assert_eq!(timeout.user_message(), store.user_message());
        assert_eq!(timeout.status_code(), 500);
    }

    #[test]
    fn client_failures_are_specific() {
        let err = IssueError::InvalidConfig(vec!["Entity ID is required".to_string()]);
        assert_eq!(err.status_code(), 400);
        assert!(err.user_message().contains("Entity ID is required"));
    }
}
