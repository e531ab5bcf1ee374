//! secad Registry
//!
//! Securities registry core around certificate numbering:
//!
//! - **Transactions**: issue, transfer, redemption, cancellation and capital
//!   movements, validated against holdings folded from history
//! - **Ledger**: in-memory transaction store, JSON persisted, scanned by the
//!   allocator for the latest certificate number
//! - **Issuer**: validate, allocate, attach, audit, all under a request budget
//!
//! # Example
//!
//! ```rust,ignore
//! use secad_registry::prelude::*;
//!
//! let ledger = Arc::new(InMemoryTransactionLedger::new());
//! let issuer = CertificateIssuer::new(ledger.clone(), audit, &SecadConfig::default());
//!
//! let id = ledger.record(Transaction::new("acme", "ord", TransactionType::Issue)
//!     .to_member("alice")
//!     .with_quantity(100))?;
//! let issued = issuer
//!     .issue(IssueRequest::new(id, CertificateNumberConfig::new("acme", 2024)))
//!     .await?;
//! assert_eq!(issued.allocation.certificate_number, "2024-0001");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod holdings;
pub mod issuer;
pub mod ledger;
pub mod types;
pub mod validation;

// Re-exports for convenience
pub use config::{IssuerSettings, NumberingStrategy, SecadConfig};
pub use error::{
    ConfigError, IssueError, RegistryError, TransactionValidationError,
    TransactionValidationErrors,
};
pub use holdings::Holdings;
pub use issuer::{CertificateIssuer, IssueRequest, IssuedCertificate};
pub use ledger::InMemoryTransactionLedger;
pub use types::{
    CertificateMetadata, EntityId, MemberId, SecurityClassId, Transaction, TransactionId,
    TransactionMetadata, TransactionType,
};
pub use validation::validate_transaction;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the registry
    pub use crate::{
        CertificateIssuer, InMemoryTransactionLedger, IssueError, IssueRequest,
        IssuedCertificate, SecadConfig, Transaction, TransactionId, TransactionType,
    };
    pub use secad_audit::{AuditLogger, MemoryAuditLog};
    pub use secad_certificate::CertificateNumberConfig;
    pub use std::sync::Arc;
}
