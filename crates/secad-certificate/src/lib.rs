//! secad Certificate Numbering
//!
//! Allocates certificate numbers that are unique per (entity, year) and
//! increase monotonically, rendered from a configurable template.
//!
//! # Core Operations
//!
//! - **Generate**: scan the ledger for the latest number, increment, render
//! - **Validate**: check an allocation config before use
//! - **Resolve conflict**: bounded regeneration after a caller-detected collision
//! - **Cache control**: scoped clearing and statistics of last-issued numbers
//!
//! # Architecture
//!
//! ```text
//! CertificateNumberConfig → Allocator ─┬─ CertificateLedger (latest number scan)
//!                                      ├─ SequenceCounter   (atomic, opt-in)
//!                                      └─ CertificateCache  (last issued, process local)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use secad_certificate::{CertificateNumberAllocator, CertificateNumberConfig};
//!
//! # async fn example(ledger: std::sync::Arc<dyn secad_certificate::CertificateLedger>) {
//! let allocator = CertificateNumberAllocator::new(ledger);
//! let config = CertificateNumberConfig::new("acme", 2024).with_prefix("ORD");
//!
//! let allocation = allocator.generate_certificate_number(&config, Some("alice")).await?;
//! assert_eq!(allocation.certificate_number, "ORD-2024-0001");
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod allocator;
pub mod cache;
pub mod counter;
pub mod error;
pub mod format;
pub mod ledger;
pub mod settings;
pub mod types;
pub mod validation;

// Re-exports for convenience
pub use allocator::{CertificateNumberAllocator, SYSTEM_USER};
pub use cache::{CacheStats, CachedNumber, CertificateCache};
pub use counter::{InMemorySequenceCounter, SequenceCounter};
pub use error::{AllocationError, AllocationResult, LedgerError};
pub use format::{extract_sequence_from_number, render, DEFAULT_FORMAT};
pub use ledger::CertificateLedger;
pub use settings::AllocatorSettings;
pub use types::{Allocation, AllocationResponse, CertificateKey, CertificateNumberConfig};
pub use validation::{validate_config, ConfigValidation};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for allocating certificate numbers
    pub use crate::{
        Allocation, AllocationError, AllocatorSettings, CertificateKey, CertificateLedger,
        CertificateNumberAllocator, CertificateNumberConfig, InMemorySequenceCounter,
        LedgerError, SequenceCounter,
    };
}
