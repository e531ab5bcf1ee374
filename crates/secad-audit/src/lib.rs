//! secad Audit Trail
//!
//! Records who changed which registry record and how, one entry per change:
//!
//! - **Diff**: serialize before/after with serde and compare top-level fields
//! - **Persist**: append to an [`AuditSink`]; updates with no changes are skipped
//! - **Verify**: the in-memory log is SHA-256 hash chained

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod diff;
pub mod entry;
pub mod error;
pub mod logger;
pub mod sink;

pub use diff::diff_values;
pub use entry::{AuditAction, AuditContext, AuditEntry, AuditEntryId, FieldChange};
pub use error::{AuditError, AuditResult};
pub use logger::AuditLogger;
pub use sink::{AuditSink, MemoryAuditLog, GENESIS_HASH};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
