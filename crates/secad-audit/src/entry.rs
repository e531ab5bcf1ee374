//! Audit entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

/// Unique audit entry identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AuditEntryId(pub Ulid);

impl AuditEntryId {
    /// Generate new entry ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for AuditEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuditEntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of change recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Record created
    Create,
    /// Record modified
    Update,
    /// Record removed
    Delete,
}

impl AuditAction {
    /// Stable name used in hashes and logs
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// One changed field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    /// Top-level field name
    pub field: String,
    /// Value before the change, absent for new fields
    pub old_value: Option<Value>,
    /// Value after the change, absent for removed fields
    pub new_value: Option<Value>,
}

/// Who changed which record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditContext {
    /// Acting user
    pub user_id: String,
    /// Logical table of the record
    pub table_name: String,
    /// Record identifier
    pub record_id: String,
    /// Owning entity, when the record belongs to one
    pub entity_id: Option<String>,
}

impl AuditContext {
    /// Create context for a record
    #[inline]
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        table_name: impl Into<String>,
        record_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            table_name: table_name.into(),
            record_id: record_id.into(),
            entity_id: None,
        }
    }

    /// With owning entity
    #[inline]
    #[must_use]
    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }
}

/// Persisted audit record
///
/// `prev_hash`/`hash` are hex SHA-256 digests filled in by the sink when the
/// entry is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Entry identifier
    pub id: AuditEntryId,
    /// When the change was recorded
    pub timestamp: DateTime<Utc>,
    /// Acting user
    pub user_id: String,
    /// Kind of change
    pub action: AuditAction,
    /// Logical table of the record
    pub table_name: String,
    /// Record identifier
    pub record_id: String,
    /// Owning entity
    pub entity_id: Option<String>,
    /// Changed fields
    pub changes: Vec<FieldChange>,
    /// Hash of the previous entry
    pub prev_hash: String,
    /// Hash of this entry
    pub hash: String,
}

impl AuditEntry {
    /// Build an unchained entry for `context`
    #[must_use]
    pub fn new(context: &AuditContext, action: AuditAction, changes: Vec<FieldChange>) -> Self {
        Self {
            id: AuditEntryId::new(),
            timestamp: Utc::now(),
            user_id: context.user_id.clone(),
            action,
            table_name: context.table_name.clone(),
            record_id: context.record_id.clone(),
            entity_id: context.entity_id.clone(),
            changes,
            prev_hash: String::new(),
            hash: String::new(),
        }
    }

    /// Change recorded for `field`, if any
    #[must_use]
    pub fn change_for(&self, field: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field == field)
    }
}
