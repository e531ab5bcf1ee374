//! Diff-and-persist audit logger

use crate::diff::diff_values;
use crate::entry::{AuditAction, AuditContext, AuditEntry};
use crate::error::AuditResult;
use crate::sink::AuditSink;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Serializes records, diffs them and appends the result to a sink
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger").finish_non_exhaustive()
    }
}

impl AuditLogger {
    /// Create logger writing to `sink`
    #[inline]
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Record creation of `after`
    ///
    /// # Errors
    /// Serialization or sink failures.
    pub async fn log_create<T: Serialize>(
        &self,
        context: &AuditContext,
        after: &T,
    ) -> AuditResult<Option<AuditEntry>> {
        let after = serde_json::to_value(after)?;
        self.record(context, AuditAction::Create, &Value::Null, &after)
            .await
    }

    /// Record a change from `before` to `after`; writes nothing if equal
    ///
    /// # Errors
    /// Serialization or sink failures.
    pub async fn log_update<T: Serialize>(
        &self,
        context: &AuditContext,
        before: &T,
        after: &T,
    ) -> AuditResult<Option<AuditEntry>> {
        let before = serde_json::to_value(before)?;
        let after = serde_json::to_value(after)?;
        self.record(context, AuditAction::Update, &before, &after)
            .await
    }

    /// Record removal of `before`
    ///
    /// # Errors
    /// Serialization or sink failures.
    pub async fn log_delete<T: Serialize>(
        &self,
        context: &AuditContext,
        before: &T,
    ) -> AuditResult<Option<AuditEntry>> {
        let before = serde_json::to_value(before)?;
        self.record(context, AuditAction::Delete, &before, &Value::Null)
            .await
    }

    async fn record(
        &self,
        context: &AuditContext,
        action: AuditAction,
        before: &Value,
        after: &Value,
    ) -> AuditResult<Option<AuditEntry>> {
        let changes = diff_values(before, after);
        if changes.is_empty() && action == AuditAction::Update {
            tracing::debug!(
                table = %context.table_name,
                record = %context.record_id,
                "no changes to audit"
            );
            return Ok(None);
        }

        let entry = AuditEntry::new(context, action, changes);
        let stored = self.sink.append(entry).await?;
        tracing::debug!(
            table = %stored.table_name,
            record = %stored.record_id,
            action = stored.action.as_str(),
            fields = stored.changes.len(),
            "audit entry recorded"
        );
        Ok(Some(stored))
    }
}
