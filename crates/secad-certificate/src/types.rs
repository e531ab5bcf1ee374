//! Core types for certificate numbering
//!
//! - Allocation request configuration
//! - The (entity, year) key that scopes a sequence
//! - Successful allocations and their JSON response envelope

use crate::error::AllocationError;
use crate::format::{self, DEFAULT_FORMAT};
use serde::{Deserialize, Serialize};

/// Identifies one numbering sequence: a single entity within a single year
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateKey {
    /// Owning entity
    pub entity_id: String,
    /// Numbering epoch
    pub year: i32,
}

impl CertificateKey {
    /// Create key for entity and year
    #[inline]
    #[must_use]
    pub fn new(entity_id: impl Into<String>, year: i32) -> Self {
        Self {
            entity_id: entity_id.into(),
            year,
        }
    }
}

impl std::fmt::Display for CertificateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.entity_id, self.year)
    }
}

/// Allocation request
///
/// `format` falls back to [`DEFAULT_FORMAT`] (or the allocator's configured
/// default) when absent. Empty `prefix`/`suffix` values are treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateNumberConfig {
    /// Owning entity
    pub entity_id: String,
    /// Numbering epoch
    pub year: i32,
    /// Template containing `{YEAR}` and `{SEQUENTIAL_NUMBER}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Prepended as `prefix-`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Appended as `-suffix`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl CertificateNumberConfig {
    /// Create config with the default format
    #[inline]
    #[must_use]
    pub fn new(entity_id: impl Into<String>, year: i32) -> Self {
        Self {
            entity_id: entity_id.into(),
            year,
            format: None,
            prefix: None,
            suffix: None,
        }
    }

    /// With template
    #[inline]
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// With prefix
    #[inline]
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// With suffix
    #[inline]
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Sequence key for this request
    #[inline]
    #[must_use]
    pub fn key(&self) -> CertificateKey {
        CertificateKey::new(self.entity_id.clone(), self.year)
    }

    /// Template in effect, using `default` when none was supplied
    #[inline]
    #[must_use]
    pub fn format_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.format.as_deref().unwrap_or(default)
    }

    /// Render `sequence` with this config and the built-in default template
    #[must_use]
    pub fn render(&self, sequence: u64) -> String {
        format::render(
            self.format_or(DEFAULT_FORMAT),
            self.year,
            sequence,
            self.prefix.as_deref(),
            self.suffix.as_deref(),
        )
    }
}

/// One successful production of a certificate number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    /// Rendered number
    pub certificate_number: String,
    /// Numbering epoch
    pub year: i32,
    /// Position within (entity, year)
    pub sequence: u64,
    /// Owning entity
    pub entity_id: String,
    /// User that requested the allocation, or `system`
    pub generated_by: String,
}

impl Allocation {
    /// Sequence key this allocation belongs to
    #[inline]
    #[must_use]
    pub fn key(&self) -> CertificateKey {
        CertificateKey::new(self.entity_id.clone(), self.year)
    }
}

/// JSON envelope handed to the certificate-generation handler
///
/// Mirrors `{ success, data?, error? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResponse {
    /// Whether an allocation was produced
    pub success: bool,
    /// Allocation on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Allocation>,
    /// Failure message otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<Allocation, AllocationError>> for AllocationResponse {
    fn from(result: Result<Allocation, AllocationError>) -> Self {
        match result {
            Ok(allocation) => Self {
                success: true,
                data: Some(allocation),
                error: None,
            },
            Err(err) => Self {
                success: false,
                data: None,
                error: Some(err.to_string()),
            },
        }
    }
}
