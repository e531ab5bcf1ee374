//! Allocation config validation
//!
//! Pure checks, no I/O. Generation does not call these itself; the
//! certificate-generation workflow does before allocating.

use crate::format::YEAR_PLACEHOLDER;
use crate::types::CertificateNumberConfig;
use serde::{Deserialize, Serialize};

/// Earliest accepted numbering year
pub const MIN_YEAR: i32 = 1900;

/// Latest accepted numbering year
pub const MAX_YEAR: i32 = 2100;

/// Reported when the entity is blank
pub const ENTITY_REQUIRED: &str = "Entity ID is required";

/// Reported when the year is outside [`MIN_YEAR`, `MAX_YEAR`]
pub const YEAR_OUT_OF_RANGE: &str = "Year must be between 1900 and 2100";

/// Reported when a supplied format omits `{YEAR}`
pub const FORMAT_MISSING_YEAR: &str = "Format must contain {YEAR} placeholder";

/// Outcome of [`validate_config`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValidation {
    /// True when `errors` is empty
    pub valid: bool,
    /// Human-readable problems, in check order
    pub errors: Vec<String>,
}

impl ConfigValidation {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Check an allocation config
#[must_use]
pub fn validate_config(config: &CertificateNumberConfig) -> ConfigValidation {
    let mut errors = Vec::new();

    if config.entity_id.trim().is_empty() {
        errors.push(ENTITY_REQUIRED.to_string());
    }

    if !(MIN_YEAR..=MAX_YEAR).contains(&config.year) {
        errors.push(YEAR_OUT_OF_RANGE.to_string());
    }

    if let Some(format) = &config.format {
        if !format.contains(YEAR_PLACEHOLDER) {
            errors.push(FORMAT_MISSING_YEAR.to_string());
        }
    }

    ConfigValidation::from_errors(errors)
}
