//! Registry configuration
//!
//! ```toml
//! [allocator]
//! default_format = "{YEAR}-{SEQUENTIAL_NUMBER}"
//! max_conflict_retries = 3
//! cache_ttl_ms = 3600000
//!
//! [issuer]
//! request_timeout_ms = 5000
//! numbering = "counter"
//! ```

use crate::error::ConfigError;
use secad_certificate::AllocatorSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default wall-clock budget for one issue request
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// How the issuer obtains sequences
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingStrategy {
    /// Scan the ledger for the latest number and add one
    #[default]
    LedgerScan,
    /// Draw from the in-process atomic counter
    Counter,
}

/// Workflow configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerSettings {
    /// Request budget in milliseconds
    pub request_timeout_ms: u64,
    /// Sequence source
    pub numbering: NumberingStrategy,
}

impl IssuerSettings {
    /// Create default settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With request budget
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With numbering strategy
    #[inline]
    #[must_use]
    pub fn with_numbering(mut self, numbering: NumberingStrategy) -> Self {
        self.numbering = numbering;
        self
    }

    /// Request budget
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for IssuerSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            numbering: NumberingStrategy::default(),
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecadConfig {
    /// Allocator settings
    pub allocator: AllocatorSettings,
    /// Workflow settings
    pub issuer: IssuerSettings,
}

impl SecadConfig {
    /// Parse TOML; missing sections and keys take their defaults
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed TOML or unknown values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// IO or parse failures.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), ?config, "loaded configuration");
        Ok(config)
    }
}
