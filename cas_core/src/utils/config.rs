//! Configuration utilities.
//!
//! This module provides the configuration of a security context. The
//! configuration is plain data and is usually loaded from a TOML document.

use std::path::Path;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::error::ConfigError;
use super::logging::LogLevel;

/// What a bare `revert_assert` clears on the current frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevertScope {
    /// Clear the assertions of every kind.
    #[default]
    AllKinds,

    /// Clear only the most recently asserted kind.
    MostRecent,
}

/// Audit trail settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Whether demand outcomes are recorded.
    pub enabled: bool,

    /// The maximum number of entries kept per permission kind.
    pub max_entries_per_kind: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries_per_kind: 1000,
        }
    }
}

/// Configuration of a security context.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Scope of a bare `revert_assert`.
    pub revert_scope: RevertScope,

    /// Number of innermost frames skipped before a demand starts walking.
    pub demand_skip_frames: usize,

    /// Log level for the security context.
    pub log_level: LogLevel,

    /// Audit trail settings.
    pub audit: AuditConfig,
}

impl SecurityConfig {
    /// Parse a configuration from a TOML document.
    ///
    /// Missing fields take their default values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading security configuration");
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Render this configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Check the configuration for values that cannot be honored.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audit.enabled && self.audit.max_entries_per_kind == 0 {
            return Err(ConfigError::Invalid(
                "audit.max_entries_per_kind must be positive when auditing is enabled".into()
            ));
        }
        Ok(())
    }
}
