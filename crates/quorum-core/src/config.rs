//! Registry configuration files.
//!
//! A registry file describes one account, its approval threshold, its
//! current sequence number and the ordered approver list:
//!
//! ```toml
//! account = "aa…aa"
//! threshold = 25
//! sequence = 0
//!
//! [[approvers]]
//! identity = "8a88…"
//! weight = 10
//! ```
//!
//! Approver order is significant: approver `i` occupies registry leaf `i`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crypto::Identity;
use crate::registry::{ApproverRecord, RegistryTree};
use crate::service::RegistryState;

/// One approver in a registry file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverEntry {
    /// Approver identity (hex Ed25519 public key).
    pub identity: Identity,
    /// Approver weight.
    pub weight: u32,
}

impl From<ApproverEntry> for ApproverRecord {
    fn from(entry: ApproverEntry) -> Self {
        Self::new(entry.identity, entry.weight)
    }
}

impl From<ApproverRecord> for ApproverEntry {
    fn from(record: ApproverRecord) -> Self {
        Self {
            identity: record.identity,
            weight: record.weight,
        }
    }
}

/// Account registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Account the registry belongs to.
    pub account: Identity,

    /// Approval threshold in weight units.
    pub threshold: u32,

    /// Current account sequence number.
    #[serde(default)]
    pub sequence: u32,

    /// Ordered approver list.
    #[serde(default)]
    pub approvers: Vec<ApproverEntry>,
}

impl RegistryConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TOML is invalid
    /// - The account is the empty identity
    /// - The approver list violates registry rules (capacity, empty or
    ///   duplicate identity, weight bound)
    /// - The threshold is zero or out of range
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check the account, approvers and threshold.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account.is_empty() {
            return Err(ConfigError::Validation(
                "account must not be the empty identity".to_string(),
            ));
        }
        self.registry_state().map(|_| ())
    }

    /// Approver records in leaf order.
    #[must_use]
    pub fn records(&self) -> Vec<ApproverRecord> {
        self.approvers.iter().copied().map(Into::into).collect()
    }

    /// Registry tree over [`RegistryConfig::records`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for invalid approver lists.
    pub fn registry_tree(&self) -> Result<RegistryTree, ConfigError> {
        RegistryTree::build(&self.records()).map_err(|e| ConfigError::Validation(e.to_string()))
    }

    /// Committed registry state for this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for invalid approver lists or
    /// thresholds.
    pub fn registry_state(&self) -> Result<RegistryState, ConfigError> {
        let tree = self.registry_tree()?;
        RegistryState::new(tree.root(), self.threshold)
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}
