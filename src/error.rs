//! Error types for a3s-inquisitor

use thiserror::Error;

/// Errors that can occur while auditing, remediating, or resolving hijack chains
#[derive(Debug, Error)]
pub enum InquisitorError {
    /// Missing or invalid configuration (required tags, action mode, config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cloud provider API failure
    #[error("Provider error for '{resource}': {reason}")]
    Provider {
        resource: String,
        reason: String,
    },

    /// Resource or entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Relationship store backend failure
    #[error("Store error: {0}")]
    Store(String),

    /// Delete refused because other rows still depend on the entity
    #[error("Cannot delete '{key}': still referenced by {dependents} entities")]
    InUse {
        key: String,
        dependents: usize,
    },

    /// No adapter exists for the given service identifier
    #[error("Unsupported service: {0}")]
    UnsupportedService(String),

    /// Deadline exceeded (invocation deadline or bounded polling)
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Invocation cancelled by the caller
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Notification rendering or delivery failure
    #[error("Notification error: {0}")]
    Notification(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML config parse failure
    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InquisitorError {
    /// Build a provider error for a resource
    pub fn provider(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Provider {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// True when the error means the target is already gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True when the invocation itself was aborted (cancel or deadline)
    ///
    /// These abort a whole resolution instead of a single branch.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Cancelled(_) | Self::Timeout(_))
    }
}

/// Result type alias for inquisitor operations
pub type Result<T> = std::result::Result<T, InquisitorError>;
