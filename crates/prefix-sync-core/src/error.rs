//! Error types for the prefix-list sync system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the prefix-list sync system
#[derive(Error, Debug)]
pub enum Error {
    /// DNS lookup failed or produced no usable addresses
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// A single address or CIDR string could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The provider rejected a modify because the version moved on
    #[error("Version conflict on prefix list {prefix_list_id}: expected version {expected_version} is stale")]
    VersionConflict {
        /// Prefix list the modify targeted
        prefix_list_id: String,
        /// Version the modify was conditioned on
        expected_version: u64,
    },

    /// Any other remote-call failure (network, throttling, permissions)
    #[error("Provider error ({provider}): {message}")]
    ProviderTransport {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Prefix list not found
    #[error("Prefix list not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Several families failed under the collect-all policy
    #[error("{} prefix list(s) failed: {}", .0.len(), .0.join("; "))]
    Aggregate(Vec<String>),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a version conflict error
    pub fn version_conflict(prefix_list_id: impl Into<String>, expected_version: u64) -> Self {
        Self::VersionConflict {
            prefix_list_id: prefix_list_id.into(),
            expected_version,
        }
    }

    /// Create a provider transport error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderTransport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error is a stale-version rejection
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
