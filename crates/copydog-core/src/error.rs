//! Error types for the copydog core
//!
//! This module defines all error types used throughout the crate.
//!
//! Absent cross-references and absent status mappings are not errors: they
//! come back as `Ok(None)` and callers branch on them explicitly.

use thiserror::Error;

/// Result type alias for copydog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the copydog core
#[derive(Error, Debug)]
pub enum Error {
    /// The key-value backend cannot be reached or a transaction failed
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// An item does not match the shape of its declared source service
    #[error("Schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch {
        /// What the operation expected
        expected: String,
        /// What it was given
        found: String,
    },

    /// A required configuration value is absent
    #[error("Missing configuration value: {0}")]
    MissingConfig(String),

    /// A stored value cannot be decoded or has the wrong type
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// Configuration errors other than a missing key
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a store-unavailable error
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a missing-config error for a dotted configuration key
    pub fn missing_config(key: impl Into<String>) -> Self {
        Self::MissingConfig(key.into())
    }

    /// Create a corrupt record error
    pub fn corrupt_record(msg: impl Into<String>) -> Self {
        Self::CorruptRecord(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether retrying the same call later could succeed
    ///
    /// Only backend outages qualify; every other kind is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_errors_are_retryable() {
        assert!(Error::store_unavailable("connection refused").is_retryable());
        assert!(!Error::missing_config("clients.trello.board_id").is_retryable());
        assert!(!Error::schema_mismatch("redmine issue", "trello card").is_retryable());
        assert!(!Error::corrupt_record("bad timestamp").is_retryable());
        assert!(!Error::config("bad url").is_retryable());
        assert!(!Error::invalid_input("empty id").is_retryable());
    }

    #[test]
    fn schema_mismatch_message_names_both_shapes() {
        let err = Error::schema_mismatch("redmine issue", "trello card");
        assert_eq!(
            err.to_string(),
            "Schema mismatch: expected redmine issue, found trello card"
        );
    }
}
