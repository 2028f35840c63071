//! Core error types for focuskit-core.
//!
//! Engine-state errors are synchronous and block the mutation that raised
//! them. Persistence and side-effect errors are reported and logged but never
//! block the state machine.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for focuskit-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Session or settings persistence errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Audio or notification failures
    #[error("Side effect error: {0}")]
    SideEffect(#[from] SideEffectError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A value violates the configuration invariants.
    #[error("Invalid configuration value for '{field}': {message}")]
    InvalidConfiguration { field: String, message: String },

    /// Key does not name a configuration field
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Value could not be parsed for the field's type
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Validated configuration could not be written
    #[error("Failed to save configuration: {0}")]
    SaveFailed(#[source] PersistenceError),
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidConfiguration {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Errors raised by session sinks and key-value stores.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Value could not be encoded for storage
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Failures of best-effort completion effects.
#[derive(Error, Debug)]
pub enum SideEffectError {
    /// Host has no way to perform the effect
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Effect was attempted and failed
    #[error("Failed: {0}")]
    Failed(String),
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) {
                    PersistenceError::Locked
                } else {
                    PersistenceError::QueryFailed(err.to_string())
                }
            }
            _ => PersistenceError::QueryFailed(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Persistence(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_configuration_names_field() {
        let err = ConfigError::invalid("focusMinutes", "must be greater than 0");
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for 'focusMinutes': must be greater than 0"
        );
    }

    #[test]
    fn config_error_wraps_into_core_error() {
        let err: CoreError = ConfigError::UnknownKey("theme".into()).into();
        assert!(matches!(err, CoreError::Config(ConfigError::UnknownKey(_))));
    }
}
