//! Error types for modelprefs.
//!
//! [`PreferenceError`] covers every failure the preference layer can surface:
//! misconfigured owners, unknown or mismatched drivers, missing owner
//! capabilities, validation failures, and passthrough storage errors. None of
//! them are swallowed or retried by the core.

use thiserror::Error;

use crate::rules::ValidationErrors;

/// Errors produced by preference operations.
#[derive(Debug, Error)]
pub enum PreferenceError {
    /// The owner selected the column driver without a usable column name.
    #[error("The preferences column is not configured for the [{table}] table.")]
    ColumnNotConfigured { table: String },

    /// The owner selected the table driver without a usable table name.
    #[error("The preferences table is not configured for the [{table}] table.")]
    TableNotConfigured { table: String },

    /// A configuration value has the wrong shape.
    #[error("Configuration value for key [{key}] must be {expected}, {given} given.")]
    InvalidConfigValue {
        key: String,
        expected: &'static str,
        given: &'static str,
    },

    /// A named database connection is not registered.
    #[error("Database connection [{0}] not configured.")]
    ConnectionNotConfigured(String),

    /// No driver factory is registered under the requested name.
    #[error("Driver [{0}] not supported.")]
    UnsupportedDriver(String),

    /// The owner declares a different driver than the store being used.
    #[error("The owner preference driver [{declared}] does not match the selected driver [{selected}].")]
    DriverMismatch { declared: String, selected: String },

    /// The owner does not expose a preference configuration.
    #[error("The [{owner_type}] owner does not declare a preferences configuration.")]
    CapabilityMissing { owner_type: String },

    /// One or more values failed their declared rules. Nothing was written.
    #[error("The given preference data was invalid.")]
    Validation(ValidationErrors),

    /// JSON encoding or decoding of a stored value failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The underlying storage client failed.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PreferenceError {
    /// Wraps an error raised by a storage client.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PreferenceError::Storage(Box::new(err))
    }

    /// Whether this error signals a misconfigured owner or configuration source.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            PreferenceError::ColumnNotConfigured { .. }
                | PreferenceError::TableNotConfigured { .. }
                | PreferenceError::InvalidConfigValue { .. }
                | PreferenceError::ConnectionNotConfigured(_)
        )
    }

    /// The field-level validation messages, if this is a validation failure.
    pub fn errors(&self) -> Option<&ValidationErrors> {
        match self {
            PreferenceError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
