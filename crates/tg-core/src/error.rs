//! Error types for settings handling.

use thiserror::Error;

/// Errors raised while reading a standard's settings object.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid value for setting '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Malformed settings: {0}")]
    Malformed(String),
}

impl SettingsError {
    /// Creates an invalid value error for a field.
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
