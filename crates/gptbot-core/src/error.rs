//! Error types for the core crate.

use thiserror::Error;

/// Errors raised while loading startup configuration.
///
/// These are fatal: the bot must not start serving when one occurs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read or parsed as key/value lines.
    #[error("failed to read configuration {path}: {message}")]
    Read {
        /// Path that was being read.
        path: String,
        /// Underlying error message.
        message: String,
    },

    /// A key held a value that cannot be converted to its type.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Configuration key.
        key: &'static str,
        /// Raw value found in the source.
        value: String,
    },

    /// A line in the source could not be parsed as a property.
    #[error("malformed configuration line: {0}")]
    Malformed(String),
}

/// Errors raised when a reply cannot be handed back to the chat gateway.
#[derive(Debug, Error)]
pub enum ReplyError {
    /// The gateway rejected or failed to deliver the message.
    #[error("failed to deliver reply: {0}")]
    Delivery(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<java_properties::PropertiesError> for ConfigError {
    fn from(e: java_properties::PropertiesError) -> Self {
        ConfigError::Malformed(e.to_string())
    }
}
