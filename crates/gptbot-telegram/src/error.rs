//! Error types for the Telegram bot.

use thiserror::Error;

/// Errors that can occur in the Telegram bot.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Bot token missing from the startup configuration.
    #[error("Telegram bot token not set. Set botToken in the configuration file.")]
    NoToken,

    /// Completion API token missing from the startup configuration.
    #[error("OpenAI token not set. Set gptToken in the configuration file.")]
    NoApiToken,

    /// Startup configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] gptbot_core::ConfigError),

    /// A Telegram API request failed.
    #[error("Telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),
}

/// Result type for Telegram operations.
pub type Result<T> = std::result::Result<T, TelegramError>;
