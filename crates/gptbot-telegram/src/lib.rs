//! Telegram front end for GPT Bot.
//!
//! Connects to Telegram in polling mode and hands every text message to the
//! [`gptbot_core::CommandDispatcher`]; replies go back to the originating chat.
//!
//! # Configuration
//!
//! Settings come from a `config.properties` file (see [`gptbot_core::config`]).
//!
//! Required:
//! - `botToken`: Bot token from @BotFather
//! - `gptToken`: OpenAI API key
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use gptbot_core::ConfigStore;
//! use gptbot_telegram::TelegramBot;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(ConfigStore::load(Path::new("config.properties"))?);
//!     let bot = TelegramBot::new(config)?;
//!     bot.start_polling().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Commands
//!
//! Commands start with the configured prefix (default `!`) or `/`:
//!
//! - `gpt <prompt>` - Text completion
//! - `gptImage <prompt>` - Image generation, replies with a URL
//! - `gptRand <value>` - Set randomness (above 0 up to 2.0)
//! - `gptModel <model>` - Switch completion model
//! - `gptConfig` - Show current configuration
//! - `gptHelp` - List commands

pub mod bot;
pub mod error;
pub mod handlers;

pub use bot::TelegramBot;
pub use error::{Result, TelegramError};
pub use handlers::{split_message, strip_bot_mention, ChatReply, MAX_MESSAGE_LEN};
