//! GPT Bot Core - command parsing, dispatch and runtime configuration.
//!
//! This crate holds everything the bot does between receiving a chat message
//! and handing back a reply, independent of the chat platform:
//!
//! - **config**: Startup settings and the shared [`ConfigStore`]
//! - **parser**: Recognise commands and extract keyword and query
//! - **models**: Known completion models for `gptModel`
//! - **dispatcher**: Route commands to actions and format replies
//! - **client**: Completion/image client trait and OpenAI implementation
//! - **reply**: Trait the chat gateway implements to receive replies
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use gptbot_core::{CommandDispatcher, ConfigStore, OpenAiClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(ConfigStore::load(Path::new("config.properties"))?);
//! let client = OpenAiClient::new(
//!     config.gpt_token().unwrap_or_default(),
//!     config.base_url(),
//!     config.api_timeout_secs(),
//! );
//! let dispatcher = CommandDispatcher::new(config, Arc::new(client));
//!
//! if let Some(reply) = dispatcher.dispatch("!gptConfig").await {
//!     println!("{}", reply);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod parser;
pub mod reply;

pub use client::{CompletionClient, CompletionError, OpenAiClient};
pub use config::{default_config_file, BotSettings, CompletionParams, ConfigStore};
pub use dispatcher::{help_text, Capability, Command, CommandDispatcher};
pub use error::{ConfigError, ReplyError, Result};
pub use models::{default_models, KnownModel};
pub use parser::{
    extract_command_keyword, extract_query, is_command, normalize_model, normalize_temperature,
    parse, ParsedCommand,
};
pub use reply::ReplyChannel;
