//! Main Telegram bot implementation.

use std::sync::Arc;

use gptbot_core::{CommandDispatcher, ConfigStore, OpenAiClient};
use teloxide::prelude::*;
use tracing::{info, trace};

use crate::error::{Result, TelegramError};
use crate::handlers::handle_message;

/// The Telegram front end for GPT Bot.
pub struct TelegramBot {
    /// The teloxide bot instance.
    bot: Bot,
    /// Command dispatcher shared by all message handlers.
    dispatcher: Arc<CommandDispatcher>,
}

impl TelegramBot {
    /// Create a bot from the loaded configuration.
    ///
    /// Requires `botToken` and `gptToken` to be configured.
    pub fn new(config: Arc<ConfigStore>) -> Result<Self> {
        let token = config.bot_token().ok_or(TelegramError::NoToken)?.to_string();
        let api_key = config.gpt_token().ok_or(TelegramError::NoApiToken)?;

        let client = OpenAiClient::new(api_key, config.base_url(), config.api_timeout_secs());
        let dispatcher = CommandDispatcher::new(Arc::clone(&config), Arc::new(client));

        Ok(Self::with_dispatcher(token, Arc::new(dispatcher)))
    }

    /// Create a bot around an existing dispatcher (for testing).
    pub fn with_dispatcher(token: impl Into<String>, dispatcher: Arc<CommandDispatcher>) -> Self {
        Self {
            bot: Bot::new(token),
            dispatcher,
        }
    }

    /// The dispatcher messages are routed through.
    pub fn dispatcher(&self) -> &Arc<CommandDispatcher> {
        &self.dispatcher
    }

    /// Get the bot's username.
    pub async fn get_me(&self) -> Result<String> {
        let me = self.bot.get_me().await?;
        Ok(me.username().to_string())
    }

    /// Start the bot in polling mode and run until interrupted.
    pub async fn start_polling(&self) -> Result<()> {
        let username: Arc<str> = Arc::from(self.get_me().await?);
        info!(username = %username, "Logged in as {}", username);

        let dispatcher = Arc::clone(&self.dispatcher);
        let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
            let dispatcher = Arc::clone(&dispatcher);
            let username = Arc::clone(&username);
            async move { handle_message(bot, msg, dispatcher, &username).await }
        });

        info!(
            prefix = %self.dispatcher.config().command_prefix(),
            "Bot is running"
        );

        Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|upd| async move {
                trace!("Unhandled update: {:?}", upd);
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        info!("Bot stopped");
        Ok(())
    }
}
