//! Message handling for the Telegram bot.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use gptbot_core::{CommandDispatcher, ReplyChannel, ReplyError};
use teloxide::prelude::*;
use tracing::{debug, error, info, warn};

/// Maximum characters Telegram accepts in one message.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Replies into the chat a message came from.
pub struct ChatReply {
    bot: Bot,
    chat_id: ChatId,
}

impl ChatReply {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl ReplyChannel for ChatReply {
    async fn send(&self, text: &str) -> Result<(), ReplyError> {
        let chunks = split_message(text, MAX_MESSAGE_LEN);
        if chunks.is_empty() {
            warn!(chat_id = %self.chat_id, "Skipping empty reply");
            return Ok(());
        }

        for chunk in chunks {
            self.bot
                .send_message(self.chat_id, chunk)
                .await
                .map_err(|e| ReplyError::Delivery(e.to_string()))?;
        }
        Ok(())
    }
}

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Pieces break after the last newline inside the limit when there is one,
/// otherwise exactly at the limit. Blank text yields no pieces.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.trim().is_empty() || max_chars == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        let limit = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());

        match rest[..limit].rfind('\n') {
            Some(newline) if newline > 0 => {
                chunks.push(rest[..newline].to_string());
                rest = &rest[newline + 1..];
            }
            _ => {
                chunks.push(rest[..limit].to_string());
                rest = &rest[limit..];
            }
        }
    }

    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Remove a `@botname` suffix from the command keyword.
///
/// Telegram clients append the bot's username to commands in group chats
/// (`/gpt@MyBot hello`). Mentions of other bots are left untouched so those
/// commands stay unrecognised.
pub fn strip_bot_mention<'a>(text: &'a str, username: &str) -> Cow<'a, str> {
    if username.is_empty() {
        return Cow::Borrowed(text);
    }

    let head_end = text.find(char::is_whitespace).unwrap_or(text.len());
    let head = &text[..head_end];

    match head.rfind('@') {
        Some(at) if head[at + 1..].eq_ignore_ascii_case(username) => {
            Cow::Owned(format!("{}{}", &head[..at], &text[head_end..]))
        }
        _ => Cow::Borrowed(text),
    }
}

/// Handle one incoming message.
///
/// Delivery failures are logged and swallowed so one chat cannot stop the
/// dispatcher for the others.
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    dispatcher: Arc<CommandDispatcher>,
    username: &str,
) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    debug!(chat_id = %msg.chat.id, text = %text, "Message received");

    let text = strip_bot_mention(text, username);
    let channel = ChatReply::new(bot, msg.chat.id);

    match dispatcher.handle_message(&text, &channel).await {
        Ok(true) => info!(chat_id = %msg.chat.id, "Reply sent"),
        Ok(false) => {}
        Err(e) => error!(chat_id = %msg.chat.id, error = %e, "Failed to send reply"),
    }

    Ok(())
}
