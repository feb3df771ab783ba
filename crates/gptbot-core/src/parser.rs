//! Parsing of bot commands from raw chat messages.
//!
//! A command is a message whose first character is the configured prefix or
//! `/`, followed by a keyword and an optional query:
//!
//! ```text
//! !gptRand 0.9
//! ^^^^^^^^ ^^^
//! keyword  query
//! ```

use crate::config::{is_valid_temperature, DEFAULT_TEMPERATURE};
use crate::models::KnownModel;

/// Prefix accepted regardless of configuration.
pub const UNIVERSAL_PREFIX: char = '/';

/// Keyword and query extracted from a command message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub keyword: String,
    pub query: String,
}

/// Whether `message` is addressed to the bot.
///
/// Empty and whitespace-only messages are never commands.
pub fn is_command(message: &str, prefix: char) -> bool {
    if message.trim().is_empty() {
        return false;
    }
    matches!(message.chars().next(), Some(c) if c == prefix || c == UNIVERSAL_PREFIX)
}

/// Characters after the prefix up to the first whitespace.
pub fn extract_command_keyword(message: &str) -> String {
    message
        .chars()
        .skip(1)
        .take_while(|c| !c.is_whitespace())
        .collect()
}

/// Text after the first whitespace following the prefix.
///
/// A message without such whitespace has no query and yields an empty string.
pub fn extract_query(message: &str) -> String {
    message
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| message[i + c.len_utf8()..].to_string())
        .unwrap_or_default()
}

/// Parse `message` into a command when it carries a valid prefix.
pub fn parse(message: &str, prefix: char) -> Option<ParsedCommand> {
    if !is_command(message, prefix) {
        return None;
    }
    Some(ParsedCommand {
        keyword: extract_command_keyword(message),
        query: extract_query(message),
    })
}

/// Read a temperature from free text.
///
/// Everything except ASCII digits and `.` is discarded before parsing. Text
/// that does not yield a value in `(0, 2.0]` gives the default temperature.
pub fn normalize_temperature(raw: &str) -> f64 {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    match digits.parse::<f64>() {
        Ok(value) if is_valid_temperature(value) => value,
        _ => DEFAULT_TEMPERATURE,
    }
}

/// Pick the first known model whose id occurs in `raw`, else keep `current`.
pub fn normalize_model(raw: &str, known: &[KnownModel], current: &str) -> String {
    known
        .iter()
        .find(|model| raw.contains(&model.id))
        .map(|model| model.id.clone())
        .unwrap_or_else(|| current.to_string())
}
