//! Startup settings and the shared runtime configuration store.
//!
//! Startup settings are read once from a Java-style `config.properties` file.
//! Keys and values split on the first `=` or `:`, lines starting with `#` or
//! `!` are comments, and values are taken literally (spaces, quotes and `$`
//! included):
//!
//! ```text
//! botToken=123456:ABC
//! gptToken=sk-...
//! commandCharacter=!
//! openAiModel=gpt-3.5-turbo
//! openAiTemperature=0.7
//! openAiMaxTokens=1000
//! openAiImageSize=1024x1024
//! openAiImageResponseFormat=url
//! nonComplianceBotReply=Sorry request does not comply with OpenAI's Content Policy
//! requestFailureBotReply=Something went wrong, try again.
//! botPersonality=You are a helpful chat bot.
//! apiTimeout=20
//! ```
//!
//! Every key is optional as far as this module is concerned; missing keys fall
//! back to the defaults below. Only the model and temperature change after
//! startup, and only through [`ConfigStore::set_model`] and
//! [`ConfigStore::set_temperature`].

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};

/// Name of the startup configuration file.
pub const CONFIG_FILE_NAME: &str = "config.properties";

/// Application directory under the user config directory.
const APP_DIR: &str = "gpt-bot";

pub const KEY_BOT_TOKEN: &str = "botToken";
pub const KEY_GPT_TOKEN: &str = "gptToken";
pub const KEY_COMMAND_CHARACTER: &str = "commandCharacter";
pub const KEY_MAX_TOKENS: &str = "openAiMaxTokens";
pub const KEY_MODEL: &str = "openAiModel";
pub const KEY_TEMPERATURE: &str = "openAiTemperature";
pub const KEY_IMAGE_SIZE: &str = "openAiImageSize";
pub const KEY_IMAGE_RESPONSE_FORMAT: &str = "openAiImageResponseFormat";
pub const KEY_NON_COMPLIANCE_REPLY: &str = "nonComplianceBotReply";
pub const KEY_REQUEST_FAILURE_REPLY: &str = "requestFailureBotReply";
pub const KEY_PERSONALITY: &str = "botPersonality";
pub const KEY_API_TIMEOUT: &str = "apiTimeout";
pub const KEY_BASE_URL: &str = "openAiBaseUrl";

/// Prefix used when `commandCharacter` is not configured.
pub const DEFAULT_COMMAND_CHARACTER: char = '!';

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Temperature used when none is configured or the value is invalid.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Upper bound (inclusive) for a valid temperature.
pub const MAX_TEMPERATURE: f64 = 2.0;

pub const DEFAULT_MAX_TOKENS: u32 = 1000;

pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";

pub const DEFAULT_IMAGE_RESPONSE_FORMAT: &str = "url";

pub const DEFAULT_NON_COMPLIANCE_REPLY: &str =
    "Sorry request does not comply with OpenAI's Content Policy";

pub const DEFAULT_REQUEST_FAILURE_REPLY: &str = "A failure to retrieve a response occurred, \
please try again or add more details to your query.";

pub const DEFAULT_PERSONALITY: &str = "you are a rude chat bot, and will never apologize \
or be polite. Always answer questions factually, with a rude comment back at the user";

/// Seconds to wait on a completion or image request.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 20;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Whether `value` lies in the accepted temperature range `(0, 2.0]`.
pub fn is_valid_temperature(value: f64) -> bool {
    value > 0.0 && value <= MAX_TEMPERATURE
}

/// Render a temperature in plain decimal notation with at least one decimal
/// place (`1.0`, `0.7`, `0.00001`).
pub fn format_temperature(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Get the config file in the user config directory (`<config_dir>/gpt-bot/`).
pub fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE_NAME))
}

/// Locate the startup configuration file.
///
/// Looks in order for:
/// 1. `config.properties` next to the running executable
/// 2. `config.properties` in the user config directory
/// 3. `config.properties` in the current directory (returned even if absent)
pub fn default_config_file() -> PathBuf {
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE_NAME)));

    beside_exe
        .filter(|p| p.exists())
        .or_else(|| user_config_file().filter(|p| p.exists()))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Immutable settings loaded once at startup.
///
/// Fields are `None` when the key was absent or blank in the source; the
/// [`ConfigStore`] getters supply defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotSettings {
    pub bot_token: Option<String>,
    pub gpt_token: Option<String>,
    pub command_character: Option<char>,
    pub max_tokens: Option<u32>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub image_size: Option<String>,
    pub image_response_format: Option<String>,
    pub non_compliance_reply: Option<String>,
    pub request_failure_reply: Option<String>,
    pub personality: Option<String>,
    pub api_timeout_secs: Option<u64>,
    pub base_url: Option<String>,
}

impl BotSettings {
    /// Build settings from key/value pairs.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] when a numeric key holds a value
    /// that is not a non-negative integer, or when `apiTimeout` is zero.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut settings = Self::default();

        for (key, value) in pairs {
            let value = value.trim().to_string();
            if value.is_empty() {
                debug!(key = %key, "Blank configuration value, using default");
                continue;
            }

            match key.as_str() {
                KEY_BOT_TOKEN => settings.bot_token = Some(value),
                KEY_GPT_TOKEN => settings.gpt_token = Some(value),
                KEY_COMMAND_CHARACTER => settings.command_character = value.chars().next(),
                KEY_MAX_TOKENS => settings.max_tokens = Some(parse_number(KEY_MAX_TOKENS, &value)?),
                KEY_MODEL => settings.model = Some(value),
                KEY_TEMPERATURE => {
                    settings.temperature = match value.parse::<f64>() {
                        Ok(t) if is_valid_temperature(t) => Some(t),
                        _ => {
                            warn!(value = %value, "Invalid openAiTemperature, using default");
                            None
                        }
                    }
                }
                KEY_IMAGE_SIZE => settings.image_size = Some(value),
                KEY_IMAGE_RESPONSE_FORMAT => settings.image_response_format = Some(value),
                KEY_NON_COMPLIANCE_REPLY => settings.non_compliance_reply = Some(value),
                KEY_REQUEST_FAILURE_REPLY => settings.request_failure_reply = Some(value),
                KEY_PERSONALITY => settings.personality = Some(value),
                KEY_API_TIMEOUT => match parse_number(KEY_API_TIMEOUT, &value)? {
                    0 => {
                        return Err(ConfigError::InvalidValue {
                            key: KEY_API_TIMEOUT,
                            value,
                        })
                    }
                    secs => settings.api_timeout_secs = Some(secs),
                },
                KEY_BASE_URL => settings.base_url = Some(value.trim_end_matches('/').to_string()),
                _ => debug!(key = %key, "Ignoring unknown configuration key"),
            }
        }

        Ok(settings)
    }

    /// Read settings from any properties source.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let properties = java_properties::read(reader)?;
        Self::from_pairs(properties)
    }

    /// Read settings from a file on disk.
    ///
    /// # Errors
    /// A missing or unreadable file is an error; the caller is expected to
    /// abort startup.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let properties = java_properties::read(BufReader::new(file))?;

        info!(path = %path.display(), keys = properties.len(), "Loaded startup configuration");
        Self::from_pairs(properties)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

/// Parameters for one completion request, read from the store in one go.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub personality: String,
    pub timeout_secs: u64,
}

/// Runtime configuration shared by all message handlers.
///
/// The model and temperature sit behind their own locks so each get/set is
/// atomic; concurrent writers resolve last-writer-wins.
#[derive(Debug)]
pub struct ConfigStore {
    settings: BotSettings,
    model: RwLock<Option<String>>,
    temperature: RwLock<Option<f64>>,
}

impl ConfigStore {
    /// Create a store seeded from startup settings.
    pub fn new(settings: BotSettings) -> Self {
        let model = RwLock::new(settings.model.clone());
        let temperature = RwLock::new(settings.temperature);
        Self {
            settings,
            model,
            temperature,
        }
    }

    /// Load startup settings from `path` and build a store.
    pub fn load(path: &Path) -> Result<Self> {
        BotSettings::from_file(path).map(Self::new)
    }

    pub fn bot_token(&self) -> Option<&str> {
        self.settings.bot_token.as_deref()
    }

    pub fn gpt_token(&self) -> Option<&str> {
        self.settings.gpt_token.as_deref()
    }

    /// Configured command prefix. `/` is accepted in addition to this.
    pub fn command_prefix(&self) -> char {
        self.settings
            .command_character
            .unwrap_or(DEFAULT_COMMAND_CHARACTER)
    }

    pub fn max_tokens(&self) -> u32 {
        self.settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn image_size(&self) -> &str {
        self.settings.image_size.as_deref().unwrap_or(DEFAULT_IMAGE_SIZE)
    }

    pub fn image_response_format(&self) -> &str {
        self.settings
            .image_response_format
            .as_deref()
            .unwrap_or(DEFAULT_IMAGE_RESPONSE_FORMAT)
    }

    /// Reply used when a request violates the provider's content policy.
    pub fn non_compliance_reply(&self) -> &str {
        self.settings
            .non_compliance_reply
            .as_deref()
            .unwrap_or(DEFAULT_NON_COMPLIANCE_REPLY)
    }

    /// Reply used when a request fails for any other reason.
    pub fn request_failure_reply(&self) -> &str {
        self.settings
            .request_failure_reply
            .as_deref()
            .unwrap_or(DEFAULT_REQUEST_FAILURE_REPLY)
    }

    /// System prompt sent with every completion.
    pub fn personality(&self) -> &str {
        self.settings.personality.as_deref().unwrap_or(DEFAULT_PERSONALITY)
    }

    pub fn api_timeout_secs(&self) -> u64 {
        self.settings.api_timeout_secs.unwrap_or(DEFAULT_API_TIMEOUT_SECS)
    }

    pub fn base_url(&self) -> &str {
        self.settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Current completion model.
    pub async fn model(&self) -> String {
        self.model
            .read()
            .await
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    /// Replace the completion model. No validation happens here.
    pub async fn set_model(&self, model: impl Into<String>) {
        *self.model.write().await = Some(model.into());
    }

    /// Current temperature.
    pub async fn temperature(&self) -> f64 {
        self.temperature.read().await.unwrap_or(DEFAULT_TEMPERATURE)
    }

    /// Replace the temperature. No validation happens here.
    pub async fn set_temperature(&self, temperature: f64) {
        *self.temperature.write().await = Some(temperature);
    }

    /// Snapshot of everything a completion request needs.
    pub async fn completion_params(&self) -> CompletionParams {
        CompletionParams {
            model: self.model().await,
            temperature: self.temperature().await,
            max_tokens: self.max_tokens(),
            personality: self.personality().to_string(),
            timeout_secs: self.api_timeout_secs(),
        }
    }

    /// Human readable dump of the values users can inspect.
    pub async fn describe(&self) -> String {
        format!(
            "\tRandomness:  {}\n\tToken Limit: {}\n\tAi Model:    {}\n",
            format_temperature(self.temperature().await),
            self.max_tokens(),
            self.model().await
        )
    }
}
