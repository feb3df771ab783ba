//! Routing of parsed commands to their actions.
//!
//! Each keyword maps to a [`Command`] variant. Variants that need the
//! completion service run it under the configured timeout and turn any
//! failure into one of the configured reply texts, so a failing request never
//! escapes the handler.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::client::{CompletionClient, CompletionError};
use crate::config::{format_temperature, ConfigStore};
use crate::error::ReplyError;
use crate::models::{default_models, KnownModel};
use crate::parser::{self, normalize_model, normalize_temperature, ParsedCommand, UNIVERSAL_PREFIX};
use crate::reply::ReplyChannel;

pub const KEYWORD_GPT: &str = "gpt";
pub const KEYWORD_RAND: &str = "gptRand";
pub const KEYWORD_MODEL: &str = "gptModel";
pub const KEYWORD_CONFIG: &str = "gptConfig";
pub const KEYWORD_HELP: &str = "gptHelp";
pub const KEYWORD_IMAGE: &str = "gptImage";

/// Reply when the completion service returns only whitespace.
pub const NO_VALID_RESPONSE_REPLY: &str = "A valid response was not generated by OpenAI, \
consider trying again or providing more details";

/// What a command needs in order to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Fixed text, touches nothing.
    Static,
    /// Reads the configuration store.
    ConfigRead,
    /// Writes the configuration store.
    ConfigWrite,
    /// Calls the completion service.
    Completion,
}

/// A recognised bot command with its query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Text completion for the query.
    Gpt(String),
    /// Change the temperature.
    Rand(String),
    /// Change the model.
    Model(String),
    /// Show the current configuration.
    Config,
    /// Show the command list.
    Help,
    /// Image generation for the query.
    Image(String),
}

impl Command {
    /// Map a parsed command to a variant. Keywords are case-sensitive.
    pub fn from_parsed(parsed: ParsedCommand) -> Option<Self> {
        let ParsedCommand { keyword, query } = parsed;
        match keyword.as_str() {
            KEYWORD_GPT => Some(Self::Gpt(query)),
            KEYWORD_RAND => Some(Self::Rand(query)),
            KEYWORD_MODEL => Some(Self::Model(query)),
            KEYWORD_CONFIG => Some(Self::Config),
            KEYWORD_HELP => Some(Self::Help),
            KEYWORD_IMAGE => Some(Self::Image(query)),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Gpt(_) => KEYWORD_GPT,
            Self::Rand(_) => KEYWORD_RAND,
            Self::Model(_) => KEYWORD_MODEL,
            Self::Config => KEYWORD_CONFIG,
            Self::Help => KEYWORD_HELP,
            Self::Image(_) => KEYWORD_IMAGE,
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            Self::Gpt(_) | Self::Image(_) => Capability::Completion,
            Self::Rand(_) | Self::Model(_) => Capability::ConfigWrite,
            Self::Config => Capability::ConfigRead,
            Self::Help => Capability::Static,
        }
    }
}

/// Help text listing every command, using `prefix` in the examples.
pub fn help_text(prefix: char) -> String {
    let rows = [
        (KEYWORD_GPT, "Send a message to gpt, and get a text based reply"),
        (KEYWORD_IMAGE, "Send a message to gpt, and get an image url as a response"),
        (KEYWORD_RAND, "Changes the randomness of the response, above 0.0 up to 2.0"),
        (KEYWORD_MODEL, "Changes the OpenAI model used"),
        (KEYWORD_CONFIG, "Shows current GPT Bot configuration"),
        (KEYWORD_HELP, "Generates list of commands"),
    ];

    let mut text = String::from(
        "GPT Bot interfaces with OpenAI, to deliver interesting chats with a powerful AI.\n\n",
    );
    text.push_str(&format!(
        "both `{}` and `{}` characters can be used to issue commands to the bot.\n",
        prefix, UNIVERSAL_PREFIX
    ));
    for (keyword, description) in rows {
        let name = format!("`{}{}`", prefix, keyword);
        text.push_str(&format!("\t{:<12} {}\n", name, description));
    }
    text
}

/// Turns command messages into reply text.
pub struct CommandDispatcher {
    config: Arc<ConfigStore>,
    client: Arc<dyn CompletionClient>,
    models: Vec<KnownModel>,
}

impl CommandDispatcher {
    /// Create a dispatcher using the default model list.
    pub fn new(config: Arc<ConfigStore>, client: Arc<dyn CompletionClient>) -> Self {
        Self::with_models(config, client, default_models())
    }

    /// Create a dispatcher with an explicit model list.
    pub fn with_models(
        config: Arc<ConfigStore>,
        client: Arc<dyn CompletionClient>,
        models: Vec<KnownModel>,
    ) -> Self {
        Self {
            config,
            client,
            models,
        }
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn models(&self) -> &[KnownModel] {
        &self.models
    }

    /// Produce the reply for `message`, or `None` if it needs no reply.
    pub async fn dispatch(&self, message: &str) -> Option<String> {
        let Some(parsed) = parser::parse(message, self.config.command_prefix()) else {
            trace!("Ignoring non-command message");
            return None;
        };

        let keyword = parsed.keyword.clone();
        let Some(command) = Command::from_parsed(parsed) else {
            debug!(keyword = %keyword, "Unknown command keyword");
            return None;
        };

        info!(
            command = command.keyword(),
            capability = ?command.capability(),
            "Dispatching command"
        );
        Some(self.execute(command).await)
    }

    /// Run a command and return its reply text.
    pub async fn execute(&self, command: Command) -> String {
        match command {
            Command::Gpt(query) => self.complete(&query).await,
            Command::Rand(query) => {
                let temperature = normalize_temperature(&query);
                self.config.set_temperature(temperature).await;
                info!(temperature, "Temperature updated");
                format!(
                    "Randomness was set to {}",
                    format_temperature(self.config.temperature().await)
                )
            }
            Command::Model(query) => {
                let current = self.config.model().await;
                let model = normalize_model(&query, &self.models, &current);
                self.config.set_model(model.as_str()).await;
                info!(model = %model, "Model updated");
                format!("Model was set to {}", self.config.model().await)
            }
            Command::Config => {
                format!("Current Configuration:\n{}", self.config.describe().await)
            }
            Command::Help => help_text(self.config.command_prefix()),
            Command::Image(query) => self.generate_image(&query).await,
        }
    }

    /// Dispatch `message` and send any reply to `channel`.
    ///
    /// Returns whether a reply was sent.
    pub async fn handle_message(
        &self,
        message: &str,
        channel: &dyn ReplyChannel,
    ) -> Result<bool, ReplyError> {
        match self.dispatch(message).await {
            Some(reply) => {
                channel.send(&reply).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn complete(&self, query: &str) -> String {
        let params = self.config.completion_params().await;
        let request = self.client.complete(
            query,
            &params.model,
            params.temperature,
            params.max_tokens,
            &params.personality,
            params.timeout_secs,
        );

        match tokio::time::timeout(Duration::from_secs(params.timeout_secs), request).await {
            Ok(Ok(text)) if text.trim().is_empty() => {
                warn!(model = %params.model, "Completion returned no text");
                NO_VALID_RESPONSE_REPLY.to_string()
            }
            Ok(Ok(text)) => text,
            Ok(Err(e)) => self.failure_reply(KEYWORD_GPT, e),
            Err(_) => self.failure_reply(KEYWORD_GPT, CompletionError::Timeout),
        }
    }

    async fn generate_image(&self, query: &str) -> String {
        let timeout = Duration::from_secs(self.config.api_timeout_secs());
        let request = self.client.generate_image(
            query,
            self.config.image_size(),
            self.config.image_response_format(),
        );

        match tokio::time::timeout(timeout, request).await {
            Ok(Ok(image)) => image,
            Ok(Err(e)) => self.failure_reply(KEYWORD_IMAGE, e),
            Err(_) => self.failure_reply(KEYWORD_IMAGE, CompletionError::Timeout),
        }
    }

    fn failure_reply(&self, keyword: &str, error: CompletionError) -> String {
        warn!(command = keyword, error = %error, "Completion request failed");
        match error {
            CompletionError::NonCompliance(_) => self.config.non_compliance_reply().to_string(),
            _ => self.config.request_failure_reply().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BotSettings, DEFAULT_REQUEST_FAILURE_REPLY};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// How the mock client answers.
    enum Behavior {
        Text(&'static str),
        PolicyViolation,
        NetworkError,
        Hang,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Complete {
            query: String,
            model: String,
            temperature: f64,
            max_tokens: u32,
            personality: String,
            timeout_secs: u64,
        },
        Image {
            query: String,
            size: String,
            response_format: String,
        },
    }

    struct MockClient {
        behavior: Behavior,
        calls: Mutex<Vec<Call>>,
    }

    impl MockClient {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        async fn respond(&self) -> Result<String, CompletionError> {
            match self.behavior {
                Behavior::Text(text) => Ok(text.to_string()),
                Behavior::PolicyViolation => {
                    Err(CompletionError::NonCompliance("rejected".to_string()))
                }
                Behavior::NetworkError => {
                    Err(CompletionError::RequestFailed("connection reset".to_string()))
                }
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    #[async_trait]
    impl CompletionClient for MockClient {
        async fn complete(
            &self,
            query: &str,
            model: &str,
            temperature: f64,
            max_tokens: u32,
            personality: &str,
            timeout_secs: u64,
        ) -> Result<String, CompletionError> {
            self.calls.lock().unwrap().push(Call::Complete {
                query: query.to_string(),
                model: model.to_string(),
                temperature,
                max_tokens,
                personality: personality.to_string(),
                timeout_secs,
            });
            self.respond().await
        }

        async fn generate_image(
            &self,
            query: &str,
            size: &str,
            response_format: &str,
        ) -> Result<String, CompletionError> {
            self.calls.lock().unwrap().push(Call::Image {
                query: query.to_string(),
                size: size.to_string(),
                response_format: response_format.to_string(),
            });
            self.respond().await
        }
    }

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReplyChannel for RecordingChannel {
        async fn send(&self, text: &str) -> Result<(), ReplyError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn dispatcher_with(settings: BotSettings, client: Arc<MockClient>) -> CommandDispatcher {
        CommandDispatcher::new(Arc::new(ConfigStore::new(settings)), client)
    }

    fn dispatcher(client: Arc<MockClient>) -> CommandDispatcher {
        dispatcher_with(BotSettings::default(), client)
    }

    #[test]
    fn test_command_from_keyword() {
        let parsed = |keyword: &str, query: &str| ParsedCommand {
            keyword: keyword.into(),
            query: query.into(),
        };

        assert_eq!(
            Command::from_parsed(parsed("gpt", "hi")),
            Some(Command::Gpt("hi".into()))
        );
        assert_eq!(Command::from_parsed(parsed("gptConfig", "")), Some(Command::Config));
        assert_eq!(Command::from_parsed(parsed("GPT", "hi")), None);
        assert_eq!(Command::from_parsed(parsed("gptrand", "1")), None);
    }

    #[test]
    fn test_command_capabilities() {
        assert_eq!(Command::Gpt(String::new()).capability(), Capability::Completion);
        assert_eq!(Command::Image(String::new()).capability(), Capability::Completion);
        assert_eq!(Command::Rand(String::new()).capability(), Capability::ConfigWrite);
        assert_eq!(Command::Model(String::new()).capability(), Capability::ConfigWrite);
        assert_eq!(Command::Config.capability(), Capability::ConfigRead);
        assert_eq!(Command::Help.capability(), Capability::Static);
    }

    #[tokio::test]
    async fn test_non_command_gets_no_reply() {
        let client = MockClient::new(Behavior::Text("unused"));
        let dispatcher = dispatcher(client.clone());

        assert_eq!(dispatcher.dispatch("gpt hello").await, None);
        assert_eq!(dispatcher.dispatch("").await, None);
        assert_eq!(dispatcher.dispatch("?gpt hello").await, None);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_keyword_gets_no_reply() {
        let client = MockClient::new(Behavior::Text("unused"));
        let dispatcher = dispatcher(client.clone());

        assert_eq!(dispatcher.dispatch("!weather today").await, None);
        assert_eq!(dispatcher.dispatch("!").await, None);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_help_lists_all_commands() {
        let dispatcher = dispatcher(MockClient::new(Behavior::Text("unused")));
        let reply = dispatcher.dispatch("!gptHelp").await.unwrap();

        for keyword in [
            KEYWORD_GPT,
            KEYWORD_RAND,
            KEYWORD_MODEL,
            KEYWORD_CONFIG,
            KEYWORD_HELP,
            KEYWORD_IMAGE,
        ] {
            assert!(reply.contains(&format!("`!{}`", keyword)), "missing {keyword}");
        }
    }

    #[tokio::test]
    async fn test_help_uses_configured_prefix() {
        let dispatcher = dispatcher_with(
            BotSettings {
                command_character: Some('$'),
                ..Default::default()
            },
            MockClient::new(Behavior::Text("unused")),
        );

        let reply = dispatcher.dispatch("/gptHelp").await.unwrap();
        assert!(reply.contains("both `$` and `/`"));
        assert!(reply.contains("`$gptImage`"));
    }

    #[tokio::test]
    async fn test_config_reflects_mutations() {
        let dispatcher = dispatcher(MockClient::new(Behavior::Text("unused")));

        let before = dispatcher.dispatch("!gptConfig").await.unwrap();
        assert_eq!(
            before,
            "Current Configuration:\n\tRandomness:  0.7\n\tToken Limit: 1000\n\tAi Model:    gpt-3.5-turbo\n"
        );

        dispatcher.dispatch("!gptRand 1.3").await;
        dispatcher.dispatch("!gptModel gpt-4").await;

        let after = dispatcher.dispatch("/gptConfig").await.unwrap();
        assert!(after.contains("Randomness:  1.3"));
        assert!(after.contains("Token Limit: 1000"));
        assert!(after.contains("Ai Model:    gpt-4"));
    }

    #[tokio::test]
    async fn test_config_is_idempotent() {
        let dispatcher = dispatcher(MockClient::new(Behavior::Text("unused")));
        let first = dispatcher.dispatch("!gptConfig").await;
        let second = dispatcher.dispatch("!gptConfig").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_rand_sets_temperature() {
        let dispatcher = dispatcher(MockClient::new(Behavior::Text("unused")));

        let reply = dispatcher.dispatch("!gptRand 0.9").await.unwrap();
        assert_eq!(reply, "Randomness was set to 0.9");
        assert_eq!(dispatcher.config().temperature().await, 0.9);
    }

    #[tokio::test]
    async fn test_rand_invalid_falls_back_to_default() {
        let dispatcher = dispatcher(MockClient::new(Behavior::Text("unused")));
        dispatcher.dispatch("!gptRand 1.5").await;

        let reply = dispatcher.dispatch("!gptRand very random").await.unwrap();
        assert_eq!(reply, "Randomness was set to 0.7");
        assert_eq!(dispatcher.config().temperature().await, 0.7);

        let reply = dispatcher.dispatch("!gptRand").await.unwrap();
        assert_eq!(reply, "Randomness was set to 0.7");
    }

    #[tokio::test]
    async fn test_tiny_temperature_shown_in_decimal() {
        let dispatcher = dispatcher(MockClient::new(Behavior::Text("unused")));

        let reply = dispatcher.dispatch("!gptRand 0.00001").await.unwrap();
        assert_eq!(reply, "Randomness was set to 0.00001");

        let reply = dispatcher.dispatch("!gptConfig").await.unwrap();
        assert!(reply.contains("\tRandomness:  0.00001\n"));
    }

    #[tokio::test]
    async fn test_model_switch_and_unknown_model() {
        let dispatcher = dispatcher(MockClient::new(Behavior::Text("unused")));

        let reply = dispatcher.dispatch("!gptModel use gpt-4o please").await.unwrap();
        assert_eq!(reply, "Model was set to gpt-4o");

        let reply = dispatcher.dispatch("!gptModel something-else").await.unwrap();
        assert_eq!(reply, "Model was set to gpt-4o");
        assert_eq!(dispatcher.config().model().await, "gpt-4o");
    }

    #[tokio::test]
    async fn test_model_with_custom_list() {
        let dispatcher = CommandDispatcher::with_models(
            Arc::new(ConfigStore::new(BotSettings::default())),
            MockClient::new(Behavior::Text("unused")),
            vec![KnownModel::new("gpt-3.5-turbo"), KnownModel::new("gpt-4")],
        );

        let reply = dispatcher.dispatch("!gptModel please use gpt-4 now").await.unwrap();
        assert_eq!(reply, "Model was set to gpt-4");
        assert_eq!(dispatcher.models().len(), 2);
    }

    #[tokio::test]
    async fn test_gpt_forwards_current_settings() {
        let client = MockClient::new(Behavior::Text("Rust is a language."));
        let dispatcher = dispatcher_with(
            BotSettings {
                max_tokens: Some(300),
                personality: Some("be nice".into()),
                api_timeout_secs: Some(7),
                ..Default::default()
            },
            client.clone(),
        );
        dispatcher.dispatch("!gptRand 1.1").await;
        dispatcher.dispatch("!gptModel gpt-4").await;

        let reply = dispatcher.dispatch("!gpt what is rust?").await.unwrap();
        assert_eq!(reply, "Rust is a language.");
        assert_eq!(
            client.calls(),
            vec![Call::Complete {
                query: "what is rust?".into(),
                model: "gpt-4".into(),
                temperature: 1.1,
                max_tokens: 300,
                personality: "be nice".into(),
                timeout_secs: 7,
            }]
        );
    }

    #[tokio::test]
    async fn test_gpt_blank_response_gets_guidance() {
        let dispatcher = dispatcher(MockClient::new(Behavior::Text("  \n ")));
        let reply = dispatcher.dispatch("!gpt hello").await.unwrap();
        assert_eq!(reply, NO_VALID_RESPONSE_REPLY);
    }

    #[tokio::test]
    async fn test_gpt_failure_gets_failure_reply() {
        let dispatcher = dispatcher(MockClient::new(Behavior::NetworkError));
        let reply = dispatcher.dispatch("!gpt hello").await.unwrap();
        assert_eq!(reply, DEFAULT_REQUEST_FAILURE_REPLY);
    }

    #[tokio::test]
    async fn test_policy_violation_gets_non_compliance_reply() {
        let dispatcher = dispatcher_with(
            BotSettings {
                non_compliance_reply: Some("not allowed".into()),
                ..Default::default()
            },
            MockClient::new(Behavior::PolicyViolation),
        );

        assert_eq!(dispatcher.dispatch("!gpt bad").await.unwrap(), "not allowed");
        assert_eq!(dispatcher.dispatch("!gptImage bad").await.unwrap(), "not allowed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_gets_failure_reply() {
        let dispatcher = dispatcher_with(
            BotSettings {
                api_timeout_secs: Some(2),
                request_failure_reply: Some("timed out, sorry".into()),
                ..Default::default()
            },
            MockClient::new(Behavior::Hang),
        );

        assert_eq!(dispatcher.dispatch("!gpt slow").await.unwrap(), "timed out, sorry");
        assert_eq!(dispatcher.dispatch("!gptImage slow").await.unwrap(), "timed out, sorry");
    }

    #[tokio::test]
    async fn test_image_uses_image_settings() {
        let client = MockClient::new(Behavior::Text("https://img.example/cat.png"));
        let dispatcher = dispatcher_with(
            BotSettings {
                image_size: Some("512x512".into()),
                ..Default::default()
            },
            client.clone(),
        );

        let reply = dispatcher.dispatch("/gptImage a cat").await.unwrap();
        assert_eq!(reply, "https://img.example/cat.png");
        assert_eq!(
            client.calls(),
            vec![Call::Image {
                query: "a cat".into(),
                size: "512x512".into(),
                response_format: "url".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_handle_message_sends_reply() {
        let dispatcher = dispatcher(MockClient::new(Behavior::Text("pong")));
        let channel = RecordingChannel::default();

        assert!(dispatcher.handle_message("!gpt ping", &channel).await.unwrap());
        assert!(!dispatcher.handle_message("just chatting", &channel).await.unwrap());
        assert_eq!(*channel.sent.lock().unwrap(), vec!["pong".to_string()]);
    }
}
