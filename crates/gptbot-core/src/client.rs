//! Completion and image-generation client.
//!
//! [`CompletionClient`] is the seam the dispatcher talks to; [`OpenAiClient`]
//! implements it against an OpenAI-compatible HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

/// Error code returned when a prompt is rejected by the content policy.
const CONTENT_POLICY_CODE: &str = "content_policy_violation";

/// Finish reason for completions cut off by the content filter.
const CONTENT_FILTER_FINISH: &str = "content_filter";

/// Errors that can occur while talking to the completion service.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// The request did not finish within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The prompt or output was rejected by the provider's content policy.
    #[error("request rejected by content policy: {0}")]
    NonCompliance(String),

    /// The API answered with a non-success status.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The HTTP request itself failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The response body could not be understood.
    #[error("failed to parse response: {0}")]
    ParseError(String),

    /// No API key was configured.
    #[error("completion API key not set")]
    NoApiKey,
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CompletionError::Timeout
        } else if e.is_decode() {
            CompletionError::ParseError(e.to_string())
        } else {
            CompletionError::RequestFailed(e.to_string())
        }
    }
}

/// A service that turns prompts into text or images.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a text reply to `query`, with `personality` as system prompt.
    async fn complete(
        &self,
        query: &str,
        model: &str,
        temperature: f64,
        max_tokens: u32,
        personality: &str,
        timeout_secs: u64,
    ) -> Result<String, CompletionError>;

    /// Generate one image for `query`; returns its URL or encoded payload.
    async fn generate_image(
        &self,
        query: &str,
        size: &str,
        response_format: &str,
    ) -> Result<String, CompletionError>;
}

/// Client for the OpenAI chat completion and image APIs.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    image_timeout: Duration,
}

impl OpenAiClient {
    /// Create a client for `base_url` (e.g. `https://api.openai.com/v1`).
    ///
    /// `image_timeout_secs` bounds image requests, which carry no timeout of
    /// their own in the trait.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        image_timeout_secs: u64,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            image_timeout: Duration::from_secs(image_timeout_secs),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        timeout: Duration,
    ) -> Result<reqwest::Response, CompletionError> {
        if self.api_key.is_empty() {
            return Err(CompletionError::NoApiKey);
        }

        let response = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(classify_api_error(status.as_u16(), &text))
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        query: &str,
        model: &str,
        temperature: f64,
        max_tokens: u32,
        personality: &str,
        timeout_secs: u64,
    ) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage::new("system", personality),
                ChatMessage::new("user", query),
            ],
            temperature,
            max_tokens,
        };

        trace!("Sending chat request: {:?}", request);

        let response: ChatResponse = self
            .post("chat/completions", &request, Duration::from_secs(timeout_secs))
            .await?
            .json()
            .await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::ParseError("No choices in response".to_string()))?;

        if choice.finish_reason.as_deref() == Some(CONTENT_FILTER_FINISH) {
            return Err(CompletionError::NonCompliance(
                "completion stopped by content filter".to_string(),
            ));
        }

        debug!(model = %model, "Chat completion received");
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn generate_image(
        &self,
        query: &str,
        size: &str,
        response_format: &str,
    ) -> Result<String, CompletionError> {
        let request = ImageRequest {
            prompt: query.to_string(),
            n: 1,
            size: size.to_string(),
            response_format: response_format.to_string(),
        };

        trace!("Sending image request: {:?}", request);

        let response: ImageResponse = self
            .post("images/generations", &request, self.image_timeout)
            .await?
            .json()
            .await?;

        let image = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::ParseError("No image in response".to_string()))?;

        debug!(size = %size, "Image generated");
        image
            .url
            .or(image.b64_json)
            .ok_or_else(|| CompletionError::ParseError("Image has no url or data".to_string()))
    }
}

/// Map an error response body to a [`CompletionError`].
fn classify_api_error(status: u16, body: &str) -> CompletionError {
    let detail = serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .map(|r| r.error);

    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| body.to_string());

    let is_policy = detail
        .as_ref()
        .and_then(|d| d.code.as_deref())
        .map(|code| code == CONTENT_POLICY_CODE)
        .unwrap_or(false)
        || message.contains("safety system");

    if is_policy {
        CompletionError::NonCompliance(message)
    } else {
        CompletionError::Api { status, message }
    }
}

/// Chat completion request.
#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Image generation request.
#[derive(Debug, Clone, Serialize)]
struct ImageRequest {
    prompt: String,
    n: u32,
    size: String,
    response_format: String,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_content_policy_code() {
        let body = r#"{"error":{"message":"Your request was rejected","code":"content_policy_violation"}}"#;
        assert!(matches!(
            classify_api_error(400, body),
            CompletionError::NonCompliance(msg) if msg == "Your request was rejected"
        ));
    }

    #[test]
    fn test_classify_safety_system_message() {
        let body = r#"{"error":{"message":"Your request was rejected as a result of our safety system."}}"#;
        assert!(matches!(
            classify_api_error(400, body),
            CompletionError::NonCompliance(_)
        ));
    }

    #[test]
    fn test_classify_other_errors() {
        let body = r#"{"error":{"message":"Incorrect API key provided","code":"invalid_api_key"}}"#;
        match classify_api_error(401, body) {
            CompletionError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_classify_non_json_body() {
        match classify_api_error(502, "Bad Gateway") {
            CompletionError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatRequest {
            model: "gpt-4".into(),
            messages: vec![
                ChatMessage::new("system", "be brief"),
                ChatMessage::new("user", "hi"),
            ],
            temperature: 0.5,
            max_tokens: 100,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["temperature"], 0.5);
        assert_eq!(json["max_tokens"], 100);
    }

    #[test]
    fn test_image_response_parsing() {
        let body = r#"{"created":1,"data":[{"url":"https://img.example/1.png"}]}"#;
        let parsed: ImageResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].url.as_deref(), Some("https://img.example/1.png"));
        assert!(parsed.data[0].b64_json.is_none());
    }

    #[test]
    fn test_chat_response_parsing() {
        let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"hello"},"finish_reason":"stop"}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = OpenAiClient::new("", "http://127.0.0.1:9", 1);
        let err = client
            .complete("hi", "gpt-4", 0.7, 10, "be brief", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::NoApiKey));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = OpenAiClient::new("key", "https://api.example.com/v1/", 20);
        assert_eq!(client.url("chat/completions"), "https://api.example.com/v1/chat/completions");
    }
}
