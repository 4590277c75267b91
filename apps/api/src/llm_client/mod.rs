//! LLM Client — the single point of entry for all Claude API calls in the screener.
//!
//! ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
//! All LLM interactions MUST go through this module.
//!
//! Model: claude-sonnet-4-5 (hardcoded)
//!
//! No retries and no request timeout: a failed call is reported once to the caller,
//! and a hung call hangs the caller.

use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;
pub mod schema;
pub mod sse;

use schema::StructuredOutput;
use sse::{SseDecoder, StreamEvent};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("Invalid structured output: {0}")]
    InvalidOutput(String),

    #[error("Document extraction failed: {0}")]
    Extraction(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Binary or text payload attached to a request block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaSource {
    Base64 { media_type: String, data: String },
    Text { media_type: String, data: String },
}

/// Content block sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RequestBlock {
    Text { text: String },
    Document { source: MediaSource },
    Image { source: MediaSource },
}

impl RequestBlock {
    pub fn text(text: impl Into<String>) -> Self {
        RequestBlock::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicMessage {
    role: Role,
    content: Vec<RequestBlock>,
}

#[derive(Debug, Serialize)]
struct ToolDefinition<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDefinition<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Returns the input of the first call to the named tool.
    pub fn tool_input(&self, tool_name: &str) -> Option<&serde_json::Value> {
        self.content.iter().find_map(|b| match b {
            ContentBlock::ToolUse { name, input } if name == tool_name => Some(input),
            _ => None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// One completed turn of a conversation, replayed to the model as history.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Incremental text pieces of a streamed reply.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The single LLM client used by all services in the screener.
/// Wraps the Anthropic Messages API with structured-output and streaming helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    async fn post(&self, body: &AnthropicRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            // Try to parse error message
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn send_json(&self, body: &AnthropicRequest<'_>) -> Result<LlmResponse, LlmError> {
        let llm_response: LlmResponse = self.post(body).await?.json().await?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        Ok(llm_response)
    }

    /// Calls the LLM with a forced tool whose input schema is derived from `T`,
    /// and deserializes the tool input as `T`.
    ///
    /// Falls back to a JSON text block (fenced or not) if the model answers in text.
    pub async fn call_structured<T: StructuredOutput>(
        &self,
        system: &str,
        blocks: Vec<RequestBlock>,
        tool_name: &str,
        tool_description: &str,
    ) -> Result<T, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: Role::User,
                content: blocks,
            }],
            tools: Some(vec![ToolDefinition {
                name: tool_name,
                description: tool_description,
                input_schema: T::input_schema(),
            }]),
            tool_choice: Some(serde_json::json!({ "type": "tool", "name": tool_name })),
            stream: false,
        };

        let response = self.send_json(&request_body).await?;

        if let Some(input) = response.tool_input(tool_name) {
            return serde_json::from_value(input.clone()).map_err(LlmError::Parse);
        }

        let text = response.text().ok_or(LlmError::EmptyContent)?;
        parse_json_text(text)
    }

    /// Opens a streaming reply for a conversation and yields text increments as they arrive.
    pub async fn stream(&self, system: &str, history: &[ChatTurn]) -> Result<TextStream, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: history
                .iter()
                .map(|turn| AnthropicMessage {
                    role: turn.role,
                    content: vec![RequestBlock::text(turn.text.clone())],
                })
                .collect(),
            tools: None,
            tool_choice: None,
            stream: true,
        };

        let response = self.post(&request_body).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream::try_stream! {
            let mut decoder = SseDecoder::default();
            let mut stopped = false;
            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                for event in decoder.push(&chunk) {
                    match StreamEvent::parse(&event)? {
                        StreamEvent::TextDelta(text) => yield text,
                        StreamEvent::Stop => {
                            stopped = true;
                            break 'outer;
                        }
                        StreamEvent::Error(message) => Err(LlmError::Stream(message))?,
                        StreamEvent::Ignored => {}
                    }
                }
            }
            if !stopped {
                Err(LlmError::Stream("stream ended before message_stop".to_string()))?;
            }
        };

        Ok(stream.boxed())
    }
}

/// Deserializes a JSON text answer, tolerating markdown code fences.
pub fn parse_json_text<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let text = strip_json_fences(text);
    if text.is_empty() {
        return Err(LlmError::EmptyContent);
    }
    serde_json::from_str(text).map_err(LlmError::Parse)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
