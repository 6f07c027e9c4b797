//! Anthropic Messages API streaming provider

use super::stream::{LlmEventStream, LlmStreamEvent, MessageAssembler};
use super::types::{
    ContentBlock, LlmMessage, LlmRequest, MessageRole, StopReason, ThinkingConfig, Usage,
};
use super::{LlmError, LlmService};
use crate::config::LlmConfig;
use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use reqwest_eventsource::{retry, Event, EventSource};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Smallest reasoning budget the API accepts
const MIN_THINKING_BUDGET: u32 = 1024;

/// Anthropic service implementation
pub struct AnthropicService {
    client: Client,
    api_key: String,
    url: String,
    model: String,
}

impl AnthropicService {
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            url: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }

    fn translate_request(&self, request: &LlmRequest) -> AnthropicRequest {
        let system: Vec<AnthropicSystemBlock> = request
            .system
            .iter()
            .map(|s| AnthropicSystemBlock {
                r#type: "text",
                text: s.text.clone(),
                cache_control: s.cache.then_some(CacheControl { r#type: "ephemeral" }),
            })
            .collect();

        let messages: Vec<AnthropicMessage> =
            request.messages.iter().map(translate_message).collect();

        let tools: Vec<AnthropicTool> = request
            .tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect();

        let mut max_tokens = request.max_tokens.unwrap_or(4096);
        let thinking = request.thinking.map(|ThinkingConfig { budget_tokens }| {
            let budget_tokens = budget_tokens.max(MIN_THINKING_BUDGET);
            // The budget counts against max_tokens and must leave room for the answer
            max_tokens = max_tokens.max(budget_tokens + MIN_THINKING_BUDGET);
            AnthropicThinking {
                r#type: "enabled",
                budget_tokens,
            }
        });

        AnthropicRequest {
            model: self.model.clone(),
            max_tokens,
            system,
            messages,
            tools: if tools.is_empty() { None } else { Some(tools) },
            thinking,
            stream: true,
        }
    }
}

fn translate_message(msg: &LlmMessage) -> AnthropicMessage {
    let role = match msg.role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    };

    let content = msg
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
            ContentBlock::Thinking {
                thinking,
                signature,
            } => AnthropicContentBlock::Thinking {
                thinking: thinking.clone(),
                signature: signature.clone(),
            },
            ContentBlock::RedactedThinking { data } => {
                AnthropicContentBlock::RedactedThinking { data: data.clone() }
            }
            ContentBlock::ToolUse { id, name, input } => AnthropicContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => AnthropicContentBlock::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content.clone(),
                is_error: *is_error,
            },
        })
        .collect();

    AnthropicMessage { role, content }
}

fn classify_error(status: reqwest::StatusCode, body: &str) -> LlmError {
    // Prefer the provider's own message when the body is the usual error envelope
    let message = serde_json::from_str::<ErrorEvent>(body)
        .map_or_else(|_| body.to_string(), |e| e.error.message);

    match status.as_u16() {
        401 | 403 => LlmError::auth(format!("Authentication failed: {message}")),
        429 => LlmError::rate_limit(format!("Rate limited: {message}")),
        400 => LlmError::invalid_request(format!("Invalid request: {message}")),
        500..=599 => LlmError::server_error(format!("Server error: {message}")),
        _ => LlmError::unknown(format!("HTTP {status}: {message}")),
    }
}

fn classify_stream_error(error: &ApiError) -> LlmError {
    let message = format!("Provider error ({}): {}", error.r#type, error.message);
    match error.r#type.as_str() {
        "overloaded_error" | "api_error" => LlmError::server_error(message),
        "rate_limit_error" => LlmError::rate_limit(message),
        "authentication_error" | "permission_error" => LlmError::auth(message),
        "invalid_request_error" => LlmError::invalid_request(message),
        _ => LlmError::unknown(message),
    }
}

fn parse<T: DeserializeOwned>(event: &str, data: &str) -> Result<T, LlmError> {
    serde_json::from_str(data)
        .map_err(|e| LlmError::protocol(format!("Malformed {event} event: {e}")))
}

/// Decodes Anthropic stream events into normalized events
#[derive(Debug, Default)]
struct StreamDecoder {
    assembler: MessageAssembler,
    stop_reason: Option<StopReason>,
    usage: Usage,
}

impl StreamDecoder {
    #[allow(clippy::too_many_lines)]
    fn decode(&mut self, event: &str, data: &str) -> Result<Option<LlmStreamEvent>, LlmError> {
        match event {
            "message_start" => {
                let start: MessageStartEvent = parse(event, data)?;
                let usage = start.message.usage;
                self.usage.input_tokens = usage.input_tokens;
                self.usage.output_tokens = usage.output_tokens;
                self.usage.cache_creation_tokens =
                    usage.cache_creation_input_tokens.unwrap_or(0);
                self.usage.cache_read_tokens = usage.cache_read_input_tokens.unwrap_or(0);
                Ok(None)
            }
            "content_block_start" => {
                let start: ContentBlockStartEvent = parse(event, data)?;
                let index = start.index;
                Ok(match start.content_block {
                    BlockStart::Text { text } => {
                        self.assembler.start_text(index, &text)?;
                        (!text.is_empty()).then_some(LlmStreamEvent::TextDelta { text })
                    }
                    BlockStart::Thinking { thinking } => {
                        self.assembler.start_thinking(index, &thinking)?;
                        (!thinking.is_empty()).then_some(LlmStreamEvent::ThinkingDelta { thinking })
                    }
                    BlockStart::RedactedThinking { data } => {
                        self.assembler.start_redacted_thinking(index, data)?;
                        None
                    }
                    BlockStart::ToolUse { id, name } => {
                        self.assembler.start_tool_use(index, &id, &name)?;
                        Some(LlmStreamEvent::ToolUseStart { id, name })
                    }
                    BlockStart::Other => None,
                })
            }
            "content_block_delta" => {
                let delta: ContentBlockDeltaEvent = parse(event, data)?;
                let index = delta.index;
                let accepted = match &delta.delta {
                    BlockDelta::TextDelta { text } => self.assembler.push_text(index, text),
                    BlockDelta::ThinkingDelta { thinking } => {
                        self.assembler.push_thinking(index, thinking)
                    }
                    BlockDelta::SignatureDelta { signature } => {
                        self.assembler.push_signature(index, signature)
                    }
                    BlockDelta::InputJsonDelta { partial_json } => {
                        self.assembler.push_input_json(index, partial_json)
                    }
                    BlockDelta::Other => true,
                };
                if !accepted {
                    return Err(LlmError::protocol(format!(
                        "Delta for content block {index} does not match its type"
                    )));
                }
                Ok(match delta.delta {
                    BlockDelta::TextDelta { text } => Some(LlmStreamEvent::TextDelta { text }),
                    BlockDelta::ThinkingDelta { thinking } => {
                        Some(LlmStreamEvent::ThinkingDelta { thinking })
                    }
                    _ => None,
                })
            }
            "message_delta" => {
                let delta: MessageDeltaEvent = parse(event, data)?;
                if let Some(reason) = delta.delta.stop_reason.as_deref() {
                    self.stop_reason = Some(StopReason::from_api(reason));
                }
                if let Some(usage) = delta.usage {
                    self.usage.output_tokens = usage.output_tokens;
                }
                Ok(None)
            }
            "message_stop" => {
                let message = std::mem::take(&mut self.assembler).finish()?;
                Ok(Some(LlmStreamEvent::TurnFinished {
                    message,
                    stop_reason: self.stop_reason.unwrap_or(StopReason::Other),
                    usage: self.usage.clone(),
                }))
            }
            "error" => {
                let error: ErrorEvent = parse(event, data)?;
                Err(classify_stream_error(&error.error))
            }
            // ping, content_block_stop
            _ => Ok(None),
        }
    }
}

/// Forward decoded events as they arrive; no retries, no buffering
fn event_stream(
    mut source: EventSource,
) -> impl Stream<Item = Result<LlmStreamEvent, LlmError>> + Send {
    stream! {
        let mut decoder = StreamDecoder::default();

        while let Some(next) = source.next().await {
            let message = match next {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => message,
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    let body = response.text().await.unwrap_or_default();
                    source.close();
                    yield Err(classify_error(status, &body));
                    return;
                }
                Err(e) => {
                    source.close();
                    yield Err(LlmError::network(format!("Stream failed: {e}")));
                    return;
                }
            };

            match decoder.decode(&message.event, &message.data) {
                Ok(Some(event)) => {
                    let finished = event.is_terminal();
                    yield Ok(event);
                    if finished {
                        source.close();
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    source.close();
                    yield Err(e);
                    return;
                }
            }
        }

        tracing::warn!("Anthropic stream closed before message_stop");
    }
}

#[async_trait]
impl LlmService for AnthropicService {
    async fn stream(&self, request: &LlmRequest) -> Result<LlmEventStream, LlmError> {
        let body = self.translate_request(request);

        let builder = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        let mut source = EventSource::new(builder)
            .map_err(|e| LlmError::invalid_request(format!("Failed to build request: {e}")))?;
        source.set_retry_policy(Box::new(retry::Never));

        Ok(Box::pin(event_stream(source)))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: Vec<AnthropicSystemBlock>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<AnthropicThinking>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicSystemBlock {
    r#type: &'static str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Debug, Serialize)]
struct CacheControl {
    r#type: &'static str,
}

#[derive(Debug, Serialize)]
struct AnthropicThinking {
    r#type: &'static str,
    budget_tokens: u32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    RedactedThinking {
        data: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MessageStartEvent {
    message: MessageStartBody,
}

#[derive(Debug, Deserialize)]
struct MessageStartBody {
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    cache_creation_input_tokens: Option<u64>,
    cache_read_input_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockStartEvent {
    index: usize,
    content_block: BlockStart,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockStart {
    Text {
        #[serde(default)]
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    RedactedThinking {
        data: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDeltaEvent {
    index: usize,
    delta: BlockDelta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaEvent {
    delta: MessageDelta,
    usage: Option<DeltaUsage>,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeltaUsage {
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEvent {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    r#type: String,
    message: String,
}
