//! Mock implementations for testing
//!
//! These mocks enable exchange-level testing without network I/O.

use super::traits::*;
use crate::events::StreamEvent;
use crate::fpl::fixtures;
use crate::llm::{
    ContentBlock, LlmConnector, LlmError, LlmEventStream, LlmMessage, LlmRequest, LlmService,
    LlmStreamEvent, StopReason, ToolDefinition, Usage,
};
use crate::tools::{ToolContext, ToolError};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// One scripted generation call
enum ScriptedTurn {
    /// Yield these items, then end the stream
    Events(Vec<Result<LlmStreamEvent, LlmError>>),
    /// The call fails before any stream exists
    StartError(LlmError),
    /// Yield these items, then never finish
    Hang(Vec<LlmStreamEvent>),
}

/// Mock provider that plays back queued turns
pub struct MockLlmClient {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

fn finished(content: Vec<ContentBlock>, stop_reason: StopReason) -> LlmStreamEvent {
    LlmStreamEvent::TurnFinished {
        message: LlmMessage::assistant(content),
        stop_reason,
        usage: Usage::default(),
    }
}

fn text_deltas<'a>(chunks: &'a [&'a str]) -> impl Iterator<Item = LlmStreamEvent> + 'a {
    chunks.iter().map(|c| LlmStreamEvent::TextDelta {
        text: (*c).to_string(),
    })
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            turns: Mutex::new(VecDeque::new()),
            model_id: "mock-model".to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, turn: ScriptedTurn) {
        self.turns.lock().unwrap().push_back(turn);
    }

    /// A plain answer streamed in chunks, ending the exchange
    pub fn queue_text(&self, chunks: &[&str]) {
        let mut events: Vec<_> = text_deltas(chunks).map(Ok).collect();
        events.push(Ok(finished(
            vec![ContentBlock::text(chunks.concat())],
            StopReason::EndTurn,
        )));
        self.push(ScriptedTurn::Events(events));
    }

    /// A reasoning block followed by an answer
    pub fn queue_with_thinking(&self, thinking: &str, text: &str) {
        self.push(ScriptedTurn::Events(vec![
            Ok(LlmStreamEvent::ThinkingDelta {
                thinking: thinking.to_string(),
            }),
            Ok(LlmStreamEvent::TextDelta {
                text: text.to_string(),
            }),
            Ok(finished(
                vec![
                    ContentBlock::Thinking {
                        thinking: thinking.to_string(),
                        signature: Some("mock-signature".to_string()),
                    },
                    ContentBlock::text(text),
                ],
                StopReason::EndTurn,
            )),
        ]));
    }

    /// A turn requesting the given tool calls
    pub fn queue_tool_calls(&self, calls: &[(&str, &str, Value)]) {
        let mut events: Vec<_> = calls
            .iter()
            .map(|(id, name, _)| {
                Ok(LlmStreamEvent::ToolUseStart {
                    id: (*id).to_string(),
                    name: (*name).to_string(),
                })
            })
            .collect();
        let content = calls
            .iter()
            .map(|(id, name, input)| ContentBlock::tool_use(*id, *name, input.clone()))
            .collect();
        events.push(Ok(finished(content, StopReason::ToolUse)));
        self.push(ScriptedTurn::Events(events));
    }

    /// Deltas and then the stream just ends
    pub fn queue_truncated(&self, chunks: &[&str]) {
        self.push(ScriptedTurn::Events(text_deltas(chunks).map(Ok).collect()));
    }

    /// Deltas and then a terminal stream error
    pub fn queue_stream_error(&self, chunks: &[&str], error: LlmError) {
        let mut events: Vec<_> = text_deltas(chunks).map(Ok).collect();
        events.push(Err(error));
        self.push(ScriptedTurn::Events(events));
    }

    pub fn queue_start_error(&self, error: LlmError) {
        self.push(ScriptedTurn::StartError(error));
    }

    /// Deltas and then silence, for cancellation tests
    pub fn queue_hang(&self, chunks: &[&str]) {
        self.push(ScriptedTurn::Hang(text_deltas(chunks).collect()));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn stream(&self, request: &LlmRequest) -> Result<LlmEventStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let turn = self.turns.lock().unwrap().pop_front();
        match turn {
            Some(ScriptedTurn::Events(events)) => Ok(Box::pin(stream::iter(events))),
            Some(ScriptedTurn::StartError(error)) => Err(error),
            Some(ScriptedTurn::Hang(events)) => Ok(Box::pin(
                stream::iter(events.into_iter().map(Ok)).chain(stream::pending()),
            )),
            None => Err(LlmError::unknown("No mock turn queued")),
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl LlmService for MockLlmClient {
    async fn stream(&self, request: &LlmRequest) -> Result<LlmEventStream, LlmError> {
        LlmClient::stream(self, request).await
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Connector handing out one shared mock, recording the keys it was given
pub struct MockConnector {
    pub llm: Arc<MockLlmClient>,
    pub api_keys: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new(llm: Arc<MockLlmClient>) -> Self {
        Self {
            llm,
            api_keys: Mutex::new(Vec::new()),
        }
    }
}

impl LlmConnector for MockConnector {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn LlmService>, LlmError> {
        self.api_keys.lock().unwrap().push(api_key.to_string());
        Ok(Arc::clone(&self.llm) as Arc<dyn LlmService>)
    }
}

// ============================================================================
// Mock Tool Executor
// ============================================================================

#[derive(Clone)]
enum MockBehaviour {
    Succeed(Value),
    Fail(String),
    Panic,
    Delay(Duration, Value),
}

/// Mock tool executor with predefined outcomes
pub struct MockToolExecutor {
    behaviours: HashMap<String, MockBehaviour>,
    definitions: Vec<ToolDefinition>,
    /// Record of tool executions
    pub executions: Mutex<Vec<(String, Value)>>,
}

impl MockToolExecutor {
    pub fn new() -> Self {
        Self {
            behaviours: HashMap::new(),
            definitions: Vec::new(),
            executions: Mutex::new(Vec::new()),
        }
    }

    fn with(mut self, name: &str, behaviour: MockBehaviour) -> Self {
        self.definitions.push(ToolDefinition {
            name: name.to_string(),
            description: format!("Mock {name}"),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        });
        self.behaviours.insert(name.to_string(), behaviour);
        self
    }

    pub fn with_result(self, name: &str, result: Value) -> Self {
        self.with(name, MockBehaviour::Succeed(result))
    }

    pub fn with_error(self, name: &str, message: &str) -> Self {
        self.with(name, MockBehaviour::Fail(message.to_string()))
    }

    pub fn with_panic(self, name: &str) -> Self {
        self.with(name, MockBehaviour::Panic)
    }

    pub fn with_delay(self, name: &str, delay: Duration, result: Value) -> Self {
        self.with(name, MockBehaviour::Delay(delay, result))
    }

    /// Get recorded executions
    pub fn recorded_executions(&self) -> Vec<(String, Value)> {
        self.executions.lock().unwrap().clone()
    }
}

impl Default for MockToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn execute(
        &self,
        name: &str,
        input: Value,
        _ctx: ToolContext,
    ) -> Result<Value, ToolError> {
        self.executions
            .lock()
            .unwrap()
            .push((name.to_string(), input));

        let behaviour = self.behaviours.get(name).cloned();
        match behaviour {
            Some(MockBehaviour::Succeed(value)) => Ok(value),
            Some(MockBehaviour::Fail(message)) => Err(ToolError::Upstream(message)),
            Some(MockBehaviour::Panic) => panic!("mock tool exploded"),
            Some(MockBehaviour::Delay(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            None => Err(ToolError::UnknownTool(name.to_string())),
        }
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.definitions.clone()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Tool context with fixture season data and a fresh cancel token
pub fn test_tool_context() -> ToolContext {
    ToolContext::with_bootstrap(None, fixtures::bootstrap())
}

/// Drain an SSE payload channel until the sender side closes
pub async fn collect_frames(mut rx: mpsc::Receiver<String>) -> Vec<StreamEvent> {
    let mut frames = Vec::new();
    while let Some(payload) = rx.recv().await {
        frames.push(serde_json::from_str(&payload).unwrap());
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> LlmRequest {
        LlmRequest {
            system: vec![],
            messages: vec![],
            tools: vec![],
            max_tokens: None,
            thinking: None,
        }
    }

    #[tokio::test]
    async fn test_mock_llm_plays_turns_in_order() {
        let llm = MockLlmClient::new();
        llm.queue_text(&["a", "b"]);
        llm.queue_start_error(LlmError::rate_limit("slow down"));

        let events: Vec<_> = LlmClient::stream(&llm, &request())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(events.len(), 3);
        assert!(events[2].as_ref().unwrap().is_terminal());

        let Err(err) = LlmClient::stream(&llm, &request()).await else {
            panic!("expected start error");
        };
        assert_eq!(err.message, "slow down");

        // Nothing queued
        assert!(LlmClient::stream(&llm, &request()).await.is_err());
        assert_eq!(llm.recorded_requests().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_tool_executor() {
        let tools = MockToolExecutor::new()
            .with_result("search_players", json!({"players": []}))
            .with_error("get_gameweek_info", "boom");

        let ok = tools
            .execute("search_players", json!({"q": 1}), test_tool_context())
            .await
            .unwrap();
        assert_eq!(ok, json!({"players": []}));

        let err = tools
            .execute("get_gameweek_info", json!({}), test_tool_context())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");

        assert_eq!(tools.definitions().len(), 2);
        assert_eq!(tools.recorded_executions().len(), 2);
    }
}
