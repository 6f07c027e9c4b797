//! Wire events delivered to the chat client
//!
//! Each [`StreamEvent`] becomes exactly one SSE frame. `done` and `error`
//! are terminal: nothing is sent after them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One increment of assistant output as seen by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ToolUseStart {
        #[serde(rename = "toolCall")]
        tool_call: ToolCallStart,
    },
    TextDelta {
        content: String,
    },
    ThinkingDelta {
        content: String,
    },
    ToolUseEnd {
        #[serde(rename = "toolCall")]
        tool_call: ToolCallEnd,
    },
    Error {
        content: String,
    },
    Done,
}

impl StreamEvent {
    pub fn text_delta(content: impl Into<String>) -> Self {
        StreamEvent::TextDelta {
            content: content.into(),
        }
    }

    pub fn thinking_delta(content: impl Into<String>) -> Self {
        StreamEvent::ThinkingDelta {
            content: content.into(),
        }
    }

    pub fn tool_use_start(id: impl Into<String>, name: impl Into<String>) -> Self {
        StreamEvent::ToolUseStart {
            tool_call: ToolCallStart {
                id: id.into(),
                name: name.into(),
            },
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        StreamEvent::Error {
            content: content.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallStart {
    pub id: String,
    pub name: String,
}

/// A finished tool call with either its result or its error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallEnd {
    pub id: String,
    pub name: String,
    pub input: Value,
    #[serde(flatten)]
    pub outcome: ToolCallOutcome,
}

/// Serialized as exactly one of `result` or `error`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallOutcome {
    Result(Value),
    Error(String),
}

impl ToolCallOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolCallOutcome::Error(_))
    }
}

impl From<Result<Value, String>> for ToolCallOutcome {
    fn from(result: Result<Value, String>) -> Self {
        match result {
            Ok(value) => ToolCallOutcome::Result(value),
            Err(message) => ToolCallOutcome::Error(message),
        }
    }
}
