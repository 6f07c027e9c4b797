//! Chat exchange state types

use crate::llm::{ContentBlock, LlmErrorKind};
use serde_json::Value;

/// One tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// State of one chat exchange.
///
/// Created fresh per request; `Done` and `Error` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatState {
    /// Consuming generation call number `round` (1-based)
    Streaming { round: u32 },

    /// Running the round's tool calls one after another
    DispatchingTools {
        round: u32,
        current_tool: ToolCall,
        remaining_tools: Vec<ToolCall>,
        /// Tool results so far, in call order
        completed_results: Vec<ContentBlock>,
    },

    Done,

    Error {
        message: String,
        error_kind: ErrorKind,
    },
}

impl ChatState {
    pub fn initial() -> Self {
        ChatState::Streaming { round: 1 }
    }

    /// Whether the exchange has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatState::Done | ChatState::Error { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChatState::Streaming { .. } => "streaming",
            ChatState::DispatchingTools { .. } => "dispatching_tools",
            ChatState::Done => "done",
            ChatState::Error { .. } => "error",
        }
    }
}

/// Why an exchange ended in `Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    RateLimit,
    ServerError,
    Auth,
    InvalidRequest,
    Protocol,
    /// The generation stream ended without a complete turn
    EmptyResponse,
    MaxRoundsExceeded,
    Cancelled,
    /// Orchestrator bug or transport failure
    Internal,
    Unknown,
}

impl From<LlmErrorKind> for ErrorKind {
    fn from(kind: LlmErrorKind) -> Self {
        match kind {
            LlmErrorKind::Network => ErrorKind::Network,
            LlmErrorKind::RateLimit => ErrorKind::RateLimit,
            LlmErrorKind::ServerError => ErrorKind::ServerError,
            LlmErrorKind::Auth => ErrorKind::Auth,
            LlmErrorKind::InvalidRequest => ErrorKind::InvalidRequest,
            LlmErrorKind::Protocol => ErrorKind::Protocol,
            LlmErrorKind::Unknown => ErrorKind::Unknown,
        }
    }
}

/// Immutable per-request settings the transition function reads
#[derive(Debug, Clone)]
pub struct ChatContext {
    pub request_id: String,
    pub max_rounds: u32,
    pub show_thinking: bool,
}

impl ChatContext {
    pub fn new(request_id: impl Into<String>, max_rounds: u32, show_thinking: bool) -> Self {
        Self {
            request_id: request_id.into(),
            max_rounds,
            show_thinking,
        }
    }
}
