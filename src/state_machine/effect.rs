//! Effects produced by state transitions

use crate::events::StreamEvent;
use crate::llm::LlmMessage;
use crate::state_machine::state::ToolCall;

/// Effects to be executed after state transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a turn to the conversation history
    AppendMessage { message: LlmMessage },

    /// Send an event to the client
    Emit { event: StreamEvent },

    /// Start the next generation call with the current history
    RequestLlm,

    /// Run one tool call
    ExecuteTool { tool: ToolCall },
}

impl Effect {
    pub fn append(message: LlmMessage) -> Self {
        Effect::AppendMessage { message }
    }

    pub fn emit(event: StreamEvent) -> Self {
        Effect::Emit { event }
    }

    pub fn execute_tool(tool: ToolCall) -> Self {
        Effect::ExecuteTool { tool }
    }
}
