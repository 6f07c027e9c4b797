//! Events that drive the chat state machine

use super::state::ErrorKind;
use crate::llm::{LlmMessage, StopReason};
use serde_json::Value;

/// Things the runtime observed
#[derive(Debug, Clone)]
pub enum Event {
    /// The generation call produced a complete assistant turn
    TurnFinished {
        message: LlmMessage,
        stop_reason: StopReason,
    },

    LlmFailed {
        message: String,
        error_kind: ErrorKind,
    },

    /// The generation stream ended without a terminal turn
    StreamEndedEarly,

    ToolComplete {
        tool_use_id: String,
        /// Result value, or the error text shown to the model
        outcome: Result<Value, String>,
    },

    /// The client went away
    Cancelled,
}
