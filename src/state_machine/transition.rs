//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! next state and effects. All I/O happens in the runtime.

use super::state::{ErrorKind, ToolCall};
use super::{ChatContext, ChatState, Effect, Event};
use crate::events::{StreamEvent, ToolCallEnd, ToolCallOutcome};
use crate::llm::{ContentBlock, LlmMessage, StopReason};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ChatState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ChatState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Tool calls of an assistant turn, in the order the model produced them
pub fn extract_tool_calls(message: &LlmMessage) -> Vec<ToolCall> {
    message
        .tool_uses()
        .into_iter()
        .map(|(id, name, input)| ToolCall::new(id, name, input.clone()))
        .collect()
}

/// The exchange ends after this turn: nothing to run, or the model said it was done
pub fn is_final_turn(tool_calls: &[ToolCall], stop_reason: StopReason) -> bool {
    tool_calls.is_empty() || stop_reason.is_final()
}

#[allow(clippy::too_many_lines)] // One arm per state/event pairing
pub fn transition(
    state: &ChatState,
    context: &ChatContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Generation
        // ============================================================
        (
            ChatState::Streaming { round },
            Event::TurnFinished {
                message,
                stop_reason,
            },
        ) => {
            let mut tool_calls = extract_tool_calls(&message).into_iter();

            if is_final_turn(tool_calls.as_slice(), stop_reason) {
                return Ok(TransitionResult::new(ChatState::Done)
                    .with_effect(Effect::append(message)));
            }

            if *round >= context.max_rounds {
                return Ok(TransitionResult::new(ChatState::Error {
                    message: format!(
                        "Exceeded maximum of {} tool rounds",
                        context.max_rounds
                    ),
                    error_kind: ErrorKind::MaxRoundsExceeded,
                })
                .with_effect(Effect::append(message)));
            }

            let Some(first) = tool_calls.next() else {
                return Err(TransitionError::InvalidTransition(
                    "Tool dispatch with no tool calls".to_string(),
                ));
            };

            Ok(TransitionResult::new(ChatState::DispatchingTools {
                round: *round,
                current_tool: first.clone(),
                remaining_tools: tool_calls.collect(),
                completed_results: vec![],
            })
            .with_effect(Effect::append(message))
            .with_effect(Effect::execute_tool(first)))
        }

        (
            ChatState::Streaming { .. },
            Event::LlmFailed {
                message,
                error_kind,
            },
        ) => Ok(TransitionResult::new(ChatState::Error {
            message,
            error_kind,
        })),

        (ChatState::Streaming { .. }, Event::StreamEndedEarly) => {
            Ok(TransitionResult::new(ChatState::Error {
                message: "The model stream ended without producing a response".to_string(),
                error_kind: ErrorKind::EmptyResponse,
            }))
        }

        // ============================================================
        // Tool dispatch
        // ============================================================
        (
            ChatState::DispatchingTools {
                round,
                current_tool,
                remaining_tools,
                completed_results,
            },
            Event::ToolComplete {
                tool_use_id,
                outcome,
            },
        ) if tool_use_id == current_tool.id => {
            let outcome = ToolCallOutcome::from(outcome);
            let content = match &outcome {
                ToolCallOutcome::Result(value) => value.to_string(),
                ToolCallOutcome::Error(message) => message.clone(),
            };
            let mut results = completed_results.clone();
            results.push(ContentBlock::tool_result(
                &tool_use_id,
                content,
                outcome.is_error(),
            ));

            let tool_use_end = Effect::emit(StreamEvent::ToolUseEnd {
                tool_call: ToolCallEnd {
                    id: tool_use_id,
                    name: current_tool.name.clone(),
                    input: current_tool.input.clone(),
                    outcome,
                },
            });

            match remaining_tools.split_first() {
                Some((next, rest)) => Ok(TransitionResult::new(ChatState::DispatchingTools {
                    round: *round,
                    current_tool: next.clone(),
                    remaining_tools: rest.to_vec(),
                    completed_results: results,
                })
                .with_effect(tool_use_end)
                .with_effect(Effect::execute_tool(next.clone()))),

                // Last call of the round: hand every result back in one user turn
                None => Ok(TransitionResult::new(ChatState::Streaming { round: round + 1 })
                    .with_effect(tool_use_end)
                    .with_effect(Effect::append(LlmMessage::user(results)))
                    .with_effect(Effect::RequestLlm)),
            }
        }

        // ============================================================
        // Cancellation
        // ============================================================
        (ChatState::Streaming { .. } | ChatState::DispatchingTools { .. }, Event::Cancelled) => {
            Ok(TransitionResult::new(ChatState::Error {
                message: "Request cancelled".to_string(),
                error_kind: ErrorKind::Cancelled,
            }))
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {} with event {event:?}",
            state.name()
        ))),
    }
}
