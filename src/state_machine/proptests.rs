//! Property-based tests for the state machine
//!
//! A scripted model plays out whole exchanges through `transition` and the
//! resulting history and event stream are checked against the ordering rules.

use super::state::*;
use super::transition::*;
use super::*;
use crate::events::{StreamEvent, ToolCallOutcome};
use crate::llm::{ContentBlock, LlmMessage, MessageRole, StopReason};
use proptest::prelude::*;
use serde_json::json;
use std::collections::{HashMap, VecDeque};

// ============================================================================
// Test Helpers
// ============================================================================

/// Tool outcomes per round; an empty round is the model's final answer
type Script = Vec<Vec<bool>>;

struct Run {
    state: ChatState,
    history: Vec<LlmMessage>,
    emitted: Vec<StreamEvent>,
    llm_calls: usize,
}

fn tool_id(round: usize, index: usize) -> String {
    format!("toolu_{round}_{index}")
}

fn turn_for(round: usize, script: &Script, outcomes: &mut HashMap<String, bool>) -> Event {
    let calls = script.get(round).cloned().unwrap_or_default();
    if calls.is_empty() {
        return Event::TurnFinished {
            message: LlmMessage::assistant(vec![ContentBlock::text("Final answer")]),
            stop_reason: StopReason::EndTurn,
        };
    }

    let mut content = vec![ContentBlock::text("Checking")];
    for (index, ok) in calls.iter().enumerate() {
        let id = tool_id(round, index);
        outcomes.insert(id.clone(), *ok);
        content.push(ContentBlock::tool_use(
            id,
            "search_players",
            json!({"query": format!("p{index}")}),
        ));
    }
    Event::TurnFinished {
        message: LlmMessage::assistant(content),
        stop_reason: StopReason::ToolUse,
    }
}

fn drive(context: &ChatContext, script: &Script) -> Run {
    let mut run = Run {
        state: ChatState::initial(),
        history: vec![LlmMessage::user(vec![ContentBlock::text("Who to captain?")])],
        emitted: vec![],
        llm_calls: 1,
    };
    let mut outcomes = HashMap::new();
    let mut pending = VecDeque::from([turn_for(0, script, &mut outcomes)]);

    while let Some(event) = pending.pop_front() {
        let result = transition(&run.state, context, event).unwrap();
        run.state = result.new_state;
        for effect in result.effects {
            match effect {
                Effect::AppendMessage { message } => run.history.push(message),
                Effect::Emit { event } => run.emitted.push(event),
                Effect::RequestLlm => {
                    pending.push_back(turn_for(run.llm_calls, script, &mut outcomes));
                    run.llm_calls += 1;
                }
                Effect::ExecuteTool { tool } => {
                    let outcome = if outcomes[&tool.id] {
                        Ok(json!({"players": []}))
                    } else {
                        Err("Network error".to_string())
                    };
                    pending.push_back(Event::ToolComplete {
                        tool_use_id: tool.id,
                        outcome,
                    });
                }
            }
        }
    }
    run
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_round() -> impl Strategy<Value = Vec<bool>> {
    proptest::collection::vec(any::<bool>(), 1..4)
}

/// Some tool rounds followed by a final answer
fn arb_script() -> impl Strategy<Value = Script> {
    proptest::collection::vec(arb_round(), 0..5).prop_map(|mut rounds| {
        rounds.push(vec![]);
        rounds
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_exchange_reaches_done(script in arb_script()) {
        let context = ChatContext::new("req", 10, false);
        let run = drive(&context, &script);

        prop_assert_eq!(run.state, ChatState::Done);
        prop_assert_eq!(run.llm_calls, script.len());
    }

    #[test]
    fn prop_history_alternates_roles(script in arb_script()) {
        let context = ChatContext::new("req", 10, false);
        let run = drive(&context, &script);

        for (i, message) in run.history.iter().enumerate() {
            let expected = if i % 2 == 0 { MessageRole::User } else { MessageRole::Assistant };
            prop_assert_eq!(message.role, expected);
        }
        prop_assert_eq!(run.history.last().map(|m| m.role), Some(MessageRole::Assistant));
    }

    #[test]
    fn prop_every_call_gets_one_result_in_order(script in arb_script()) {
        let context = ChatContext::new("req", 10, false);
        let run = drive(&context, &script);

        // Each assistant tool turn is followed by a user turn answering exactly its calls
        for pair in run.history.windows(2) {
            let calls: Vec<&str> = pair[0].tool_uses().iter().map(|(id, _, _)| *id).collect();
            if calls.is_empty() || pair[0].role != MessageRole::Assistant {
                continue;
            }
            let answered: Vec<&str> = pair[1]
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                    _ => None,
                })
                .collect();
            prop_assert_eq!(calls, answered);
        }
    }

    #[test]
    fn prop_tool_use_end_follows_model_order(script in arb_script()) {
        let context = ChatContext::new("req", 10, false);
        let run = drive(&context, &script);

        let ended: Vec<String> = run
            .emitted
            .iter()
            .filter_map(|event| match event {
                StreamEvent::ToolUseEnd { tool_call } => Some(tool_call.id.clone()),
                _ => None,
            })
            .collect();
        let expected: Vec<String> = script
            .iter()
            .enumerate()
            .flat_map(|(round, calls)| (0..calls.len()).map(move |i| tool_id(round, i)))
            .collect();
        prop_assert_eq!(ended, expected);
    }

    #[test]
    fn prop_tool_failures_are_reported_not_fatal(script in arb_script()) {
        let context = ChatContext::new("req", 10, false);
        let run = drive(&context, &script);

        let failures = run
            .emitted
            .iter()
            .filter(|event| matches!(
                event,
                StreamEvent::ToolUseEnd { tool_call } if tool_call.outcome == ToolCallOutcome::Error("Network error".to_string())
            ))
            .count();
        let expected = script.iter().flatten().filter(|ok| !**ok).count();
        prop_assert_eq!(failures, expected);
        prop_assert_eq!(run.state, ChatState::Done);
    }

    #[test]
    fn prop_round_cap_bounds_generation_calls(
        tool_rounds in proptest::collection::vec(arb_round(), 1..8),
        max_rounds in 1u32..5,
    ) {
        let context = ChatContext::new("req", max_rounds, false);
        let run = drive(&context, &tool_rounds);

        // Without a final answer in the script the model keeps calling tools
        let cap = max_rounds as usize;
        if tool_rounds.len() >= cap {
            prop_assert_eq!(run.llm_calls, cap);
            let is_cap_error = matches!(
                run.state,
                ChatState::Error { error_kind: ErrorKind::MaxRoundsExceeded, .. }
            );
            prop_assert!(is_cap_error);
        } else {
            prop_assert_eq!(run.state, ChatState::Done);
        }
    }

    #[test]
    fn prop_cancel_is_terminal_anywhere(round in 1u32..10, pending in 0usize..3) {
        let context = ChatContext::new("req", 10, false);
        let states = [
            ChatState::Streaming { round },
            ChatState::DispatchingTools {
                round,
                current_tool: ToolCall::new("a", "get_gameweek_info", json!({})),
                remaining_tools: (0..pending)
                    .map(|i| ToolCall::new(format!("b{i}"), "get_gameweek_info", json!({})))
                    .collect(),
                completed_results: vec![],
            },
        ];
        for state in &states {
            let result = transition(state, &context, Event::Cancelled).unwrap();
            prop_assert!(result.new_state.is_terminal());
            prop_assert!(result.effects.is_empty());
        }
    }
}
