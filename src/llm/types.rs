//! Common types for LLM interactions

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// LLM request
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: Vec<SystemContent>,
    pub messages: Vec<LlmMessage>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: Option<u32>,
    /// Extended reasoning; `None` leaves it disabled
    pub thinking: Option<ThinkingConfig>,
}

/// Extended reasoning settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkingConfig {
    pub budget_tokens: u32,
}

/// System prompt content
#[derive(Debug, Clone)]
pub struct SystemContent {
    pub text: String,
    pub cache: bool,
}

impl SystemContent {
    pub fn cached(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cache: true,
        }
    }
}

/// One turn in the conversation.
///
/// Block order is significant and is resubmitted verbatim on the next
/// generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

impl LlmMessage {
    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: MessageRole::User,
            content,
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
        }
    }

    /// Extract all tool use requests from the message
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }

    /// Get text content from the message
    #[allow(dead_code)] // Used by tests
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Content block in a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
        /// Provider signature; required when the block is sent back
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Encrypted reasoning; opaque, but must be resubmitted unchanged
    RedactedThinking {
        data: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(s: impl Into<String>) -> Self {
        ContentBlock::Text { text: s.into() }
    }

    #[allow(dead_code)] // Built by providers' assemblers; used directly in tests
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
        }
    }
}

/// Tool definition
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Why a generation call stopped producing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    StopSequence,
    ToolUse,
    Other,
}

impl StopReason {
    pub fn from_api(reason: &str) -> Self {
        match reason {
            "end_turn" => StopReason::EndTurn,
            "stop_sequence" => StopReason::StopSequence,
            "tool_use" => StopReason::ToolUse,
            _ => StopReason::Other,
        }
    }

    /// The model ended the turn on its own; pending tool calls are not run
    pub fn is_final(self) -> bool {
        matches!(self, StopReason::EndTurn | StopReason::StopSequence)
    }
}

/// Usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assembled_turn() -> LlmMessage {
        LlmMessage::assistant(vec![
            ContentBlock::Thinking {
                thinking: "Check the player first".to_string(),
                signature: Some("sig-1".to_string()),
            },
            ContentBlock::text("Let me look that up."),
            ContentBlock::tool_use("toolu_1", "get_player_details", json!({"player_id": 1})),
            ContentBlock::text("One moment."),
        ])
    }

    #[test]
    fn test_message_resubmission_preserves_blocks() {
        let message = assembled_turn();
        let encoded = serde_json::to_string(&message).unwrap();
        let decoded: LlmMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, message);

        // Re-encoding the decoded form must be byte-identical
        assert_eq!(serde_json::to_string(&decoded).unwrap(), encoded);
    }

    #[test]
    fn test_content_block_wire_shape() {
        let value = serde_json::to_value(assembled_turn()).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["content"][0]["type"], "thinking");
        assert_eq!(value["content"][2]["type"], "tool_use");
        assert_eq!(value["content"][2]["input"]["player_id"], 1);

        let unsigned = ContentBlock::Thinking {
            thinking: "x".to_string(),
            signature: None,
        };
        assert_eq!(
            serde_json::to_value(unsigned).unwrap(),
            json!({"type": "thinking", "thinking": "x"})
        );

        let redacted = ContentBlock::RedactedThinking {
            data: "EmwKAhgB".to_string(),
        };
        assert_eq!(
            serde_json::to_value(redacted).unwrap(),
            json!({"type": "redacted_thinking", "data": "EmwKAhgB"})
        );
    }

    #[test]
    fn test_tool_result_defaults_is_error() {
        let block: ContentBlock =
            serde_json::from_value(json!({"type": "tool_result", "tool_use_id": "a", "content": "ok"}))
                .unwrap();
        assert_eq!(block, ContentBlock::tool_result("a", "ok", false));
    }

    #[test]
    fn test_tool_uses_in_order() {
        let message = LlmMessage::assistant(vec![
            ContentBlock::tool_use("b", "search_players", json!({})),
            ContentBlock::text("between"),
            ContentBlock::tool_use("a", "get_gameweek_info", json!({})),
        ]);
        let ids: Vec<_> = message.tool_uses().iter().map(|(id, _, _)| *id).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(message.text(), "between");
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(StopReason::from_api("end_turn"), StopReason::EndTurn);
        assert_eq!(StopReason::from_api("stop_sequence"), StopReason::StopSequence);
        assert_eq!(StopReason::from_api("tool_use"), StopReason::ToolUse);
        assert_eq!(StopReason::from_api("max_tokens"), StopReason::Other);
        assert!(StopReason::EndTurn.is_final());
        assert!(StopReason::StopSequence.is_final());
        assert!(!StopReason::ToolUse.is_final());
        assert!(!StopReason::Other.is_final());
    }
}
