//! API request and response types

use crate::llm::{ContentBlock, LlmMessage};
use serde::{Deserialize, Serialize};

/// Body of `POST /chat`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub manager_id: Option<i64>,
    #[serde(default)]
    pub show_thinking: bool,
    /// Per-request credential; overrides the server's key when non-blank
    #[serde(default)]
    pub api_key: Option<String>,
}

/// One prior turn as the client sends it
#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A field that failed validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl ChatRequest {
    /// Check the request; an empty list means it is usable
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        match self.messages.last() {
            None => issues.push(ValidationIssue::new(
                "messages",
                "At least one message is required",
            )),
            Some(last) if last.role != ChatRole::User => issues.push(ValidationIssue::new(
                "messages",
                "The last message must come from the user",
            )),
            Some(_) => {}
        }

        for (i, message) in self.messages.iter().enumerate() {
            if message.content.trim().is_empty() {
                issues.push(ValidationIssue::new(
                    format!("messages[{i}].content"),
                    "Message content must not be empty",
                ));
            }
        }

        if matches!(self.manager_id, Some(id) if id <= 0) {
            issues.push(ValidationIssue::new(
                "managerId",
                "Manager ID must be a positive integer",
            ));
        }

        issues
    }

    pub fn manager_id(&self) -> Option<u64> {
        self.manager_id.and_then(|id| u64::try_from(id).ok())
    }

    /// Conversation history in provider form, oldest first
    pub fn history(&self) -> Vec<LlmMessage> {
        self.messages
            .iter()
            .map(|m| {
                let content = vec![ContentBlock::text(m.content.clone())];
                match m.role {
                    ChatRole::User => LlmMessage::user(content),
                    ChatRole::Assistant => LlmMessage::assistant(content),
                }
            })
            .collect()
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationIssue>>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
