//! Normalized streaming events and message reassembly
//!
//! Providers translate their native stream into [`LlmStreamEvent`]s. Deltas
//! are forwarded as they arrive; the complete assistant message is only
//! available in the final [`LlmStreamEvent::TurnFinished`].

use super::types::{ContentBlock, LlmMessage, StopReason, Usage};
use super::LlmError;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;

/// How far past the last known block a new index may land
const MAX_INDEX_GAP: usize = 8;

/// One increment of a generation call
#[derive(Debug, Clone, PartialEq)]
pub enum LlmStreamEvent {
    TextDelta {
        text: String,
    },
    ThinkingDelta {
        thinking: String,
    },
    /// A tool-use block opened; its input is still streaming
    ToolUseStart {
        id: String,
        name: String,
    },
    /// Terminal event carrying the reassembled assistant turn
    TurnFinished {
        message: LlmMessage,
        stop_reason: StopReason,
        usage: Usage,
    },
}

impl LlmStreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LlmStreamEvent::TurnFinished { .. })
    }
}

/// Lazy, single-consumption sequence of normalized events.
///
/// An `Err` item is terminal. A stream that ends without `TurnFinished`
/// produced no usable turn.
pub type LlmEventStream = Pin<Box<dyn Stream<Item = Result<LlmStreamEvent, LlmError>> + Send>>;

#[derive(Debug, Default)]
enum PartialBlock {
    #[default]
    Empty,
    Text(String),
    Thinking {
        thinking: String,
        signature: Option<String>,
    },
    RedactedThinking(String),
    ToolUse {
        id: String,
        name: String,
        input_json: String,
    },
}

/// Rebuilds content blocks from index-keyed provider deltas
#[derive(Debug, Default)]
pub struct MessageAssembler {
    blocks: Vec<PartialBlock>,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the block at `index`; indices far beyond the known blocks are
    /// rejected rather than allocated
    fn open(&mut self, index: usize, block: PartialBlock) -> Result<(), LlmError> {
        if index > self.blocks.len() + MAX_INDEX_GAP {
            return Err(LlmError::protocol(format!(
                "Content block index {index} is out of range ({} blocks so far)",
                self.blocks.len()
            )));
        }
        if self.blocks.len() <= index {
            self.blocks.resize_with(index + 1, PartialBlock::default);
        }
        self.blocks[index] = block;
        Ok(())
    }

    pub fn start_text(&mut self, index: usize, initial: &str) -> Result<(), LlmError> {
        self.open(index, PartialBlock::Text(initial.to_string()))
    }

    pub fn start_thinking(&mut self, index: usize, initial: &str) -> Result<(), LlmError> {
        self.open(
            index,
            PartialBlock::Thinking {
                thinking: initial.to_string(),
                signature: None,
            },
        )
    }

    /// Redacted reasoning arrives whole in the block start
    pub fn start_redacted_thinking(&mut self, index: usize, data: String) -> Result<(), LlmError> {
        self.open(index, PartialBlock::RedactedThinking(data))
    }

    pub fn start_tool_use(&mut self, index: usize, id: &str, name: &str) -> Result<(), LlmError> {
        self.open(
            index,
            PartialBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input_json: String::new(),
            },
        )
    }

    /// Append text; returns false when the index is not an open text block
    pub fn push_text(&mut self, index: usize, delta: &str) -> bool {
        match self.blocks.get_mut(index) {
            Some(PartialBlock::Text(text)) => {
                text.push_str(delta);
                true
            }
            _ => false,
        }
    }

    pub fn push_thinking(&mut self, index: usize, delta: &str) -> bool {
        match self.blocks.get_mut(index) {
            Some(PartialBlock::Thinking { thinking, .. }) => {
                thinking.push_str(delta);
                true
            }
            _ => false,
        }
    }

    pub fn push_signature(&mut self, index: usize, delta: &str) -> bool {
        match self.blocks.get_mut(index) {
            Some(PartialBlock::Thinking { signature, .. }) => {
                signature.get_or_insert_with(String::new).push_str(delta);
                true
            }
            _ => false,
        }
    }

    pub fn push_input_json(&mut self, index: usize, delta: &str) -> bool {
        match self.blocks.get_mut(index) {
            Some(PartialBlock::ToolUse { input_json, .. }) => {
                input_json.push_str(delta);
                true
            }
            _ => false,
        }
    }

    /// Produce the assistant message with blocks in index order
    pub fn finish(self) -> Result<LlmMessage, LlmError> {
        let mut content = Vec::with_capacity(self.blocks.len());
        for block in self.blocks {
            match block {
                PartialBlock::Empty => {}
                PartialBlock::Text(text) => content.push(ContentBlock::Text { text }),
                PartialBlock::Thinking {
                    thinking,
                    signature,
                } => content.push(ContentBlock::Thinking {
                    thinking,
                    signature,
                }),
                PartialBlock::RedactedThinking(data) => {
                    content.push(ContentBlock::RedactedThinking { data });
                }
                PartialBlock::ToolUse {
                    id,
                    name,
                    input_json,
                } => {
                    let input = if input_json.trim().is_empty() {
                        Value::Object(serde_json::Map::new())
                    } else {
                        serde_json::from_str(&input_json).map_err(|e| {
                            LlmError::protocol(format!(
                                "Malformed input for tool call {id} ({name}): {e}"
                            ))
                        })?
                    };
                    content.push(ContentBlock::ToolUse { id, name, input });
                }
            }
        }
        Ok(LlmMessage::assistant(content))
    }
}
