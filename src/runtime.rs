//! Runtime for executing chat exchanges
//!
//! One [`ChatRuntime`] runs per request. It owns the conversation history
//! and the client's event stream until the exchange reaches a terminal state.

mod emitter;
mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use emitter::Emitter;
pub use executor::{ChatRuntime, RuntimeSettings};
pub use traits::*;

use crate::config::AppConfig;
use std::sync::Arc;

/// Runtime wired to the real provider and tool catalogue
pub type ProductionRuntime = ChatRuntime<ServiceLlmClient, Arc<dyn ToolExecutor>>;

impl RuntimeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_tokens: config.llm.max_tokens,
            thinking_budget: config.llm.thinking_budget,
            tool_timeout: config.limits.tool_timeout,
        }
    }
}
