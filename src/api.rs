//! HTTP API for the chat service

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::config::AppConfig;
use crate::fpl::{FplClient, FplError};
use crate::llm::{AnthropicConnector, LlmConnector};
use crate::runtime::{ToolExecutor, ToolRegistryExecutor};
use crate::tools::ToolRegistry;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub llm: Arc<dyn LlmConnector>,
    pub tools: Arc<dyn ToolExecutor>,
    pub fpl: FplClient,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        llm: Arc<dyn LlmConnector>,
        tools: Arc<dyn ToolExecutor>,
    ) -> Result<Self, FplError> {
        let fpl = FplClient::new(&config.fpl_base_url)?;
        Ok(Self {
            config: Arc::new(config),
            llm,
            tools,
            fpl,
        })
    }

    /// State wired to the Anthropic API and the standard tool catalogue
    pub fn production(config: AppConfig) -> Result<Self, FplError> {
        let llm = Arc::new(AnthropicConnector::new(config.llm.clone()));
        let tools = Arc::new(ToolRegistryExecutor::new(ToolRegistry::standard()));
        Self::new(config, llm, tools)
    }
}
