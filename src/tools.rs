//! Fantasy-football data tools offered to the model
//!
//! Tools are stateless singletons; everything a call needs arrives through
//! [`ToolContext`].

mod gameweek;
mod manager;
mod players;

pub use gameweek::GameweekInfoTool;
pub use manager::ManagerTeamTool;
pub use players::{PlayerDetailsTool, SearchPlayersTool};

use crate::fpl::{Bootstrap, FplClient, FplError};
use crate::llm::ToolDefinition;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

/// Why a tool call produced no result.
///
/// The display text is what the model sees in the `is_error` tool result.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No FPL manager ID was provided with this conversation")]
    NoManagerContext,
    #[error("{0}")]
    Upstream(String),
    #[error("Tool timed out after {0:?}")]
    Timeout(Duration),
    #[error("Tool execution cancelled")]
    Cancelled,
    #[error("Tool panicked: {0}")]
    Panicked(String),
}

impl From<FplError> for ToolError {
    fn from(err: FplError) -> Self {
        match err {
            FplError::NotFound(path) => ToolError::NotFound(path),
            other => ToolError::Upstream(other.to_string()),
        }
    }
}

/// Everything a tool invocation may use.
///
/// One context is created per chat request and cloned into each call.
#[derive(Clone)]
pub struct ToolContext {
    /// Cancelled when the client goes away
    pub cancel: CancellationToken,

    /// Manager the conversation is about, if the client supplied one
    pub manager_id: Option<u64>,

    fpl: FplClient,

    /// Season data shared by every call in the request, fetched at most once
    bootstrap: Arc<OnceCell<Arc<Bootstrap>>>,
}

impl ToolContext {
    pub fn new(cancel: CancellationToken, manager_id: Option<u64>, fpl: FplClient) -> Self {
        Self {
            cancel,
            manager_id,
            fpl,
            bootstrap: Arc::new(OnceCell::new()),
        }
    }

    /// Context whose bootstrap data is already loaded
    #[cfg(test)]
    pub fn with_bootstrap(manager_id: Option<u64>, bootstrap: Bootstrap) -> Self {
        let fpl = FplClient::new("http://127.0.0.1:9").unwrap();
        Self {
            cancel: CancellationToken::new(),
            manager_id,
            fpl,
            bootstrap: Arc::new(OnceCell::new_with(Some(Arc::new(bootstrap)))),
        }
    }

    pub fn fpl(&self) -> &FplClient {
        &self.fpl
    }

    pub async fn bootstrap(&self) -> Result<Arc<Bootstrap>, ToolError> {
        let load = self
            .bootstrap
            .get_or_try_init(|| async { self.fpl.bootstrap().await.map(Arc::new) });

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ToolError::Cancelled),
            bootstrap = load => Ok(Arc::clone(bootstrap?)),
        }
    }

    pub fn require_manager(&self) -> Result<u64, ToolError> {
        self.manager_id.ok_or(ToolError::NoManagerContext)
    }
}

/// Trait for tools the model can call
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Tool description for LLM
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<Value, ToolError>;
}

/// Decode a tool's input object
pub(crate) fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|e| ToolError::InvalidInput(e.to_string()))
}

/// The tool catalogue offered with every generation call
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn standard() -> Self {
        Self {
            tools: vec![
                Arc::new(PlayerDetailsTool),
                Arc::new(SearchPlayersTool),
                Arc::new(GameweekInfoTool),
                Arc::new(ManagerTeamTool),
            ],
        }
    }

    /// Get all tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Execute a tool by name. A name outside the catalogue is a tool error.
    pub async fn execute(
        &self,
        name: &str,
        input: Value,
        ctx: ToolContext,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.run(input, ctx).await
    }
}
