//! LLM provider abstraction
//!
//! Providers expose a pull-based stream of normalized events so the
//! orchestrator never depends on a provider's callback shape.

mod anthropic;
mod error;
mod stream;
mod types;

pub use anthropic::AnthropicService;
pub use error::{LlmError, LlmErrorKind};
pub use stream::{LlmEventStream, LlmStreamEvent};
pub use types::*;

use crate::config::LlmConfig;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Start a streaming generation call
    async fn stream(&self, request: &LlmRequest) -> Result<LlmEventStream, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn stream(&self, request: &LlmRequest) -> Result<LlmEventStream, LlmError> {
        let start = Instant::now();
        let model_id = self.model_id.clone();

        let stream = self.inner.stream(request).await.inspect_err(|e| {
            tracing::error!(
                model = %model_id,
                error = %e.message,
                retryable = e.kind.is_retryable(),
                "LLM request failed to start"
            );
        })?;

        let logged = stream.inspect(move |item| match item {
            Ok(LlmStreamEvent::TurnFinished {
                stop_reason, usage, ..
            }) => {
                tracing::info!(
                    model = %model_id,
                    duration_ms = %start.elapsed().as_millis(),
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    cache_read_tokens = usage.cache_read_tokens,
                    stop_reason = ?stop_reason,
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %model_id,
                    duration_ms = %start.elapsed().as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "LLM stream failed"
                );
            }
            Ok(_) => {}
        });

        Ok(Box::pin(logged))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Builds a provider bound to one request's credential
pub trait LlmConnector: Send + Sync {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn LlmService>, LlmError>;
}

/// Connector for the Anthropic Messages API
pub struct AnthropicConnector {
    config: LlmConfig,
}

impl AnthropicConnector {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }
}

impl LlmConnector for AnthropicConnector {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn LlmService>, LlmError> {
        let service = AnthropicService::new(api_key.to_string(), &self.config)?;
        Ok(Arc::new(LoggingService::new(Arc::new(service))))
    }
}
