//! Chat runtime executor
//!
//! Drives one chat exchange: feeds observed events into the pure state
//! machine and performs the effects it returns.

use super::emitter::{EmitError, Emitter};
use super::traits::{LlmClient, ToolExecutor};
use crate::events::StreamEvent;
use crate::llm::{LlmMessage, LlmRequest, LlmStreamEvent, SystemContent, ThinkingConfig};
use crate::state_machine::{
    transition, ChatContext, ChatState, Effect, Event, ToolCall, TransitionError,
};
use crate::tools::{ToolContext, ToolError};
use futures::{FutureExt, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failures that end the exchange outside the state machine's own error states
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Per-exchange generation and tool limits
#[derive(Debug, Clone, Copy)]
pub struct RuntimeSettings {
    pub max_tokens: u32,
    /// Reasoning budget used when the client asked to see thinking
    pub thinking_budget: u32,
    pub tool_timeout: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            thinking_budget: 2048,
            tool_timeout: Duration::from_secs(30),
        }
    }
}

/// Generic chat runtime that can work with any LLM and tool implementations
pub struct ChatRuntime<L, T>
where
    L: LlmClient,
    T: ToolExecutor,
{
    context: ChatContext,
    state: ChatState,
    history: Vec<LlmMessage>,
    system_prompt: String,
    llm_client: L,
    tool_executor: T,
    tool_context: ToolContext,
    emitter: Emitter,
    cancel: CancellationToken,
    settings: RuntimeSettings,
}

impl<L, T> ChatRuntime<L, T>
where
    L: LlmClient,
    T: ToolExecutor,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: ChatContext,
        history: Vec<LlmMessage>,
        system_prompt: String,
        llm_client: L,
        tool_executor: T,
        tool_context: ToolContext,
        emitter: Emitter,
        settings: RuntimeSettings,
    ) -> Self {
        let cancel = tool_context.cancel.clone();
        Self {
            context,
            state: ChatState::initial(),
            history,
            system_prompt,
            llm_client,
            tool_executor,
            tool_context,
            emitter,
            cancel,
            settings,
        }
    }

    /// Run the exchange to completion and close the client stream.
    ///
    /// Returns the terminal state.
    pub async fn run(mut self) -> ChatState {
        let request_id = self.context.request_id.clone();
        tracing::info!(
            %request_id,
            model = %self.llm_client.model_id(),
            history_len = self.history.len(),
            "Chat exchange started"
        );

        let started = Instant::now();
        let outcome = self.drive().await;

        let terminal = match (&outcome, &self.state) {
            (Ok(()), ChatState::Done) => {
                tracing::info!(%request_id, duration_ms = %started.elapsed().as_millis(), "Chat exchange completed");
                StreamEvent::Done
            }
            (Ok(()), ChatState::Error { message, error_kind }) => {
                tracing::warn!(%request_id, error = %message, kind = ?error_kind, "Chat exchange failed");
                StreamEvent::error(message.clone())
            }
            (Ok(()), state) => {
                tracing::error!(%request_id, state = state.name(), "Chat exchange stopped in a non-terminal state");
                StreamEvent::error("Internal error: the exchange stopped unexpectedly")
            }
            (Err(e), _) => {
                tracing::error!(%request_id, error = %e, "Chat exchange aborted");
                StreamEvent::error(e.to_string())
            }
        };

        let ChatRuntime { emitter, state, .. } = self;
        emitter.close(terminal).await;
        state
    }

    async fn drive(&mut self) -> Result<(), RuntimeError> {
        let mut pending = self.execute_effect(Effect::RequestLlm).await?;

        while let Some(event) = pending.take() {
            if self.state.is_terminal() {
                break;
            }
            pending = self.process_event(event).await?;
        }
        Ok(())
    }

    /// Apply one event and perform the resulting effects in order
    async fn process_event(&mut self, event: Event) -> Result<Option<Event>, RuntimeError> {
        let result = transition(&self.state, &self.context, event)?;

        tracing::debug!(
            request_id = %self.context.request_id,
            from = self.state.name(),
            to = result.new_state.name(),
            "State transition"
        );
        self.state = result.new_state;

        let mut next = None;
        for effect in result.effects {
            if let Some(event) = self.execute_effect(effect).await? {
                next = Some(event);
            }
        }
        Ok(next)
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(&mut self, effect: Effect) -> Result<Option<Event>, RuntimeError> {
        match effect {
            Effect::AppendMessage { message } => {
                self.history.push(message);
                Ok(None)
            }
            Effect::Emit { event } => {
                self.emitter.send(&event).await?;
                Ok(None)
            }
            Effect::RequestLlm => Ok(Some(self.stream_round().await?)),
            Effect::ExecuteTool { tool } => Ok(Some(self.run_tool(tool).await)),
        }
    }

    fn build_request(&self) -> LlmRequest {
        LlmRequest {
            system: vec![SystemContent::cached(self.system_prompt.clone())],
            messages: self.history.clone(),
            tools: self.tool_executor.definitions(),
            max_tokens: Some(self.settings.max_tokens),
            thinking: self.context.show_thinking.then_some(ThinkingConfig {
                budget_tokens: self.settings.thinking_budget,
            }),
        }
    }

    /// Consume one generation call, forwarding deltas as they arrive
    async fn stream_round(&mut self) -> Result<Event, RuntimeError> {
        let request = self.build_request();
        let cancel = self.cancel.clone();

        let started = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(Event::Cancelled),
            started = self.llm_client.stream(&request) => started,
        };
        let mut stream = match started {
            Ok(stream) => stream,
            Err(e) => {
                return Ok(Event::LlmFailed {
                    message: e.message,
                    error_kind: e.kind.into(),
                })
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(Event::Cancelled),
                next = stream.next() => next,
            };

            match next {
                None => return Ok(Event::StreamEndedEarly),
                Some(Err(e)) => {
                    return Ok(Event::LlmFailed {
                        message: e.message,
                        error_kind: e.kind.into(),
                    })
                }
                Some(Ok(LlmStreamEvent::TextDelta { text })) => {
                    if !text.is_empty() {
                        self.emitter.send(&StreamEvent::text_delta(text)).await?;
                    }
                }
                Some(Ok(LlmStreamEvent::ThinkingDelta { thinking })) => {
                    if self.context.show_thinking && !thinking.is_empty() {
                        self.emitter
                            .send(&StreamEvent::thinking_delta(thinking))
                            .await?;
                    }
                }
                Some(Ok(LlmStreamEvent::ToolUseStart { id, name })) => {
                    self.emitter
                        .send(&StreamEvent::tool_use_start(id, name))
                        .await?;
                }
                Some(Ok(LlmStreamEvent::TurnFinished {
                    message,
                    stop_reason,
                    ..
                })) => {
                    return Ok(Event::TurnFinished {
                        message,
                        stop_reason,
                    })
                }
            }
        }
    }

    /// Run one tool call inside the timeout, cancellation and panic boundary
    async fn run_tool(&self, tool: ToolCall) -> Event {
        let ToolCall { id, name, input } = tool;
        let timeout = self.settings.tool_timeout;
        tracing::info!(
            request_id = %self.context.request_id,
            tool = %name,
            tool_use_id = %id,
            "Executing tool"
        );

        let started = Instant::now();
        let call = AssertUnwindSafe(self.tool_executor.execute(
            &name,
            input,
            self.tool_context.clone(),
        ))
        .catch_unwind();

        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Event::Cancelled,
            result = tokio::time::timeout(timeout, call) => result,
        };

        let outcome = match result {
            Err(_) => Err(ToolError::Timeout(timeout)),
            Ok(Err(panic)) => Err(ToolError::Panicked(panic_message(panic.as_ref()))),
            Ok(Ok(outcome)) => outcome,
        };

        match &outcome {
            Ok(_) => tracing::info!(
                tool = %name,
                duration_ms = %started.elapsed().as_millis(),
                "Tool completed"
            ),
            Err(e) => tracing::warn!(
                tool = %name,
                duration_ms = %started.elapsed().as_millis(),
                error = %e,
                "Tool failed"
            ),
        }

        Event::ToolComplete {
            tool_use_id: id,
            outcome: outcome.map_err(|e| e.to_string()),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
