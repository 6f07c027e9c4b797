//! HTTP request handlers

use super::sse::sse_response;
use super::types::{ChatRequest, ErrorResponse, HealthResponse, ValidationIssue};
use super::AppState;
use crate::runtime::{Emitter, ProductionRuntime, RuntimeSettings, ServiceLlmClient};
use crate::state_machine::ChatContext;
use crate::system_prompt::build_system_prompt;
use crate::tools::ToolContext;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Frames buffered between the runtime and a slow client
const EVENT_BUFFER: usize = 64;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/api/chat", post(chat))
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat
// ============================================================

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::InvalidRequest {
        message: "Invalid request body".to_string(),
        details: vec![ValidationIssue {
            path: "body".to_string(),
            message: rejection.body_text(),
        }],
    })?;

    let issues = request.validate();
    if !issues.is_empty() {
        return Err(AppError::InvalidRequest {
            message: "Request validation failed".to_string(),
            details: issues,
        });
    }

    let api_key = state
        .config
        .llm
        .resolve_api_key(request.api_key.as_deref())
        .ok_or(AppError::ApiKeyMissing)?;
    let service = state
        .llm
        .connect(&api_key)
        .map_err(|e| AppError::Internal(e.message))?;

    let request_id = Uuid::new_v4().to_string();
    let manager_id = request.manager_id();
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    let runtime = ProductionRuntime::new(
        ChatContext::new(
            &request_id,
            state.config.limits.max_rounds,
            request.show_thinking,
        ),
        request.history(),
        build_system_prompt(manager_id.is_some()),
        ServiceLlmClient::new(service),
        Arc::clone(&state.tools),
        ToolContext::new(cancel.clone(), manager_id, state.fpl.clone()),
        Emitter::new(tx, &request_id),
        RuntimeSettings::from_config(&state.config),
    );

    let span = tracing::info_span!(
        "chat",
        %request_id,
        manager_id = ?manager_id,
        show_thinking = request.show_thinking,
        messages = request.messages.len()
    );
    tokio::spawn(
        async move {
            runtime.run().await;
        }
        .instrument(span),
    );

    Ok(sse_response(rx, cancel.drop_guard()))
}

// ============================================================
// Health and Version
// ============================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn get_version() -> &'static str {
    concat!("fpl-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

/// Failures reported before the event stream starts
#[derive(Debug)]
enum AppError {
    InvalidRequest {
        message: String,
        details: Vec<ValidationIssue>,
    },
    ApiKeyMissing,
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InvalidRequest { message, details } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: message,
                    code: "INVALID_REQUEST",
                    details: Some(details),
                },
            ),
            AppError::ApiKeyMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    error: "No API key provided. Supply apiKey or configure ANTHROPIC_API_KEY."
                        .to_string(),
                    code: "API_KEY_MISSING",
                    details: None,
                },
            ),
            AppError::Internal(message) => {
                tracing::error!(error = %message, "Chat request failed before streaming");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: message,
                        code: "INTERNAL_ERROR",
                        details: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
