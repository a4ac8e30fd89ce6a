//! API route handlers
//!
//! Bodies are parsed leniently: a missing, non-JSON or wrongly-typed body is
//! the same 400 as a missing field, never axum's default rejection text.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Html;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::envelope::{ApiError, INVALID_QUESTION, INVALID_TEACH_INPUT};
use crate::engine::Engine;

/// Chat page served at `/`.
const INDEX_HTML: &str = include_str!("../../static/index.html");

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<Engine>,
}

impl ApiState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct TeachRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TeachResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub entries: usize,
    pub strategy: &'static str,
    pub backend: &'static str,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        entries: state.engine.snapshot().len(),
        strategy: state.engine.strategy_name(),
        backend: state.engine.backend_name(),
    })
}

/// POST /chat
pub async fn chat(
    State(state): State<ApiState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let question = match body {
        Ok(Json(ChatRequest {
            question: Some(q),
        })) => q,
        Ok(_) => return Err(ApiError::bad_request(INVALID_QUESTION)),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unusable /chat body");
            return Err(ApiError::bad_request(INVALID_QUESTION));
        }
    };

    // Matching reads a lock-free snapshot; no blocking I/O here
    let result = state
        .engine
        .query(&question)
        .map_err(|e| ApiError::from_engine(&e, INVALID_QUESTION))?;

    Ok(Json(ChatResponse {
        response: result.response().to_string(),
    }))
}

/// POST /teach
pub async fn teach(
    State(state): State<ApiState>,
    body: Result<Json<TeachRequest>, JsonRejection>,
) -> Result<Json<TeachResponse>, ApiError> {
    let (question, answer) = match body {
        Ok(Json(TeachRequest {
            question: Some(q),
            answer: Some(a),
        })) => (q, a),
        Ok(_) => return Err(ApiError::bad_request(INVALID_TEACH_INPUT)),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unusable /teach body");
            return Err(ApiError::bad_request(INVALID_TEACH_INPUT));
        }
    };

    let engine = Arc::clone(&state.engine);
    let taught = tokio::task::spawn_blocking(move || engine.teach(&question, &answer))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Teach task failed");
            ApiError::internal("Internal error")
        })?;

    match taught {
        Ok(result) => Ok(Json(TeachResponse {
            message: result.message,
        })),
        Err(e) => {
            let err = ApiError::from_engine(&e, INVALID_TEACH_INPUT);
            if err.status().is_server_error() {
                tracing::error!(error = %e, "Teach failed");
            }
            Err(err)
        }
    }
}
