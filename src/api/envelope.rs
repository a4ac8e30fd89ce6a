//! Error bodies shared by every endpoint: `{ "error": "<message>" }`.
//!
//! Engine failures map onto status codes by [`ErrorKind`]; caller mistakes
//! are 400s with a fixed per-route message, storage faults are 500s.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::engine::{EngineError, ErrorKind};

/// `/chat` without a usable question.
pub const INVALID_QUESTION: &str = "Invalid question input";

/// `/teach` without a usable question and answer.
pub const INVALID_TEACH_INPUT: &str = "Invalid input";

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// An error response ready to return from a handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Map an engine failure. `invalid_input_message` is the route's 400 text.
    pub fn from_engine(err: &EngineError, invalid_input_message: &str) -> Self {
        match err.kind() {
            ErrorKind::InvalidInput => Self::bad_request(invalid_input_message),
            ErrorKind::StorageUnavailable => Self::internal("Knowledge base unavailable"),
            ErrorKind::CorruptData => Self::internal("Knowledge base is corrupt"),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, axum::Json(body)).into_response()
    }
}
