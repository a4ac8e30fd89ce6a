//! API route definitions

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, ApiState};

/// All bot routes, with state attached.
pub fn bot_routes(state: ApiState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/chat", post(handlers::chat))
        .route("/teach", post(handlers::teach))
        .with_state(state)
}
