//! REST API module using Axum
//!
//! HTTP surface of the bot:
//! - `GET /` chat page (compiled into the binary)
//! - `GET /health` liveness plus knowledge base size
//! - `POST /chat` answer a question
//! - `POST /teach` learn a question/answer pair

pub mod envelope;
mod handlers;
mod routes;

pub use handlers::ApiState;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::defaults::{CORS_ORIGINS_ENV_VAR, MAX_REQUEST_BODY_BYTES};

/// Build a CORS layer that is restrictive by default (same-origin only).
///
/// Set `TEACHBOT_CORS_ORIGINS` to a comma-separated list of allowed origins
/// to embed the bot in another site.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    match std::env::var(CORS_ORIGINS_ENV_VAR) {
        Ok(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Create the complete application router.
pub fn create_app(state: ApiState) -> Router {
    routes::bot_routes(state)
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
