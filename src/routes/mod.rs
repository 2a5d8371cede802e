//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket session at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers), adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route(
            "/api/v1/experiments",
            get(http::http_list_experiments).post(http::http_create_experiment),
        )
        .route(
            "/api/v1/experiments/:id",
            get(http::http_get_experiment).delete(http::http_delete_experiment),
        )
        .route("/api/v1/experiments/:id/solution", get(http::http_get_solution))
        .route("/api/v1/learners/:learner_id/progress", get(http::http_list_progress))
        .route(
            "/api/v1/learners/:learner_id/progress/:experiment_id",
            get(http::http_get_progress).put(http::http_put_progress),
        )
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
