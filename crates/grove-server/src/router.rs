//! Axum router setup for the Grove server

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use crate::{
    ServerState,
    handlers::{
        clear_cache, get_cache, get_graph, get_metrics, health_check, natural_query, post_index, post_layout,
        post_query, run_command, suggestions,
    },
    websocket::ws_handler,
};

/// Create the axum router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Signal stream and command channel
        .route("/ws", get(ws_handler))
        // Generic command surface
        .route("/api/command", post(run_command))
        // REST API endpoints
        .route("/api/health", get(health_check))
        .route("/api/graph", get(get_graph))
        .route("/api/query", post(post_query))
        .route("/api/query/natural", get(natural_query))
        .route("/api/suggestions", get(suggestions))
        .route("/api/layout", post(post_layout))
        .route("/api/index", post(post_index))
        .route("/api/cache", get(get_cache).delete(clear_cache))
        .route("/api/metrics", get(get_metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
