pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::generation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/generate-floor-plan", post(handlers::handle_generate))
        .route(
            "/api/generate-floor-plan/stream",
            post(handlers::handle_generate_stream),
        )
        .route("/api/layout", post(handlers::handle_layout))
        .with_state(state)
}
