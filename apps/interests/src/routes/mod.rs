pub mod health;

use axum::{routing::get, Router};

use crate::interests::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::health_handler))
        .route("/health", get(health::health_handler))
        .route("/interests", get(handlers::handle_interests))
        .route("/recompute-now", get(handlers::handle_recompute_now))
        .route("/status", get(handlers::handle_status))
        .route("/debug-posts", get(handlers::handle_debug_posts))
        .with_state(state)
}
