/// Application routes configuration
use crate::handlers::{get_incursions, health, next_spawns, run_command, AppState};
use axum::{routing::get, Router};

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Tracked state
        .route("/incursions", get(get_incursions))
        .route("/spawns", get(next_spawns))
        // Chat commands
        .route("/command", get(run_command))
        .with_state(state)
}
