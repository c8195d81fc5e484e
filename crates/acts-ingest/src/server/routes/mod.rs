//! Routes of the acts server

pub mod acts;

use axum::{routing::get, Router};

use crate::server::state::AppState;

/// Build the acts routes
pub fn acts_routes() -> Router<AppState> {
    Router::new()
        // Run trigger and progress stream
        .route("/ws/", get(acts::run_socket))
        .route("/status", get(acts::status))
}
