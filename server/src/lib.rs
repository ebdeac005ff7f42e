//! Rice Leaf Disease Diagnosis Server
//!
//! HTTP API around the rice leaf classifier: upload a photo, receive the predicted
//! condition, a short explanation and a Grad-CAM overlay.

pub mod error;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::{AppState, ServerConfig, SharedState};

/// Build the application router
pub fn router(state: SharedState) -> Router {
    let body_limit = state.config.body_limit_bytes;

    Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))

        // Diagnosis
        .route("/predict", post(routes::predict::predict))
        .route("/predict/", post(routes::predict::predict))

        // Add state
        .with_state(state)

        // Add middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
