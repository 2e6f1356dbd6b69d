//! API route table.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, AppState};

/// Build the API router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        // Forecasting
        .route("/predict", post(handlers::predict))
        .route("/irrigation", post(handlers::irrigation))
        // Model lifecycle
        .route("/train", post(handlers::train))
        .route("/model", get(handlers::model_info))
        // Liveness
        .route("/health", get(handlers::health))
        .with_state(state)
}
