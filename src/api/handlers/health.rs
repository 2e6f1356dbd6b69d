//! Liveness and model introspection endpoints

use std::collections::BTreeMap;

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::model::{ModelMetadata, TargetMetrics};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model_loaded: state.registry.is_loaded(),
    })
}

/// Description of the serving model.
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    #[serde(flatten)]
    pub metadata: ModelMetadata,
    pub features: Vec<String>,
    pub cycle_targets: Vec<String>,
    pub metrics: BTreeMap<String, TargetMetrics>,
}

/// GET /model
pub async fn model_info(State(state): State<AppState>) -> Response {
    let Some(live) = state.registry.snapshot() else {
        return ApiErrorResponse::service_unavailable("Model not loaded");
    };
    let model = &live.model;
    ApiResponse::ok(ModelInfo {
        metadata: model.metadata.clone(),
        features: model.schema.columns().to_vec(),
        cycle_targets: model.cycle_models.keys().cloned().collect(),
        metrics: model.metrics.clone(),
    })
}
