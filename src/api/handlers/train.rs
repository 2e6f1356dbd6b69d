//! Retraining endpoint

use std::collections::BTreeMap;
use std::path::PathBuf;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use super::{json_object, optional_str, AppState, RequestError};
use crate::model::TargetMetrics;

#[derive(Debug, Serialize)]
pub struct TrainResponse {
    pub status: &'static str,
    pub metrics: BTreeMap<String, TargetMetrics>,
}

/// POST /train
///
/// Trains on `dataset_path` (or the configured dataset) off the async
/// runtime. Concurrent calls queue on the train lock. A failure leaves the
/// serving model untouched.
pub async fn train(State(state): State<AppState>, body: Bytes) -> Response {
    match run_train(&state, &body).await {
        Ok(metrics) => Json(TrainResponse {
            status: "trained",
            metrics,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn run_train(state: &AppState, body: &Bytes) -> Result<BTreeMap<String, TargetMetrics>, RequestError> {
    let body = json_object(body)?;
    let dataset_path = optional_str(&body, "dataset_path").map(PathBuf::from);

    let _guard = state.train_lock.lock().await;
    info!(dataset = ?dataset_path, "Retrain requested");

    let registry = state.registry.clone();
    let result = tokio::task::spawn_blocking(move || registry.retrain(dataset_path.as_deref()))
        .await
        .map_err(|e| RequestError::Internal(format!("Training task failed: {e}")))?;

    result.map_err(|e| {
        warn!(error = %e, "Retrain failed, keeping previous model");
        RequestError::Internal(format!("Training failed: {e}"))
    })
}
