//! API route handlers
//!
//! - Yield and crop-cycle prediction
//! - Irrigation scheduling
//! - Retraining and model introspection
//! - Liveness

mod health;
mod irrigation;
mod predict;
mod train;

pub use health::*;
pub use irrigation::*;
pub use predict::*;
pub use train::*;

use std::sync::Arc;

use axum::body::Bytes;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

use super::envelope::ApiErrorResponse;
use crate::config::ServiceConfig;
use crate::forecast::{ForecastError, IrrigationPlanner};
use crate::model::ModelRegistry;

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Live model handle; swapped atomically on retrain
    pub registry: Arc<ModelRegistry>,
    pub planner: Arc<IrrigationPlanner>,
    /// Serializes retrains so artifact writes never interleave
    pub train_lock: Arc<Mutex<()>>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(config: &ServiceConfig, registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            planner: Arc::new(IrrigationPlanner::new(&config.irrigation)),
            train_lock: Arc::new(Mutex::new(())),
            max_body_bytes: config.server.max_body_bytes,
        }
    }
}

// ============================================================================
// Request errors
// ============================================================================

/// Everything a handler can report to the caller.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Request body is not valid JSON: {0}")]
    MalformedBody(String),
    #[error("Request body must be a JSON object")]
    NotAnObject,
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("Invalid value for field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("Model not loaded")]
    Unavailable,
    #[error("{0}")]
    Internal(String),
}

impl From<ForecastError> for RequestError {
    fn from(e: ForecastError) -> Self {
        match e {
            ForecastError::Unavailable => Self::Unavailable,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        match self {
            Self::Unavailable => ApiErrorResponse::service_unavailable(self.to_string()),
            Self::Internal(ref msg) => {
                warn!(error = %msg, "Request failed");
                ApiErrorResponse::internal(self.to_string())
            }
            _ => ApiErrorResponse::bad_request(self.to_string()),
        }
    }
}

/// Parse a request body as a JSON object regardless of content type.
///
/// An empty body reads as `{}`.
pub(crate) fn json_object(body: &Bytes) -> Result<serde_json::Map<String, serde_json::Value>, RequestError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Map::new());
    }
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| RequestError::MalformedBody(e.to_string()))?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(RequestError::NotAnObject),
    }
}

/// Optional string field; `null`, blanks and non-strings read as absent.
pub(crate) fn optional_str<'a>(
    body: &'a serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> Option<&'a str> {
    body.get(field)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_object_accepts_empty_body() {
        assert!(json_object(&Bytes::from_static(b"")).unwrap().is_empty());
        assert!(json_object(&Bytes::from_static(b"  \n")).unwrap().is_empty());
    }

    #[test]
    fn test_json_object_rejects_arrays_and_garbage() {
        assert!(matches!(
            json_object(&Bytes::from_static(b"[1,2]")),
            Err(RequestError::NotAnObject)
        ));
        assert!(matches!(
            json_object(&Bytes::from_static(b"{oops")),
            Err(RequestError::MalformedBody(_))
        ));
    }

    #[test]
    fn test_forecast_unavailable_maps_to_unavailable() {
        let e: RequestError = ForecastError::Unavailable.into();
        assert!(matches!(e, RequestError::Unavailable));
        let e: RequestError = ForecastError::EmptyEnsemble.into();
        assert!(matches!(e, RequestError::Internal(_)));
    }

    #[test]
    fn test_missing_field_message_names_field() {
        assert_eq!(RequestError::MissingField("crop_type").to_string(), "Missing field: crop_type");
        let resp = RequestError::MissingField("tmax").into_response();
        assert_eq!(resp.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
