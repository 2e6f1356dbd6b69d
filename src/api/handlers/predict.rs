//! Yield and crop-cycle prediction endpoint

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::debug;

use super::{json_object, optional_str, AppState, RequestError};
use crate::forecast::{ForecastError, SowingConditions};
use crate::types::{number_like, parse_date_or_today};

type JsonMap = serde_json::Map<String, serde_json::Value>;

fn required_number(body: &JsonMap, field: &'static str) -> Result<f64, RequestError> {
    match body.get(field) {
        None | Some(serde_json::Value::Null) => Err(RequestError::MissingField(field)),
        Some(v) => number_like(v).ok_or_else(|| RequestError::InvalidField {
            field,
            reason: format!("expected a number, got {v}"),
        }),
    }
}

/// Validate a predict body into sowing conditions.
pub fn parse_sowing_conditions(body: &JsonMap) -> Result<SowingConditions, RequestError> {
    let crop_type = match body.get("crop_type") {
        None | Some(serde_json::Value::Null) => return Err(RequestError::MissingField("crop_type")),
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(_) => {
            return Err(RequestError::InvalidField {
                field: "crop_type",
                reason: "expected a non-empty string".to_string(),
            })
        }
    };
    Ok(SowingConditions {
        crop_type,
        avg_temp: required_number(body, "avg_temp")?,
        tmax: required_number(body, "tmax")?,
        tmin: required_number(body, "tmin")?,
        sowing_date: parse_date_or_today(optional_str(body, "sowing_date")),
    })
}

/// POST /predict
///
/// Availability is checked before the body, so an unloaded service answers
/// 503 to every request.
pub async fn predict(State(state): State<AppState>, body: Bytes) -> Response {
    match run_predict(&state, &body) {
        Ok(report) => Json(report).into_response(),
        Err(e) => e.into_response(),
    }
}

fn run_predict(state: &AppState, body: &Bytes) -> Result<crate::types::PredictionReport, RequestError> {
    let live = state.registry.snapshot().ok_or(ForecastError::Unavailable)?;
    let body = json_object(body)?;
    let conditions = parse_sowing_conditions(&body)?;
    debug!(
        crop = %conditions.crop_type,
        avg_temp = conditions.avg_temp,
        tmax = conditions.tmax,
        tmin = conditions.tmin,
        sowing_date = %conditions.sowing_date,
        "Predict request"
    );
    Ok(live.forecaster.forecast(&conditions)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: serde_json::Value) -> JsonMap {
        match v {
            serde_json::Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_missing_crop_type_named() {
        let err = parse_sowing_conditions(&map(json!({"avg_temp": 20, "tmax": 25, "tmin": 15}))).unwrap_err();
        assert_eq!(err.to_string(), "Missing field: crop_type");
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let c = parse_sowing_conditions(&map(json!({
            "crop_type": "Rice",
            "avg_temp": "28.5",
            "tmax": 35.2,
            "tmin": "22.1",
            "sowing_date": "2025-09-24"
        })))
        .unwrap();
        assert_eq!(c.avg_temp, 28.5);
        assert_eq!(c.tmin, 22.1);
        assert_eq!(c.sowing_date.to_string(), "2025-09-24");
    }

    #[test]
    fn test_non_numeric_temperature_rejected() {
        let err = parse_sowing_conditions(&map(json!({
            "crop_type": "Rice", "avg_temp": "warm", "tmax": 30, "tmin": 20
        })))
        .unwrap_err();
        assert!(matches!(err, RequestError::InvalidField { field: "avg_temp", .. }));
    }

    #[test]
    fn test_missing_tmin_named() {
        let err = parse_sowing_conditions(&map(json!({
            "crop_type": "Rice", "avg_temp": 25, "tmax": 30, "tmin": null
        })))
        .unwrap_err();
        assert_eq!(err.to_string(), "Missing field: tmin");
    }

    #[test]
    fn test_bad_sowing_date_falls_back_to_today() {
        let c = parse_sowing_conditions(&map(json!({
            "crop_type": "Wheat", "avg_temp": 18, "tmax": 24, "tmin": 11, "sowing_date": "24/09/2025"
        })))
        .unwrap();
        assert_eq!(c.sowing_date, chrono::Utc::now().date_naive());
    }
}
