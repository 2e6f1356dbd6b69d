//! Irrigation scheduling endpoint

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::{json_object, optional_str, AppState, RequestError};
use crate::types::{parse_date_or_today, CropCycle, IrrigationPlan, SoilProfile, WeatherForecastPoint};

type JsonMap = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Serialize)]
pub struct IrrigationResponse {
    pub crop_type: String,
    pub sowing_date: NaiveDate,
    #[serde(flatten)]
    pub plan: IrrigationPlan,
}

/// Validated irrigation request.
#[derive(Debug, Clone)]
pub struct IrrigationRequest {
    pub crop_type: String,
    pub sowing_date: NaiveDate,
    pub forecast: Vec<WeatherForecastPoint>,
    pub crop_cycle: Option<CropCycle>,
    pub soil: SoilProfile,
}

/// Validate an irrigation body. Only the crop is required; every other part
/// degrades to "no information".
pub fn parse_irrigation_request(body: &JsonMap) -> Result<IrrigationRequest, RequestError> {
    let crop_type = optional_str(body, "crop_type")
        .or_else(|| optional_str(body, "crop"))
        .ok_or(RequestError::MissingField("crop_type"))?
        .to_string();
    let sowing_date = parse_date_or_today(optional_str(body, "sowing_date"));

    let forecast = match body.get("weekly_forecast") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(points)) => points
            .iter()
            .map(|p| serde_json::from_value(p.clone()).unwrap_or_default())
            .collect(),
        Some(_) => {
            return Err(RequestError::InvalidField {
                field: "weekly_forecast",
                reason: "expected a list of {temp, rain} points".to_string(),
            })
        }
    };

    let crop_cycle = body
        .get("crop_cycle")
        .and_then(|v| CropCycle::from_json_lenient(v, sowing_date));
    let soil: SoilProfile = body
        .get("soil_profile")
        .map(|v| serde_json::from_value(v.clone()).unwrap_or_default())
        .unwrap_or_default();

    Ok(IrrigationRequest {
        crop_type,
        sowing_date,
        forecast,
        crop_cycle,
        soil,
    })
}

/// POST /irrigation
///
/// Rule-based; works whether or not a model is loaded.
pub async fn irrigation(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match json_object(&body).and_then(|b| parse_irrigation_request(&b)) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };
    debug!(
        crop = %request.crop_type,
        sowing_date = %request.sowing_date,
        forecast_points = request.forecast.len(),
        has_cycle = request.crop_cycle.is_some(),
        "Irrigation request"
    );

    let plan = state.planner.schedule(
        &request.crop_type,
        request.sowing_date,
        &request.forecast,
        request.crop_cycle.as_ref(),
        &request.soil,
    );
    Json(IrrigationResponse {
        crop_type: request.crop_type,
        sowing_date: request.sowing_date,
        plan,
    })
    .into_response()
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
    fn test_crop_alias_accepted() {
        let r = parse_irrigation_request(&map(json!({"crop": "Maize", "sowing_date": "2025-06-01"}))).unwrap();
        assert_eq!(r.crop_type, "Maize");
        assert!(r.forecast.is_empty());
        assert!(r.crop_cycle.is_none());
        assert_eq!(r.soil, SoilProfile::default());
    }

    #[test]
    fn test_missing_crop_is_bad_request() {
        let err = parse_irrigation_request(&map(json!({"weekly_forecast": []}))).unwrap_err();
        assert_eq!(err.to_string(), "Missing field: crop_type");
    }

    #[test]
    fn test_garbage_points_are_ignored_not_fatal() {
        let r = parse_irrigation_request(&map(json!({
            "crop_type": "Rice",
            "weekly_forecast": [{"temp": 30, "rain": 2}, "junk", {"temp": "n/a"}],
            "soil_profile": {"type": 7}
        })))
        .unwrap();
        assert_eq!(r.forecast.len(), 3);
        assert_eq!(r.forecast[0], WeatherForecastPoint::new(30.0, 2.0));
        assert_eq!(r.forecast[1], WeatherForecastPoint::default());
        assert_eq!(r.soil, SoilProfile::default());
    }

    #[test]
    fn test_non_list_forecast_rejected() {
        let err = parse_irrigation_request(&map(json!({"crop_type": "Rice", "weekly_forecast": 3}))).unwrap_err();
        assert!(matches!(err, RequestError::InvalidField { field: "weekly_forecast", .. }));
    }

    #[test]
    fn test_response_shape() {
        let r = parse_irrigation_request(&map(json!({"crop_type": "Wheat", "sowing_date": "2025-11-01"}))).unwrap();
        let planner = crate::forecast::IrrigationPlanner::new(&crate::config::IrrigationConfig::default());
        let plan = planner.schedule(&r.crop_type, r.sowing_date, &r.forecast, None, &r.soil);
        let v = serde_json::to_value(IrrigationResponse {
            crop_type: r.crop_type,
            sowing_date: r.sowing_date,
            plan,
        })
        .unwrap();
        assert_eq!(v["crop_type"], "Wheat");
        assert_eq!(v["sowing_date"], "2025-11-01");
        assert_eq!(v["irrigation_schedule"].as_array().unwrap().len(), 4);
        assert!(v["water_savings"].is_i64());
        assert!(v.get("stage_guidance").is_none());
    }
}
