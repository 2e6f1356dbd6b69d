//! Irrigation scheduling types: forecast inputs, soil profile, plan outputs

use serde::{Deserialize, Deserializer, Serialize};

/// One day of short-range weather forecast.
///
/// Values arrive from heterogeneous clients: numbers, numeric strings, nulls
/// or garbage. Anything that is not a finite number reads as `None` and is
/// left out of the forecast averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherForecastPoint {
    /// Air temperature (°C)
    #[serde(rename = "temp", alias = "temperature", default, deserialize_with = "lenient_f64")]
    pub temperature: Option<f64>,
    /// Daily rainfall (mm)
    #[serde(rename = "rain", alias = "rainfall", default, deserialize_with = "lenient_f64")]
    pub rainfall: Option<f64>,
}

impl WeatherForecastPoint {
    pub fn new(temperature: f64, rainfall: f64) -> Self {
        Self {
            temperature: Some(temperature),
            rainfall: Some(rainfall),
        }
    }
}

/// Accept a JSON number or numeric string; everything else becomes `None`.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(number_like(&raw))
}

/// Interpret a JSON value as a finite number, if it plausibly is one.
pub fn number_like(value: &serde_json::Value) -> Option<f64> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Field soil characteristics. Absent fields have no effect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoilProfile {
    #[serde(rename = "type", default)]
    pub soil_type: Option<String>,
    #[serde(default)]
    pub drainage: Option<String>,
}

impl SoilProfile {
    pub fn new(soil_type: impl Into<String>, drainage: impl Into<String>) -> Self {
        Self {
            soil_type: Some(soil_type.into()),
            drainage: Some(drainage.into()),
        }
    }
}

/// What to do during one irrigation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrrigationAction {
    Skip,
    Irrigate,
}

/// Recommendation for one 14-day window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrrigationWindow {
    /// Human-readable label, e.g. "Week 3-4"
    #[serde(rename = "week")]
    pub week_range: String,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    pub action: IrrigationAction,
    /// Depth per application (mm); two applications per window
    #[serde(rename = "amount", skip_serializing_if = "Option::is_none")]
    pub amount_mm: Option<u32>,
    pub reason: String,
    /// Water-balance multiplier applied to the crop need
    #[serde(skip)]
    pub soil_factor: f64,
    /// Net requirement after rainfall offset (mm)
    #[serde(skip)]
    pub required_mm: f64,
}

/// Irrigation guidance attached to one dated growth stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageIrrigationAdvice {
    pub growth_stage: String,
    pub stage_date: chrono::NaiveDate,
    pub days_from_sowing: i64,
    pub irrigation_frequency: String,
    pub water_amount: String,
    pub priority: String,
    pub recommendation: String,
}

/// Full irrigation plan for the first eight weeks after sowing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrrigationPlan {
    #[serde(rename = "irrigation_schedule")]
    pub windows: Vec<IrrigationWindow>,
    /// Savings versus the uniform baseline, clamped to [-100, 100]
    #[serde(rename = "water_savings")]
    pub water_savings_percent: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stage_guidance: Vec<StageIrrigationAdvice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_point_accepts_strings_and_garbage() {
        let points: Vec<WeatherForecastPoint> = serde_json::from_value(serde_json::json!([
            {"temp": 30, "rain": "4.5"},
            {"temp": "hot", "rain": null},
            {"temperature": 25.0},
            {}
        ]))
        .unwrap();
        assert_eq!(points[0], WeatherForecastPoint::new(30.0, 4.5));
        assert_eq!(points[1].temperature, None);
        assert_eq!(points[1].rainfall, None);
        assert_eq!(points[2].temperature, Some(25.0));
        assert_eq!(points[3], WeatherForecastPoint::default());
    }

    #[test]
    fn test_number_like_rejects_non_finite() {
        assert_eq!(number_like(&serde_json::json!("NaN")), None);
        assert_eq!(number_like(&serde_json::json!(" 12 ")), Some(12.0));
        assert_eq!(number_like(&serde_json::json!(true)), None);
    }

    #[test]
    fn test_soil_profile_type_key() {
        let soil: SoilProfile =
            serde_json::from_value(serde_json::json!({"type": "Clay", "drainage": "poor"})).unwrap();
        assert_eq!(soil, SoilProfile::new("Clay", "poor"));
        let empty: SoilProfile = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(empty, SoilProfile::default());
    }

    #[test]
    fn test_skip_window_omits_amount() {
        let w = IrrigationWindow {
            week_range: "Week 1-2".to_string(),
            start_date: chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: chrono::NaiveDate::from_ymd_opt(2025, 1, 14).unwrap(),
            action: IrrigationAction::Skip,
            amount_mm: None,
            reason: "Natural rainfall sufficient".to_string(),
            soil_factor: 1.0,
            required_mm: 0.0,
        };
        let v = serde_json::to_value(&w).unwrap();
        assert_eq!(v["action"], "Skip");
        assert!(v.get("amount").is_none());
        assert!(v.get("soil_factor").is_none());
        assert_eq!(v["end_date"], "2025-01-14");
    }
}
