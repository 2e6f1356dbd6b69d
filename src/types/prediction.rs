//! Yield prediction types: ensemble estimates, intervals, importances

use serde::{Deserialize, Serialize};

use super::CropCycle;

/// Output of an ensemble predictor for one feature row.
///
/// The point value is the ensemble's own aggregate and need not equal the
/// mean of `members`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleEstimate {
    point: f64,
    members: Vec<f64>,
}

impl EnsembleEstimate {
    /// Returns `None` when `members` is empty.
    pub fn new(point: f64, members: Vec<f64>) -> Option<Self> {
        if members.is_empty() {
            return None;
        }
        Some(Self { point, members })
    }

    pub fn point(&self) -> f64 {
        self.point
    }

    pub fn members(&self) -> &[f64] {
        &self.members
    }
}

/// 5th/95th percentile band over ensemble members. `lower <= upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

/// One aggregated importance group as presented to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceEntry {
    pub name: String,
    /// Share of total importance, in percent.
    #[serde(rename = "impact")]
    pub percent: f64,
}

/// Yield block of the prediction response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldPrediction {
    pub yield_t_ha: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub crop_type: String,
}

/// Complete prediction response for one request.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub prediction: YieldPrediction,
    pub crop_cycle: CropCycle,
    pub feature_importances: Vec<ImportanceEntry>,
    pub explanation_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_requires_members() {
        assert!(EnsembleEstimate::new(3.0, Vec::new()).is_none());
        let e = EnsembleEstimate::new(3.0, vec![2.0, 4.0]).unwrap();
        assert_eq!(e.point(), 3.0);
        assert_eq!(e.members().len(), 2);
    }

    #[test]
    fn test_importance_serializes_as_impact() {
        let entry = ImportanceEntry { name: "Temp".to_string(), percent: 42.5 };
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["name"], "Temp");
        assert_eq!(v["impact"], 42.5);
    }
}
