//! Ensemble predictor capability and the forecaster that orchestrates a
//! full prediction report around it.

use std::sync::Arc;

use chrono::NaiveDate;

use super::{confidence_interval, FeatureEncoder, ForecastError, ImportanceAggregator, TimelineBuilder};
use crate::config::{ImportanceConfig, PhenologyConfig};
use crate::types::{
    EnsembleEstimate, FeatureRow, FeatureSchema, ImportanceEntry, PredictionReport, YieldPrediction, DATE_FORMAT,
};

/// Phenology day counts predicted for one row. `None` means the predictor has
/// no sub-model for that quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleDays {
    pub season_length: Option<i64>,
    pub days_to_maturity: Option<i64>,
}

/// Anything that can score a feature row with an ensemble.
pub trait EnsemblePredictor: Send + Sync {
    /// Columns the predictor was fitted on, in order.
    fn schema(&self) -> &FeatureSchema;

    fn predict(&self, row: &FeatureRow) -> Result<EnsembleEstimate, ForecastError>;

    /// Importance per schema column.
    fn feature_importances(&self) -> Vec<(String, f64)>;

    fn cycle_days(&self, _row: &FeatureRow) -> CycleDays {
        CycleDays::default()
    }
}

/// Validated sowing-time inputs for one prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct SowingConditions {
    pub crop_type: String,
    pub avg_temp: f64,
    pub tmax: f64,
    pub tmin: f64,
    pub sowing_date: NaiveDate,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Encoder, predictor, confidence, timeline and importance in one pipeline.
pub struct CropForecaster {
    predictor: Arc<dyn EnsemblePredictor>,
    encoder: FeatureEncoder,
    timeline: TimelineBuilder,
    importance: ImportanceAggregator,
    default_season_length_days: i64,
}

impl std::fmt::Debug for CropForecaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CropForecaster")
            .field("schema", self.encoder.schema())
            .field("default_season_length_days", &self.default_season_length_days)
            .finish_non_exhaustive()
    }
}

impl CropForecaster {
    pub fn new(
        predictor: Arc<dyn EnsemblePredictor>,
        phenology: &PhenologyConfig,
        importance: &ImportanceConfig,
    ) -> Self {
        Self {
            encoder: FeatureEncoder::new(predictor.schema().clone()),
            predictor,
            timeline: TimelineBuilder::new(&phenology.crops),
            importance: ImportanceAggregator::new(importance),
            default_season_length_days: phenology.default_season_length_days,
        }
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn timeline(&self) -> &TimelineBuilder {
        &self.timeline
    }

    /// Presentable importances of the underlying predictor.
    pub fn importances(&self) -> Vec<ImportanceEntry> {
        let raw = self.predictor.feature_importances();
        self.importance
            .aggregate(raw.iter().map(|(name, score)| (name.as_str(), *score)))
    }

    /// Run the full pipeline for one request.
    ///
    /// Output depends only on the inputs and the loaded predictor, so
    /// repeated calls are identical.
    pub fn forecast(&self, conditions: &SowingConditions) -> Result<PredictionReport, ForecastError> {
        let row = self.encoder.encode(
            &conditions.crop_type,
            conditions.avg_temp,
            conditions.tmax,
            conditions.tmin,
        );
        let estimate = self.predictor.predict(&row)?;
        let interval = confidence_interval(&estimate);

        let days = self.predictor.cycle_days(&row);
        let season_length = days
            .season_length
            .filter(|d| *d > 0)
            .unwrap_or(self.default_season_length_days);
        let days_to_maturity = days
            .days_to_maturity
            .filter(|d| *d > 0)
            .unwrap_or(season_length);
        let crop_cycle = self.timeline.build(
            &conditions.crop_type,
            conditions.sowing_date,
            season_length,
            days_to_maturity,
        );

        let feature_importances = self.importances();
        let yield_t_ha = round2(estimate.point());

        let mut explanation_text = format!(
            "Prediction for {} sown on {}: {:.1} tons/ha expected yield with maturity in {} days.",
            conditions.crop_type,
            conditions.sowing_date.format(DATE_FORMAT),
            yield_t_ha,
            days_to_maturity
        );
        if !feature_importances.is_empty() {
            let drivers: Vec<&str> = feature_importances.iter().map(|e| e.name.as_str()).collect();
            explanation_text.push_str(&format!(" Top drivers: {}.", drivers.join(", ")));
        }

        Ok(PredictionReport {
            prediction: YieldPrediction {
                yield_t_ha,
                ci_lower: round2(interval.lower),
                ci_upper: round2(interval.upper),
                crop_type: conditions.crop_type.clone(),
            },
            crop_cycle,
            feature_importances,
            explanation_text,
        })
    }
}
