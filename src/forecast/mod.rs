//! Crop-cycle projection and irrigation heuristic engine
//!
//! Pure components, leaves first:
//!
//! - [`FeatureEncoder`]: sowing-time inputs to a schema-aligned [`FeatureRow`]
//! - [`EnsemblePredictor`]: capability that turns a row into an ensemble estimate
//! - [`confidence_interval`]: 5th/95th percentile band over ensemble members
//! - [`TimelineBuilder`]: season length and stage table to a dated [`CropCycle`]
//! - [`ImportanceAggregator`]: grouped, capped, top-N feature importances
//! - [`IrrigationPlanner`]: biweekly irrigation plan and water savings
//!
//! [`CropForecaster`] wires the first five into one prediction report.
//!
//! [`FeatureRow`]: crate::types::FeatureRow
//! [`CropCycle`]: crate::types::CropCycle

mod confidence;
mod encoder;
mod importance;
mod irrigation;
mod phenology;
mod predictor;

pub use confidence::{confidence_interval, percentile, LOWER_PERCENTILE, UPPER_PERCENTILE};
pub use encoder::FeatureEncoder;
pub use importance::ImportanceAggregator;
pub use irrigation::IrrigationPlanner;
pub use phenology::TimelineBuilder;
pub use predictor::{CropForecaster, CycleDays, EnsemblePredictor, SowingConditions};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    /// No predictor has been loaded or trained yet.
    #[error("model not available")]
    Unavailable,
    #[error("predictor returned no ensemble members")]
    EmptyEnsemble,
    #[error("feature row has {got} columns, model expects {expected}")]
    SchemaMismatch { expected: usize, got: usize },
}
