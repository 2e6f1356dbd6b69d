//! Shared data structures for crop forecasting
//!
//! - Feature encoding: FeatureSchema, FeatureRow
//! - Yield prediction: EnsembleEstimate, ConfidenceInterval, ImportanceEntry
//! - Phenology: StageDefinition, CropCycle, HarvestWindow
//! - Irrigation: WeatherForecastPoint, SoilProfile, IrrigationPlan

mod cycle;
mod features;
mod irrigation;
mod prediction;

pub use cycle::*;
pub use features::*;
pub use irrigation::*;
pub use prediction::*;
