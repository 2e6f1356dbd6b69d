//! Agri Forecast: crop-cycle projection and irrigation scheduling
//!
//! Predicts yield for a sowing, projects the dated growth-stage timeline,
//! explains the prediction through grouped feature importances, and plans
//! irrigation for the first eight weeks after sowing.
//!
//! ## Architecture
//!
//! - **forecast**: pure engine components (encoder, confidence, phenology,
//!   importance, irrigation) plus the forecaster that wires them together
//! - **model**: reference random-forest predictor, training, artifact
//!   persistence and the live model registry
//! - **api**: Axum HTTP surface
//! - **config**: TOML service configuration with engine tables

pub mod api;
pub mod config;
pub mod forecast;
pub mod model;
pub mod types;

// Re-export service configuration
pub use config::ServiceConfig;

// Re-export the engine
pub use forecast::{CropForecaster, EnsemblePredictor, ForecastError, IrrigationPlanner, SowingConditions};

// Re-export the model lifecycle
pub use model::{CropModel, Dataset, ModelError, ModelRegistry};

// Re-export commonly used types
pub use types::{CropCycle, FeatureRow, FeatureSchema, IrrigationPlan, PredictionReport, SoilProfile, WeatherForecastPoint};
