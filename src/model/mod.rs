//! Reference ensemble yield predictor
//!
//! - `tree` / `forest`: CART regression trees bagged into a random forest
//! - `dataset`: training CSV loader
//! - `trainer`: yield and phenology forests bundled as a [`CropModel`]
//! - `artifact`: atomic JSON persistence
//! - `registry`: the live model behind an atomic swap

pub mod artifact;
pub mod dataset;
mod forest;
mod metrics;
mod registry;
pub mod trainer;
mod tree;

pub use artifact::ArtifactError;
pub use dataset::{CropRecord, Dataset, DatasetError};
pub use forest::{ForestParams, RandomForest};
pub use metrics::TargetMetrics;
pub use registry::{InitOutcome, LiveModel, ModelRegistry};
pub use trainer::{CropModel, ModelMetadata, YIELD_TARGET};
pub use tree::RegressionTree;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("{rows} feature rows but {targets} targets")]
    ShapeMismatch { rows: usize, targets: usize },
    #[error("invalid model parameters: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}
