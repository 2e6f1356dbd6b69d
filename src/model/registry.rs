//! Live model registry
//!
//! Holds the serving model behind one atomically replaceable handle. Request
//! handlers take an `Arc` snapshot and keep using it even if a retrain swaps
//! in a new model mid-request.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::{info, warn};

use super::{artifact, CropModel, Dataset, ModelError, TargetMetrics};
use crate::config::{ImportanceConfig, ModelConfig, PhenologyConfig, ServiceConfig};
use crate::forecast::CropForecaster;

/// A trained model together with the forecaster wired around it.
#[derive(Debug)]
pub struct LiveModel {
    pub model: Arc<CropModel>,
    pub forecaster: CropForecaster,
}

/// How startup initialization ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Loaded,
    Trained,
    Unavailable,
}

#[derive(Debug)]
pub struct ModelRegistry {
    current: ArcSwapOption<LiveModel>,
    model_config: ModelConfig,
    phenology: PhenologyConfig,
    importance: ImportanceConfig,
}

impl ModelRegistry {
    /// Empty registry; nothing is served until a model is installed.
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            current: ArcSwapOption::empty(),
            model_config: config.model.clone(),
            phenology: config.phenology.clone(),
            importance: config.importance.clone(),
        }
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.model_config
    }

    pub fn snapshot(&self) -> Option<Arc<LiveModel>> {
        self.current.load_full()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    /// Wrap `model` in a forecaster and make it the serving model.
    pub fn install(&self, model: CropModel) {
        let model = Arc::new(model);
        let forecaster = CropForecaster::new(model.clone(), &self.phenology, &self.importance);
        info!(
            version = %model.metadata.version,
            trained_at = %model.metadata.trained_at,
            dataset_size = model.metadata.dataset_size,
            "Model installed"
        );
        self.current.store(Some(Arc::new(LiveModel { model, forecaster })));
    }

    /// Load the artifact, or train from the configured dataset when it is
    /// missing and `train_on_missing` is set. Failures leave the registry
    /// empty; they never abort startup.
    pub fn initialize(&self) -> InitOutcome {
        let path = &self.model_config.artifact_path;
        match artifact::load(path) {
            Ok(model) => {
                self.install(model);
                InitOutcome::Loaded
            }
            Err(e) if e.is_missing() && self.model_config.train_on_missing => {
                info!(path = %path.display(), "No model artifact, training from dataset");
                match self.retrain(None) {
                    Ok(_) => InitOutcome::Trained,
                    Err(e) => {
                        warn!(error = %e, "Startup training failed, serving without a model");
                        InitOutcome::Unavailable
                    }
                }
            }
            Err(e) if e.is_missing() => {
                info!(path = %path.display(), "No model artifact, serving without a model");
                InitOutcome::Unavailable
            }
            Err(e) => {
                warn!(error = %e, "Failed to load model artifact, serving without a model");
                InitOutcome::Unavailable
            }
        }
    }

    /// Train on `dataset_path` (or the configured dataset), persist the
    /// artifact, then swap the new model in. On any failure the previous
    /// model keeps serving.
    ///
    /// Blocking; call from `spawn_blocking` inside the runtime.
    pub fn retrain(&self, dataset_path: Option<&Path>) -> Result<BTreeMap<String, TargetMetrics>, ModelError> {
        let dataset_path = dataset_path.unwrap_or(self.model_config.dataset_path.as_path());
        let dataset = Dataset::load(dataset_path)?;
        let model = CropModel::train(&dataset, &self.model_config, &self.phenology.crops)?;
        artifact::save(&model, &self.model_config.artifact_path)?;
        let metrics = model.metrics.clone();
        self.install(model);
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::trainer::tests::{fast_config, sample_dataset};
    use crate::config::defaults;

    fn config_in(dir: &Path) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.model = ModelConfig {
            artifact_path: dir.join("model.json"),
            dataset_path: dir.join("data.csv"),
            ..fast_config()
        };
        config
    }

    fn write_csv(path: &Path) {
        let mut csv = String::from("Crop_Type,Avg_Temp,Tmax,Tmin,Actual_Yield,Total_Season_Length_Predicted\n");
        for r in sample_dataset().records() {
            csv.push_str(&format!(
                "{},{},{},{},{},{}\n",
                r.crop_type,
                r.avg_temp,
                r.tmax,
                r.tmin,
                r.actual_yield,
                r.targets["Total_Season_Length_Predicted"]
            ));
        }
        std::fs::write(path, csv).unwrap();
    }

    #[test]
    fn test_empty_until_installed() {
        let registry = ModelRegistry::new(&ServiceConfig::default());
        assert!(!registry.is_loaded());
        assert!(registry.snapshot().is_none());

        let model = CropModel::train(&sample_dataset(), &fast_config(), &defaults::stage_tables()).unwrap();
        registry.install(model);
        assert!(registry.is_loaded());
    }

    #[test]
    fn test_initialize_trains_when_artifact_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        write_csv(&config.model.dataset_path);

        let registry = ModelRegistry::new(&config);
        assert_eq!(registry.initialize(), InitOutcome::Trained);
        assert!(config.model.artifact_path.exists());

        // A second registry loads what the first one wrote
        let again = ModelRegistry::new(&config);
        assert_eq!(again.initialize(), InitOutcome::Loaded);
    }

    #[test]
    fn test_initialize_without_dataset_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(&config_in(dir.path()));
        assert_eq!(registry.initialize(), InitOutcome::Unavailable);
        assert!(!registry.is_loaded());
    }

    #[test]
    fn test_failed_retrain_keeps_previous_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        write_csv(&config.model.dataset_path);
        let registry = ModelRegistry::new(&config);
        registry.retrain(None).unwrap();
        let before = registry.snapshot().unwrap();

        let err = registry.retrain(Some(dir.path().join("missing.csv").as_path()));
        assert!(err.is_err());
        let after = registry.snapshot().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_snapshot_survives_swap() {
        let registry = ModelRegistry::new(&ServiceConfig::default());
        let model = CropModel::train(&sample_dataset(), &fast_config(), &defaults::stage_tables()).unwrap();
        registry.install(model.clone());
        let held = registry.snapshot().unwrap();
        registry.install(model);
        let current = registry.snapshot().unwrap();
        assert!(!Arc::ptr_eq(&held, &current));
        assert_eq!(held.model.metadata, current.model.metadata);
    }
}
