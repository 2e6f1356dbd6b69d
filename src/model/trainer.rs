//! Model training and the trained model bundle

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::dataset::{Dataset, MATURITY_TARGET, SEASON_LENGTH_TARGET};
use super::{ForestParams, ModelError, RandomForest, TargetMetrics};
use crate::config::{defaults, ModelConfig};
use crate::forecast::{CycleDays, EnsemblePredictor, FeatureEncoder, ForecastError};
use crate::types::{EnsembleEstimate, FeatureRow, FeatureSchema, StageDefinition};

/// Metrics key of the yield model.
pub const YIELD_TARGET: &str = "yield";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub dataset_size: usize,
}

/// Everything needed to serve predictions, as persisted in the artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropModel {
    pub metadata: ModelMetadata,
    pub schema: FeatureSchema,
    pub yield_model: RandomForest,
    /// One forest per phenology target present in the training data.
    #[serde(default)]
    pub cycle_models: BTreeMap<String, RandomForest>,
    /// Stage tables in force when the model was trained.
    #[serde(default)]
    pub stage_tables: BTreeMap<String, Vec<StageDefinition>>,
    /// Hold-out metrics keyed by target (`yield` or a phenology column).
    #[serde(default)]
    pub metrics: BTreeMap<String, TargetMetrics>,
}

/// Rows split into training and evaluation index sets.
struct Split {
    train: Vec<usize>,
    test: Vec<usize>,
}

impl Split {
    fn new(n: usize, test_fraction: f64, seed: u64) -> Self {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        let mut n_test = (n as f64 * test_fraction).round() as usize;
        if n_test >= n {
            n_test = 0;
        }
        let test = order.split_off(n - n_test);
        Self { train: order, test }
    }
}

fn fit_target(
    x: &[Vec<f64>],
    y: &[f64],
    split: &Split,
    params: &ForestParams,
    seed: u64,
) -> Result<(RandomForest, TargetMetrics), ModelError> {
    let pick = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<f64>) {
        (idx.iter().map(|&i| x[i].clone()).collect(), idx.iter().map(|&i| y[i]).collect())
    };
    let (x_train, y_train) = pick(&split.train);
    let forest = RandomForest::fit(&x_train, &y_train, params, seed)?;

    // Too few rows for a hold-out set: report in-sample fit
    let eval = if split.test.is_empty() { &split.train } else { &split.test };
    let (x_eval, y_eval) = pick(eval);
    let predicted: Vec<f64> = x_eval.iter().map(|row| forest.predict(row)).collect();
    Ok((forest, TargetMetrics::evaluate(&y_eval, &predicted)))
}

impl CropModel {
    /// Train the yield forest and every available phenology forest.
    ///
    /// Yield and phenology models are fit concurrently; each forest also fits
    /// its own trees in parallel.
    pub fn train(
        dataset: &Dataset,
        config: &ModelConfig,
        stage_tables: &BTreeMap<String, Vec<StageDefinition>>,
    ) -> Result<Self, ModelError> {
        if dataset.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        let schema = FeatureSchema::for_crops(dataset.crops());
        let encoder = FeatureEncoder::new(schema.clone());
        let records = dataset.records();

        let x: Vec<Vec<f64>> = records
            .iter()
            .map(|r| encoder.encode(&r.crop_type, r.avg_temp, r.tmax, r.tmin).values().to_vec())
            .collect();
        let y: Vec<f64> = records.iter().map(|r| r.actual_yield).collect();
        let split = Split::new(records.len(), config.test_fraction, config.seed);

        let targets = dataset.available_targets();
        let (yield_result, cycle_results) = rayon::join(
            || fit_target(&x, &y, &split, &config.yield_forest, config.seed),
            || {
                targets
                    .iter()
                    .map(|&target| {
                        let rows: Vec<usize> = (0..records.len())
                            .filter(|&i| records[i].targets.contains_key(target))
                            .collect();
                        let tx: Vec<Vec<f64>> = rows.iter().map(|&i| x[i].clone()).collect();
                        let ty: Vec<f64> = rows.iter().map(|&i| records[i].targets[target]).collect();
                        let target_split = Split::new(rows.len(), config.test_fraction, config.seed);
                        fit_target(&tx, &ty, &target_split, &config.cycle_forest, config.seed)
                            .map(|fitted| (target.to_string(), fitted))
                    })
                    .collect::<Result<Vec<_>, ModelError>>()
            },
        );

        let (yield_model, yield_metrics) = yield_result?;
        let mut metrics = BTreeMap::from([(YIELD_TARGET.to_string(), yield_metrics)]);
        let mut cycle_models = BTreeMap::new();
        for (target, (forest, m)) in cycle_results? {
            metrics.insert(target.clone(), m);
            cycle_models.insert(target, forest);
        }

        info!(
            rows = records.len(),
            crops = schema.crop_vocabulary().count(),
            yield_r2 = format!("{:.3}", yield_metrics.r2),
            yield_rmse = format!("{:.3}", yield_metrics.rmse),
            cycle_models = cycle_models.len(),
            "Model trained"
        );

        Ok(Self {
            metadata: ModelMetadata {
                version: defaults::MODEL_VERSION.to_string(),
                trained_at: Utc::now(),
                dataset_size: records.len(),
            },
            schema,
            yield_model,
            cycle_models,
            stage_tables: stage_tables.clone(),
            metrics,
        })
    }

    /// Whole-day prediction of a phenology target, if a model exists for it.
    pub fn predict_target_days(&self, target: &str, row: &FeatureRow) -> Option<i64> {
        self.cycle_models
            .get(target)
            .map(|forest| forest.predict(row.values()).trunc() as i64)
    }

    /// Check internal shape consistency after loading.
    pub fn check_consistency(&self) -> Result<(), ModelError> {
        let width = self.schema.len();
        let forests = std::iter::once((YIELD_TARGET, &self.yield_model))
            .chain(self.cycle_models.iter().map(|(k, v)| (k.as_str(), v)));
        for (name, forest) in forests {
            if forest.n_features() != width {
                return Err(ModelError::InvalidParams(format!(
                    "{name} model expects {} features, schema has {width}",
                    forest.n_features()
                )));
            }
        }
        Ok(())
    }
}

impl EnsemblePredictor for CropModel {
    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn predict(&self, row: &FeatureRow) -> Result<EnsembleEstimate, ForecastError> {
        if row.len() != self.schema.len() {
            return Err(ForecastError::SchemaMismatch {
                expected: self.schema.len(),
                got: row.len(),
            });
        }
        let members = self.yield_model.predict_members(row.values());
        let point = self.yield_model.predict(row.values());
        EnsembleEstimate::new(point, members).ok_or(ForecastError::EmptyEnsemble)
    }

    fn feature_importances(&self) -> Vec<(String, f64)> {
        self.schema
            .columns()
            .iter()
            .cloned()
            .zip(self.yield_model.feature_importances().iter().copied())
            .collect()
    }

    fn cycle_days(&self, row: &FeatureRow) -> CycleDays {
        CycleDays {
            season_length: self.predict_target_days(SEASON_LENGTH_TARGET, row),
            days_to_maturity: self.predict_target_days(MATURITY_TARGET, row),
        }
    }
}
