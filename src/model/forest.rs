//! Random forest regressor
//!
//! Bagged CART trees fit in parallel. Each tree draws its bootstrap sample
//! from its own `StdRng`, seeded from a master generator, so a fixed seed
//! gives the same forest regardless of thread scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{ModelError, RegressionTree};

/// Forest hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl ForestParams {
    /// Yield model: 100 trees, depth 15.
    pub const fn yield_default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 15,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    /// Phenology sub-models: 80 trees, depth 12.
    pub const fn cycle_default() -> Self {
        Self {
            n_trees: 80,
            max_depth: 12,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::yield_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<RegressionTree>,
    /// Mean impurity-decrease importance per feature, summing to 1 (or all 0).
    feature_importances: Vec<f64>,
}

impl RandomForest {
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &ForestParams, seed: u64) -> Result<Self, ModelError> {
        if x.is_empty() || y.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.len() != y.len() {
            return Err(ModelError::ShapeMismatch {
                rows: x.len(),
                targets: y.len(),
            });
        }
        if params.n_trees == 0 {
            return Err(ModelError::InvalidParams("n_trees must be > 0".to_string()));
        }
        let n_features = x[0].len();
        if let Some(bad) = x.iter().position(|row| row.len() != n_features) {
            return Err(ModelError::InvalidParams(format!(
                "row {bad} has {} features, expected {n_features}",
                x[bad].len()
            )));
        }

        let mut master = StdRng::seed_from_u64(seed);
        let tree_seeds: Vec<u64> = (0..params.n_trees).map(|_| master.gen()).collect();
        let n = x.len();

        let fitted: Vec<(RegressionTree, Vec<f64>)> = tree_seeds
            .par_iter()
            .map(|&tree_seed| {
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, y, &sample, params)
            })
            .collect();

        let mut feature_importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(fitted.len());
        for (tree, imp) in fitted {
            let total: f64 = imp.iter().sum();
            if total > 0.0 {
                for (acc, v) in feature_importances.iter_mut().zip(&imp) {
                    *acc += v / total;
                }
            }
            trees.push(tree);
        }
        let total: f64 = feature_importances.iter().sum();
        if total > 0.0 {
            feature_importances.iter_mut().for_each(|v| *v /= total);
        }

        Ok(Self {
            n_features,
            trees,
            feature_importances,
        })
    }

    /// Per-tree predictions, in tree order.
    pub fn predict_members(&self, row: &[f64]) -> Vec<f64> {
        self.trees.iter().map(|t| t.predict(row)).collect()
    }

    /// Mean of the member predictions.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let members = self.predict_members(row);
        if members.is_empty() {
            return 0.0;
        }
        members.iter().sum::<f64>() / members.len() as f64
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
