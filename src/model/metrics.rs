//! Hold-out evaluation metrics

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Goodness of fit for one trained target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetMetrics {
    pub r2: f64,
    pub rmse: f64,
}

impl TargetMetrics {
    /// Compare predictions against observed values.
    ///
    /// R² is 0 when the observations have no variance; both metrics are 0 for
    /// empty input.
    pub fn evaluate(observed: &[f64], predicted: &[f64]) -> Self {
        let n = observed.len().min(predicted.len());
        if n == 0 {
            return Self { r2: 0.0, rmse: 0.0 };
        }
        let observed = &observed[..n];
        let ss_res: f64 = observed
            .iter()
            .zip(predicted)
            .map(|(o, p)| (o - p).powi(2))
            .sum();
        let ss_tot = observed.iter().population_variance() * n as f64;

        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };
        let rmse = (ss_res / n as f64).sqrt();
        Self { r2, rmse }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_fit() {
        let m = TargetMetrics::evaluate(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert!((m.r2 - 1.0).abs() < 1e-12);
        assert_eq!(m.rmse, 0.0);
    }

    #[test]
    fn test_mean_predictor_scores_zero() {
        let m = TargetMetrics::evaluate(&[1.0, 2.0, 3.0], &[2.0, 2.0, 2.0]);
        assert!(m.r2.abs() < 1e-12);
        assert!((m.rmse - (2.0_f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_constant_observations() {
        let m = TargetMetrics::evaluate(&[5.0, 5.0], &[4.0, 6.0]);
        assert_eq!(m.r2, 0.0);
        assert_eq!(m.rmse, 1.0);
        assert_eq!(TargetMetrics::evaluate(&[], &[]).rmse, 0.0);
    }
}
