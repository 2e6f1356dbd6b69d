//! Ensemble confidence band

use crate::types::{ConfidenceInterval, EnsembleEstimate};

pub const LOWER_PERCENTILE: f64 = 5.0;
pub const UPPER_PERCENTILE: f64 = 95.0;

/// Percentile `q` (0-100) of ascending-sorted `sorted`, interpolating
/// linearly between neighbouring order statistics. Returns NaN for empty input.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (q.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// 5th/95th percentile band over the ensemble members.
///
/// A single-member ensemble collapses to the point estimate.
pub fn confidence_interval(estimate: &EnsembleEstimate) -> ConfidenceInterval {
    let members = estimate.members();
    if members.len() == 1 {
        return ConfidenceInterval {
            lower: estimate.point(),
            upper: estimate.point(),
        };
    }
    let mut sorted = members.to_vec();
    sorted.sort_by(f64::total_cmp);
    ConfidenceInterval {
        lower: percentile(&sorted, LOWER_PERCENTILE),
        upper: percentile(&sorted, UPPER_PERCENTILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 50.0), 3.0);
        assert_eq!(percentile(&v, 100.0), 5.0);
        assert!((percentile(&v, 5.0) - 1.2).abs() < 1e-12);
        assert!((percentile(&v, 95.0) - 4.8).abs() < 1e-12);
        assert!(percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn test_interval_ignores_member_order() {
        let a = EnsembleEstimate::new(3.0, vec![5.0, 1.0, 4.0, 2.0, 3.0]).unwrap();
        let ci = confidence_interval(&a);
        assert!((ci.lower - 1.2).abs() < 1e-12);
        assert!((ci.upper - 4.8).abs() < 1e-12);
    }

    #[test]
    fn test_single_member_collapses_to_point() {
        let e = EnsembleEstimate::new(4.25, vec![3.9]).unwrap();
        let ci = confidence_interval(&e);
        assert_eq!(ci.lower, 4.25);
        assert_eq!(ci.upper, 4.25);
    }

    #[test]
    fn test_point_may_fall_outside_band() {
        let e = EnsembleEstimate::new(10.0, vec![1.0, 1.0, 2.0, 2.0]).unwrap();
        let ci = confidence_interval(&e);
        assert!(ci.lower <= ci.upper);
        assert!(ci.upper < e.point());
    }
}
