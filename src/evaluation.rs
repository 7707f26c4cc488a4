//! Residuals and error metrics for comparing predictions to ground truth.

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Co2Error, Result};

fn check_lengths(predicted: &ArrayView1<f64>, actual: &ArrayView1<f64>) -> Result<()> {
    if predicted.len() != actual.len() {
        return Err(Co2Error::Shape {
            expected: format!("{} predictions", actual.len()),
            actual: format!("{}", predicted.len()),
        });
    }
    if actual.is_empty() {
        return Err(Co2Error::EmptyDataset);
    }
    Ok(())
}

/// `|pred - actual| / actual * 100` per row. A zero `actual` yields inf or NaN.
pub fn relative_deviations(predicted: &ArrayView1<f64>, actual: &ArrayView1<f64>) -> Result<Array1<f64>> {
    check_lengths(predicted, actual)?;
    Ok(((predicted - actual) / actual * 100.0).mapv(f64::abs))
}

pub fn mean_squared_error(predicted: &ArrayView1<f64>, actual: &ArrayView1<f64>) -> Result<f64> {
    check_lengths(predicted, actual)?;
    Ok((predicted - actual).mapv(|e| e * e).sum() / actual.len() as f64)
}

pub fn mean_absolute_error(predicted: &ArrayView1<f64>, actual: &ArrayView1<f64>) -> Result<f64> {
    check_lengths(predicted, actual)?;
    Ok((predicted - actual).mapv(f64::abs).sum() / actual.len() as f64)
}

/// Percentage of deviations strictly below `threshold` percent.
pub fn share_within(deviations: &Array1<f64>, threshold: f64) -> f64 {
    if deviations.is_empty() {
        return 0.0;
    }
    deviations.iter().filter(|&&d| d < threshold).count() as f64 / deviations.len() as f64 * 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub n: usize,
    pub mse: f64,
    pub mae: f64,
    /// Percent of predictions within 1% of the actual value.
    pub within_1: f64,
    pub within_5: f64,
    pub within_10: f64,
}

impl RegressionMetrics {
    pub fn compute(predicted: &ArrayView1<f64>, actual: &ArrayView1<f64>) -> Result<Self> {
        let deviations = relative_deviations(predicted, actual)?;
        Ok(Self {
            n: actual.len(),
            mse: mean_squared_error(predicted, actual)?,
            mae: mean_absolute_error(predicted, actual)?,
            within_1: share_within(&deviations, 1.0),
            within_5: share_within(&deviations, 5.0),
            within_10: share_within(&deviations, 10.0),
        })
    }
}

impl fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MSE : {:.2}", self.mse)?;
        writeln!(f, "MAE : {:.2}", self.mae)?;
        writeln!(f, "Proportion < 1% d'ecart  : {:.2}%", self.within_1)?;
        writeln!(f, "Proportion < 5% d'ecart  : {:.2}%", self.within_5)?;
        write!(f, "Proportion < 10% d'ecart : {:.2}%", self.within_10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn deviation_of_100_vs_110() {
        let pred = array![100.0];
        let actual = array![110.0];
        let dev = relative_deviations(&pred.view(), &actual.view()).unwrap();
        assert_abs_diff_eq!(dev[0], 9.0909, epsilon = 1e-4);

        let metrics = RegressionMetrics::compute(&pred.view(), &actual.view()).unwrap();
        assert_eq!(metrics.within_10, 100.0);
        assert_eq!(metrics.within_5, 0.0);
        assert_eq!(metrics.within_1, 0.0);
        assert_eq!(metrics.mse, 100.0);
        assert_eq!(metrics.mae, 10.0);
    }

    #[test]
    fn buckets_use_strict_threshold() {
        let dev = array![0.5, 1.0, 4.9, 5.0, 12.0];
        assert_eq!(share_within(&dev, 1.0), 20.0);
        assert_eq!(share_within(&dev, 5.0), 60.0);
        assert_eq!(share_within(&dev, 10.0), 80.0);
    }

    #[test]
    fn zero_actual_is_not_guarded() {
        let dev = relative_deviations(&array![5.0, 0.0].view(), &array![0.0, 0.0].view()).unwrap();
        assert!(dev[0].is_infinite());
        assert!(dev[1].is_nan());
    }

    #[test]
    fn mismatched_lengths_fail() {
        let err = RegressionMetrics::compute(&array![1.0, 2.0].view(), &array![1.0].view()).unwrap_err();
        assert!(matches!(err, Co2Error::Shape { .. }));
        let empty = Array1::<f64>::zeros(0);
        assert!(RegressionMetrics::compute(&empty.view(), &empty.view()).is_err());
    }

    #[test]
    fn display_block() {
        let metrics = RegressionMetrics::compute(&array![100.0].view(), &array![110.0].view()).unwrap();
        let text = metrics.to_string();
        assert!(text.starts_with("MSE : 100.00\nMAE : 10.00"));
        assert!(text.contains("Proportion < 10% d'ecart : 100.00%"));
    }
}
