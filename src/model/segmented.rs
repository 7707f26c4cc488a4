//! Fuel-segmented linear regression: one `(slope, intercept)` line per fuel category,
//! gated by a one-hot fuel indicator.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};

use crate::data::fuel::FuelCategory;
use crate::error::{Co2Error, DataIssue, IssueReport, Result, ValidationMode};
use crate::training::history::TrainingHistory;

/// Five `(slope, intercept)` pairs indexed by [`FuelCategory::index`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionParameters {
    slopes: Array1<f64>,
    intercepts: Array1<f64>,
}

impl RegressionParameters {
    pub fn new(pairs: [(f64, f64); 5]) -> Self {
        Self {
            slopes: pairs.iter().map(|p| p.0).collect(),
            intercepts: pairs.iter().map(|p| p.1).collect(),
        }
    }

    pub fn slope(&self, category: FuelCategory) -> f64 {
        self.slopes[category.index()]
    }

    pub fn intercept(&self, category: FuelCategory) -> f64 {
        self.intercepts[category.index()]
    }

    pub fn pairs(&self) -> [(f64, f64); 5] {
        let mut out = [(0.0, 0.0); 5];
        for (i, pair) in out.iter_mut().enumerate() {
            *pair = (self.slopes[i], self.intercepts[i]);
        }
        out
    }
}

/// Hyper-parameters for [`FuelSegmentedRegressor::fit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentedConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for SegmentedConfig {
    fn default() -> Self {
        Self { epochs: 10_000, learning_rate: 0.005, seed: 42 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelSegmentedRegressor {
    params: RegressionParameters,
}

fn check_shapes(consumption: &ArrayView1<f64>, indicators: &ArrayView2<f64>) -> Result<()> {
    if indicators.ncols() != FuelCategory::COUNT || indicators.nrows() != consumption.len() {
        return Err(Co2Error::Shape {
            expected: format!("{}x{} indicators", consumption.len(), FuelCategory::COUNT),
            actual: format!("{}x{}", indicators.nrows(), indicators.ncols()),
        });
    }
    Ok(())
}

impl FuelSegmentedRegressor {
    pub fn new(params: RegressionParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RegressionParameters {
        &self.params
    }

    /// `Σ_k indicator_k * (consumption * slope_k + intercept_k)` for every row.
    ///
    /// Indicators are not checked: rows with several ones, no ones or fractional values
    /// yield the matching combination of branches.
    pub fn predict(&self, consumption: &ArrayView1<f64>, indicators: &ArrayView2<f64>) -> Result<Array1<f64>> {
        check_shapes(consumption, indicators)?;
        // n x 5 matrix of every branch evaluated on every row
        let branches = &consumption.view().insert_axis(Axis(1)) * &self.params.slopes + &self.params.intercepts;
        Ok((&branches * indicators).sum_axis(Axis(1)))
    }

    /// Single-row form of [`predict`](Self::predict).
    pub fn call(&self, consumption: f64, indicator: [f64; 5]) -> f64 {
        indicator
            .iter()
            .zip(self.params.slopes.iter().zip(self.params.intercepts.iter()))
            .map(|(gate, (slope, intercept))| gate * (consumption * slope + intercept))
            .sum()
    }

    /// Like [`predict`](Self::predict), but every indicator row is checked first.
    /// Strict mode fails on the first row that is not one-hot; permissive mode records it.
    pub fn predict_checked(
        &self,
        consumption: &ArrayView1<f64>,
        indicators: &ArrayView2<f64>,
        mode: ValidationMode,
    ) -> Result<(Array1<f64>, IssueReport)> {
        check_shapes(consumption, indicators)?;
        let mut issues = IssueReport::new();
        for (row, values) in indicators.rows().into_iter().enumerate() {
            if !is_one_hot(&values) {
                issues.raise(mode, DataIssue::InvalidIndicatorVector { row, values: values.to_vec() })?;
            }
        }
        issues.log_summary("segmented_predict");
        Ok((self.predict(consumption, indicators)?, issues))
    }

    /// Full-batch gradient descent on mean squared error, starting from standard-normal
    /// parameters. Each category's gradient is averaged over that category's rows, so
    /// rare fuels converge as fast as common ones.
    pub fn fit(
        consumption: &ArrayView1<f64>,
        indicators: &ArrayView2<f64>,
        target: &ArrayView1<f64>,
        config: &SegmentedConfig,
    ) -> Result<(Self, TrainingHistory)> {
        check_shapes(consumption, indicators)?;
        if target.len() != consumption.len() {
            return Err(Co2Error::Shape {
                expected: format!("{} targets", consumption.len()),
                actual: format!("{}", target.len()),
            });
        }
        if target.is_empty() {
            return Err(Co2Error::EmptyDataset);
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut model = Self {
            params: RegressionParameters {
                slopes: Array1::random_using(FuelCategory::COUNT, StandardNormal, &mut rng),
                intercepts: Array1::random_using(FuelCategory::COUNT, StandardNormal, &mut rng),
            },
        };
        let mut history = TrainingHistory::default();
        let n = target.len() as f64;
        let x_col = consumption.view().insert_axis(Axis(1));
        // rows gated into each category; absent categories keep a zero gradient
        let per_category = indicators
            .mapv(f64::abs)
            .sum_axis(Axis(0))
            .mapv(|count| if count > 0.0 { count } else { 1.0 });

        tracing::info!(epochs = config.epochs, rows = target.len(), "fitting segmented regression");

        for epoch in 0..config.epochs {
            let prediction = model.predict(consumption, indicators)?;
            let error = &prediction - target;
            let loss = error.mapv(|e| e * e).sum() / n;

            // each branch steps on its own rows' MSE: 2/n_k Σ err * gate_k * consumption
            let gated: Array2<f64> = indicators * &error.view().insert_axis(Axis(1));
            let grad_intercepts = gated.sum_axis(Axis(0)) * 2.0 / &per_category;
            let grad_slopes = (&gated * &x_col).sum_axis(Axis(0)) * 2.0 / &per_category;

            model.params.slopes -= &(grad_slopes * config.learning_rate);
            model.params.intercepts -= &(grad_intercepts * config.learning_rate);

            if epoch % 10 == 0 || epoch + 1 == config.epochs {
                history.record(epoch, loss, error.mapv(f64::abs).sum() / n);
            }
            if epoch % 500 == 0 {
                tracing::debug!(epoch, loss, "segmented regression progress");
            }
            if !loss.is_finite() {
                tracing::warn!(epoch, "loss diverged, stopping early");
                break;
            }
        }

        Ok((model, history))
    }
}

fn is_one_hot(values: &ArrayView1<f64>) -> bool {
    values.iter().all(|&v| v == 0.0 || v == 1.0) && values.iter().filter(|&&v| v == 1.0).count() == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    fn model() -> FuelSegmentedRegressor {
        FuelSegmentedRegressor::new(RegressionParameters::new([
            (10.0, 5.0),
            (20.0, -3.0),
            (15.5, 2.0),
            (26.0, 1.0),
            (17.0, 0.5),
        ]))
    }

    #[test]
    fn each_category_selects_its_line() {
        let m = model();
        for category in FuelCategory::ALL {
            let c = 6.3;
            let expected = m.params().slope(category) * c + m.params().intercept(category);
            assert_eq!(m.call(c, category.one_hot()), expected);

            let x = array![c];
            let h = Array2::from_shape_vec((1, 5), category.one_hot().to_vec()).unwrap();
            assert_eq!(m.predict(&x.view(), &h.view()).unwrap()[0], expected);
        }
    }

    #[test]
    fn essence_scenarios() {
        let m = model();
        let essence = FuelCategory::Essence.one_hot();
        assert_abs_diff_eq!(m.call(1.4, essence), 19.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.call(4.7, essence), 52.0, epsilon = 1e-12);
    }

    #[test]
    fn two_hot_sums_branches() {
        let m = model();
        let c = 3.0;
        let both = [1.0, 0.0, 0.0, 1.0, 0.0];
        let expected = (10.0 * c + 5.0) + (26.0 * c + 1.0);
        assert_eq!(m.call(c, both), expected);
        assert_eq!(m.call(c, [0.0; 5]), 0.0);
    }

    #[test]
    fn vectorised_matches_scalar() {
        let m = model();
        let x = array![1.0, 2.0, 3.0];
        let h = array![
            [1.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0, 0.0],
            [0.0, 1.0, 1.0, 0.0, 0.0]
        ];
        let out = m.predict(&x.view(), &h.view()).unwrap();
        for (i, row) in h.rows().into_iter().enumerate() {
            let gate = [row[0], row[1], row[2], row[3], row[4]];
            assert_abs_diff_eq!(out[i], m.call(x[i], gate), epsilon = 1e-12);
        }
    }

    #[test]
    fn wrong_indicator_width_is_rejected() {
        let m = model();
        let x = array![1.0];
        let h = array![[1.0, 0.0, 0.0]];
        assert!(matches!(m.predict(&x.view(), &h.view()), Err(Co2Error::Shape { .. })));
    }

    #[test]
    fn checked_prediction_flags_invalid_rows() {
        let m = model();
        let x = array![1.0, 2.0];
        let h = array![[1.0, 0.0, 0.0, 0.0, 0.0], [1.0, 1.0, 0.0, 0.0, 0.0]];

        let (out, issues) = m.predict_checked(&x.view(), &h.view(), ValidationMode::Permissive).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(issues.count("invalid_indicator_vector"), 1);

        let err = m.predict_checked(&x.view(), &h.view(), ValidationMode::Strict).unwrap_err();
        assert!(matches!(err, Co2Error::Rejected(DataIssue::InvalidIndicatorVector { row: 1, .. })));
    }

    #[test]
    fn fit_recovers_lines() {
        let truth = model();
        let mut consumption = Vec::new();
        let mut gates = Vec::new();
        for category in FuelCategory::ALL {
            for step in 0..20 {
                consumption.push(3.0 + step as f64 * 0.3);
                gates.extend_from_slice(&category.one_hot());
            }
        }
        let x = Array1::from(consumption);
        let h = Array2::from_shape_vec((x.len(), 5), gates).unwrap();
        let y = truth.predict(&x.view(), &h.view()).unwrap();

        let config = SegmentedConfig { epochs: 20_000, learning_rate: 0.01, seed: 7 };
        let (fitted, history) = FuelSegmentedRegressor::fit(&x.view(), &h.view(), &y.view(), &config).unwrap();

        for category in FuelCategory::ALL {
            assert_abs_diff_eq!(fitted.params().slope(category), truth.params().slope(category), epsilon = 0.05);
        }
        let first = history.losses[0];
        let last = *history.losses.last().unwrap();
        assert!(last < first);
    }

    #[test]
    fn rare_category_converges_with_defaults() {
        // 260 diesel rows against 2 GNV rows
        let mut consumption = Vec::new();
        let mut gates = Vec::new();
        for step in 0..260 {
            consumption.push(3.0 + (step % 13) as f64 * 0.5);
            gates.extend_from_slice(&FuelCategory::Gazole.one_hot());
        }
        for c in [4.0, 8.0] {
            consumption.push(c);
            gates.extend_from_slice(&FuelCategory::GazNaturel.one_hot());
        }
        let x = Array1::from(consumption);
        let h = Array2::from_shape_vec((x.len(), 5), gates).unwrap();
        let y: Array1<f64> = x
            .iter()
            .zip(h.rows())
            .map(|(&c, gate)| if gate[3] == 1.0 { 26.0 * c + 1.0 } else { 18.0 * c + 1.0 })
            .collect();

        let (fitted, _) =
            FuelSegmentedRegressor::fit(&x.view(), &h.view(), &y.view(), &SegmentedConfig::default()).unwrap();

        assert_abs_diff_eq!(fitted.call(6.0, FuelCategory::GazNaturel.one_hot()), 109.0, epsilon = 0.1);
        assert_abs_diff_eq!(fitted.call(6.0, FuelCategory::Gazole.one_hot()), 157.0, epsilon = 0.1);
    }
}
