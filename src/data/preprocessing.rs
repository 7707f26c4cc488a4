use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::seq::SliceRandom;
use ndarray_rand::rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data::dataset::{CleanedDataset, VehicleInput, VehicleRecord};
use crate::data::fuel::FuelCategory;
use crate::error::{Co2Error, Result};

/// Column-wise standardisation parameters, fit once and reused on new inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl StandardScaler {
    /// Population mean and standard deviation per column. Constant columns get a scale of 1.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let mean = x.mean_axis(Axis(0)).ok_or(Co2Error::EmptyDataset)?;
        let std = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s == 0.0 { 1.0 } else { s });
        Ok(Self { mean, std })
    }

    pub fn transform(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(Co2Error::Shape {
                expected: format!("{} columns", self.mean.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok((x - &self.mean) / &self.std)
    }

    pub fn fit_transform(x: &Array2<f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(x)?;
        let scaled = scaler.transform(&x.view())?;
        Ok((scaler, scaled))
    }
}

/// A feature matrix paired with its target vector.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub features: Array2<f64>,
    pub target: Array1<f64>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    pub fn select(&self, rows: &[usize]) -> FeatureSet {
        FeatureSet {
            features: self.features.select(Axis(0), rows),
            target: self.target.select(Axis(0), rows),
        }
    }
}

fn label_row(consumption: f64, fuel: FuelCategory, power: f64, mass: f64) -> [f64; 4] {
    [consumption, fuel.index() as f64, power, mass]
}

fn one_hot_row(consumption: f64, fuel: FuelCategory, power: f64, mass: f64) -> [f64; 8] {
    let h = fuel.one_hot();
    [consumption, power, mass, h[0], h[1], h[2], h[3], h[4]]
}

fn minimal_row(consumption: f64, fuel: FuelCategory) -> [f64; 6] {
    let h = fuel.one_hot();
    [consumption, h[0], h[1], h[2], h[3], h[4]]
}

fn matrix<const N: usize>(records: &[VehicleRecord], row: impl Fn(&VehicleRecord) -> [f64; N]) -> Array2<f64> {
    let mut x = Array2::zeros((records.len(), N));
    for (i, record) in records.iter().enumerate() {
        x.row_mut(i).assign(&Array1::from(row(record).to_vec()));
    }
    x
}

/// The three projections of a cleaned dataset, one per model.
#[derive(Debug, Clone)]
pub struct FeatureEncodings {
    /// Consumption, label-encoded fuel, power, mass; standardised.
    pub label: FeatureSet,
    /// Consumption, power, mass, five fuel indicators; standardised.
    pub one_hot: FeatureSet,
    /// Consumption and five fuel indicators, unscaled.
    pub minimal: FeatureSet,
    pub label_scaler: StandardScaler,
    pub one_hot_scaler: StandardScaler,
}

impl FeatureEncodings {
    pub fn build(dataset: &CleanedDataset) -> Result<Self> {
        let records = dataset.records();
        let target = dataset.target();

        let (label_scaler, label_x) =
            StandardScaler::fit_transform(&matrix(records, |r| label_row(r.consumption, r.fuel, r.power, r.mass)))?;
        let (one_hot_scaler, one_hot_x) =
            StandardScaler::fit_transform(&matrix(records, |r| one_hot_row(r.consumption, r.fuel, r.power, r.mass)))?;
        let minimal_x = matrix(records, |r| minimal_row(r.consumption, r.fuel));

        tracing::debug!(
            rows = records.len(),
            label_mean = ?label_scaler.mean,
            one_hot_mean = ?one_hot_scaler.mean,
            "feature encodings built"
        );

        Ok(Self {
            label: FeatureSet { features: label_x, target: target.clone() },
            one_hot: FeatureSet { features: one_hot_x, target: target.clone() },
            minimal: FeatureSet { features: minimal_x, target },
            label_scaler,
            one_hot_scaler,
        })
    }

    /// Encode a manual input the way the label-encoded matrix was built.
    pub fn encode_label(&self, input: &VehicleInput) -> Result<Array2<f64>> {
        let row = label_row(input.consumption, input.fuel, input.power, input.mass);
        let x = Array2::from_shape_vec((1, row.len()), row.to_vec())
            .map_err(|e| Co2Error::Shape { expected: "1x4".into(), actual: e.to_string() })?;
        self.label_scaler.transform(&x.view())
    }

    pub fn encode_one_hot(&self, input: &VehicleInput) -> Result<Array2<f64>> {
        let row = one_hot_row(input.consumption, input.fuel, input.power, input.mass);
        let x = Array2::from_shape_vec((1, row.len()), row.to_vec())
            .map_err(|e| Co2Error::Shape { expected: "1x8".into(), actual: e.to_string() })?;
        self.one_hot_scaler.transform(&x.view())
    }

    /// Consumption column and indicator block of a minimal-encoded matrix.
    pub fn split_minimal(x: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
        (x.column(0).to_owned(), x.slice(s![.., 1..]).to_owned())
    }
}

/// Row indices of a seeded train/test partition.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl TrainTestSplit {
    /// Shuffle `0..n` with `seed` and hold out `ceil(n * test_fraction)` rows.
    pub fn new(n: usize, test_fraction: f64, seed: u64) -> Result<Self> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(Co2Error::Config(format!(
                "test fraction must be in (0, 1), got {}",
                test_fraction
            )));
        }
        let n_test = ((n as f64) * test_fraction).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(Co2Error::Shape {
                expected: "at least one train and one test row".into(),
                actual: format!("{} rows", n),
            });
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let test = indices[..n_test].to_vec();
        let train = indices[n_test..].to_vec();
        Ok(Self { train, test })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn dataset() -> CleanedDataset {
        let rows = [
            (5.0, FuelCategory::Gazole, 130.0, 6.0, 1300.0),
            (6.0, FuelCategory::Essence, 140.0, 5.0, 1100.0),
            (7.0, FuelCategory::Gazole, 180.0, 8.0, 1600.0),
            (9.0, FuelCategory::SuperEthanol, 150.0, 7.0, 1400.0),
        ];
        CleanedDataset::from_records(
            rows.iter()
                .map(|&(consumption, fuel, co2, power, mass)| VehicleRecord { consumption, fuel, co2, power, mass })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn scaler_standardises_columns() {
        let x = ndarray::array![[1.0, 10.0], [3.0, 10.0]];
        let (scaler, scaled) = StandardScaler::fit_transform(&x).unwrap();
        assert_eq!(scaler.mean, ndarray::array![2.0, 10.0]);
        assert_eq!(scaler.std, ndarray::array![1.0, 1.0]);
        assert_eq!(scaled, ndarray::array![[-1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn scaler_rejects_wrong_width() {
        let (scaler, _) = StandardScaler::fit_transform(&ndarray::array![[1.0, 2.0]]).unwrap();
        assert!(scaler.transform(&ndarray::array![[1.0, 2.0, 3.0]].view()).is_err());
    }

    #[test]
    fn encodings_have_expected_shapes() {
        let enc = FeatureEncodings::build(&dataset()).unwrap();
        assert_eq!(enc.label.features.dim(), (4, 4));
        assert_eq!(enc.one_hot.features.dim(), (4, 8));
        assert_eq!(enc.minimal.features.dim(), (4, 6));
        assert_eq!(enc.label.target, enc.minimal.target);
        assert_eq!(enc.one_hot.target, ndarray::array![130.0, 140.0, 180.0, 150.0]);
    }

    #[test]
    fn minimal_encoding_is_unscaled_one_hot() {
        let enc = FeatureEncodings::build(&dataset()).unwrap();
        assert_eq!(
            enc.minimal.features.row(3).to_vec(),
            vec![9.0, 0.0, 0.0, 0.0, 0.0, 1.0]
        );
        let (consumption, indicators) = FeatureEncodings::split_minimal(&enc.minimal.features);
        assert_eq!(consumption, ndarray::array![5.0, 6.0, 7.0, 9.0]);
        assert_eq!(indicators.dim(), (4, 5));
    }

    #[test]
    fn scaled_columns_have_zero_mean() {
        let enc = FeatureEncodings::build(&dataset()).unwrap();
        for col in enc.label.features.columns() {
            assert_abs_diff_eq!(col.mean().unwrap(), 0.0, epsilon = 1e-12);
        }
        for col in enc.one_hot.features.columns() {
            assert_abs_diff_eq!(col.mean().unwrap(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn manual_input_uses_retained_scaler() {
        let ds = dataset();
        let enc = FeatureEncodings::build(&ds).unwrap();
        let first = ds.records()[0];
        let input = VehicleInput {
            consumption: first.consumption,
            fuel: first.fuel,
            power: first.power,
            mass: first.mass,
        };
        let label = enc.encode_label(&input).unwrap();
        let one_hot = enc.encode_one_hot(&input).unwrap();
        for (a, b) in label.row(0).iter().zip(enc.label.features.row(0).iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
        for (a, b) in one_hot.row(0).iter().zip(enc.one_hot.features.row(0).iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn split_is_seeded_and_disjoint() {
        let a = TrainTestSplit::new(10, 0.2, 9001).unwrap();
        let b = TrainTestSplit::new(10, 0.2, 9001).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.test.len(), 2);
        assert_eq!(a.train.len(), 8);
        let mut all: Vec<usize> = a.train.iter().chain(a.test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn split_rejects_bad_fraction() {
        assert!(TrainTestSplit::new(10, 0.0, 1).is_err());
        assert!(TrainTestSplit::new(10, 1.5, 1).is_err());
        assert!(TrainTestSplit::new(1, 0.2, 1).is_err());
    }
}
