//! The three CO2 regressors and the capability they share.

pub mod layers;
pub mod network;
pub mod segmented;
pub mod tree;

use clap::ValueEnum;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Co2Error, Result};

pub use network::NeuralNetwork;
pub use segmented::{FuelSegmentedRegressor, RegressionParameters};
pub use tree::DecisionTreeRegressor;

/// Uniform `predict(features) -> values` contract of the tabular models.
pub trait Regressor {
    fn n_features(&self) -> usize;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features() {
            return Err(Co2Error::Shape {
                expected: format!("{} features", self.n_features()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }
}

/// A fitted model, seen through the contract it exposes.
pub enum Predictor<'a> {
    /// Takes a full feature matrix.
    Tabular(&'a dyn Regressor),
    /// Takes consumption and a one-hot fuel indicator.
    Segmented(&'a FuelSegmentedRegressor),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum ModelKind {
    #[value(name = "tree")]
    DecisionTree,
    #[value(name = "network")]
    NeuralNetwork,
    #[value(name = "segmented")]
    SegmentedRegression,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::DecisionTree,
        ModelKind::NeuralNetwork,
        ModelKind::SegmentedRegression,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::DecisionTree => "DecisionTree",
            ModelKind::NeuralNetwork => "Réseau de neurones",
            ModelKind::SegmentedRegression => "Modèle custom",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The three fitted artifacts, loaded once per process.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub tree: DecisionTreeRegressor,
    pub network: NeuralNetwork,
    pub segmented: FuelSegmentedRegressor,
}

impl ModelBundle {
    pub fn predictor(&self, kind: ModelKind) -> Predictor<'_> {
        match kind {
            ModelKind::DecisionTree => Predictor::Tabular(&self.tree),
            ModelKind::NeuralNetwork => Predictor::Tabular(&self.network),
            ModelKind::SegmentedRegression => Predictor::Segmented(&self.segmented),
        }
    }
}
