//! Application context: everything loaded once at startup and shared by every request.

use clap::ValueEnum;
use ndarray::{Array1, Array2};
use std::fmt;

use crate::config::AppConfig;
use crate::data::dataset::{CleanedDataset, ControlBounds, RawTable, VehicleInput};
use crate::data::explore::DatasetSummary;
use crate::data::fuel::FuelCategory;
use crate::data::preprocessing::{FeatureEncodings, FeatureSet, TrainTestSplit};
use crate::error::{IssueReport, Result, ValidationMode};
use crate::evaluation::RegressionMetrics;
use crate::model::{ModelBundle, ModelKind, Predictor};
use crate::utils::io::load_models;

/// Cars with known configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExampleCar {
    #[value(name = "megane")]
    RenaultMegane,
    #[value(name = "espace")]
    RenaultEspace,
}

impl ExampleCar {
    pub fn name(self) -> &'static str {
        match self {
            ExampleCar::RenaultMegane => "Renault Megane",
            ExampleCar::RenaultEspace => "Renault Espace",
        }
    }

    /// Consumption and fuel fed to the segmented model.
    pub fn configuration(self) -> (f64, FuelCategory) {
        match self {
            ExampleCar::RenaultMegane => (1.4, FuelCategory::Essence),
            ExampleCar::RenaultEspace => (4.7, FuelCategory::Essence),
        }
    }
}

impl fmt::Display for ExampleCar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Load and clean the dataset and summarise it. No split or encoding is built, so any
/// non-empty cleaned dataset can be explored.
pub fn explore(config: &AppConfig) -> Result<DatasetSummary> {
    config.validate()?;
    let raw = RawTable::from_path(&config.dataset.path, config.delimiter_byte(), config.validation)?;
    let (dataset, _) = CleanedDataset::from_raw(&raw, config.validation)?;
    Ok(DatasetSummary::compute(&raw, &dataset))
}

/// Test-split predictions of one model, with their metrics.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub kind: ModelKind,
    pub predicted: Array1<f64>,
    pub actual: Array1<f64>,
    pub metrics: RegressionMetrics,
}

pub struct AppContext {
    raw: RawTable,
    dataset: CleanedDataset,
    issues: IssueReport,
    encodings: FeatureEncodings,
    split: TrainTestSplit,
    bounds: ControlBounds,
    models: Option<ModelBundle>,
    mode: ValidationMode,
}

impl AppContext {
    /// Load and prepare the dataset. Models are attached separately.
    pub fn prepare(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let raw = RawTable::from_path(&config.dataset.path, config.delimiter_byte(), config.validation)?;
        Self::from_raw(raw, config)
    }

    /// Prepare the dataset and load the three model artifacts.
    pub fn load(config: &AppConfig) -> Result<Self> {
        let context = Self::prepare(config)?;
        let models = load_models(&config.artifacts)?;
        tracing::info!("models loaded");
        Ok(context.with_models(models))
    }

    pub fn from_raw(raw: RawTable, config: &AppConfig) -> Result<Self> {
        let (dataset, clean_issues) = CleanedDataset::from_raw(&raw, config.validation)?;
        let encodings = FeatureEncodings::build(&dataset)?;
        let split = TrainTestSplit::new(dataset.len(), config.split.test_fraction, config.split.seed)?;
        let bounds = ControlBounds::from_dataset(&dataset);

        let mut issues = raw.issues().clone();
        issues.extend(clean_issues);

        Ok(Self {
            raw,
            dataset,
            issues,
            encodings,
            split,
            bounds,
            models: None,
            mode: config.validation,
        })
    }

    pub fn with_models(mut self, models: ModelBundle) -> Self {
        self.models = Some(models);
        self
    }

    pub fn raw(&self) -> &RawTable {
        &self.raw
    }

    pub fn dataset(&self) -> &CleanedDataset {
        &self.dataset
    }

    pub fn issues(&self) -> &IssueReport {
        &self.issues
    }

    pub fn encodings(&self) -> &FeatureEncodings {
        &self.encodings
    }

    pub fn split(&self) -> &TrainTestSplit {
        &self.split
    }

    pub fn bounds(&self) -> &ControlBounds {
        &self.bounds
    }

    pub fn models(&self) -> Result<&ModelBundle> {
        self.models
            .as_ref()
            .ok_or_else(|| crate::error::Co2Error::Config("no model artifacts loaded".into()))
    }

    pub fn predictor(&self, kind: ModelKind) -> Result<Predictor<'_>> {
        Ok(self.models()?.predictor(kind))
    }

    fn encoding(&self, kind: ModelKind) -> &FeatureSet {
        match kind {
            ModelKind::DecisionTree => &self.encodings.label,
            ModelKind::NeuralNetwork => &self.encodings.one_hot,
            ModelKind::SegmentedRegression => &self.encodings.minimal,
        }
    }

    /// Run `kind` on rows already encoded for it.
    fn run(&self, kind: ModelKind, features: &Array2<f64>) -> Result<Array1<f64>> {
        match self.predictor(kind)? {
            Predictor::Tabular(model) => model.predict(features),
            Predictor::Segmented(model) => {
                let (consumption, indicators) = FeatureEncodings::split_minimal(features);
                let (predicted, issues) =
                    model.predict_checked(&consumption.view(), &indicators.view(), self.mode)?;
                if !issues.is_empty() {
                    tracing::warn!(count = issues.issues().len(), "non one-hot indicator rows predicted");
                }
                Ok(predicted)
            }
        }
    }

    /// Predict the held-out rows and score them.
    pub fn evaluate(&self, kind: ModelKind) -> Result<Evaluation> {
        let test = self.encoding(kind).select(&self.split.test);
        let predicted = self.run(kind, &test.features)?;
        let metrics = RegressionMetrics::compute(&predicted.view(), &test.target.view())?;
        tracing::info!(model = %kind, rows = metrics.n, mse = metrics.mse, mae = metrics.mae, "model evaluated");
        Ok(Evaluation { kind, predicted, actual: test.target, metrics })
    }

    /// CO2 estimate in g/km for a manual configuration, clamped to the observed bounds.
    pub fn predict_vehicle(&self, kind: ModelKind, input: &VehicleInput) -> Result<f64> {
        let input = self.bounds.clamp(input);
        let features = match kind {
            ModelKind::DecisionTree => self.encodings.encode_label(&input)?,
            ModelKind::NeuralNetwork => self.encodings.encode_one_hot(&input)?,
            ModelKind::SegmentedRegression => {
                let h = input.fuel.one_hot();
                Array2::from_shape_fn((1, 6), |(_, j)| if j == 0 { input.consumption } else { h[j - 1] })
            }
        };
        let predicted = self.run(kind, &features)?;
        Ok(predicted[0])
    }

    /// Segmented-model estimate for one of the example cars. The configuration is used as-is.
    pub fn predict_example(&self, car: ExampleCar) -> Result<f64> {
        let (consumption, fuel) = car.configuration();
        Ok(self.models()?.segmented.call(consumption, fuel.one_hot()))
    }
}
