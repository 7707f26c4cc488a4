use crate::config::TrainingConfig;
use crate::data::preprocessing::{FeatureEncodings, TrainTestSplit};
use crate::error::Result;
use crate::model::network::NeuralNetwork;
use crate::model::segmented::FuelSegmentedRegressor;
use crate::model::tree::DecisionTreeRegressor;
use crate::model::ModelBundle;
use crate::training::history::TrainingHistory;

pub struct TrainedModels {
    pub models: ModelBundle,
    pub network_history: TrainingHistory,
    pub segmented_history: TrainingHistory,
}

/// Fit all three models on the training rows of their respective encodings.
pub fn train_models(
    encodings: &FeatureEncodings,
    split: &TrainTestSplit,
    config: &TrainingConfig,
) -> Result<TrainedModels> {
    let label = encodings.label.select(&split.train);
    let one_hot = encodings.one_hot.select(&split.train);
    let minimal = encodings.minimal.select(&split.train);

    tracing::info!(train_rows = split.train.len(), test_rows = split.test.len(), "training models");

    let tree = DecisionTreeRegressor::fit(&label.features, &label.target, &config.tree)?;

    let (network, network_history) = NeuralNetwork::fit(&one_hot.features, &one_hot.target, &config.network)?;

    let (consumption, indicators) = FeatureEncodings::split_minimal(&minimal.features);
    let (segmented, segmented_history) = FuelSegmentedRegressor::fit(
        &consumption.view(),
        &indicators.view(),
        &minimal.target.view(),
        &config.segmented,
    )?;

    if let Some(loss) = segmented_history.final_loss() {
        tracing::info!(loss, params = ?segmented.params().pairs(), "segmented regression fitted");
    }

    Ok(TrainedModels {
        models: ModelBundle { tree, network, segmented },
        network_history,
        segmented_history,
    })
}
