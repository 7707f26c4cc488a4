//! Runtime configuration, read from an optional JSON file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Co2Error, Result, ValidationMode};
use crate::model::network::NetworkConfig;
use crate::model::segmented::SegmentedConfig;
use crate::model::tree::TreeConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub path: PathBuf,
    pub delimiter: char,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("data_2012-2015.csv"), delimiter: ',' }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPaths {
    pub decision_tree: PathBuf,
    pub neural_network: PathBuf,
    pub segmented: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            decision_tree: PathBuf::from("models/decision_tree.bin"),
            neural_network: PathBuf::from("models/neural_network.bin"),
            segmented: PathBuf::from("models/segmented_regression.bin"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { test_fraction: 0.2, seed: 9001 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub tree: TreeConfig,
    pub network: NetworkConfig,
    pub segmented: SegmentedConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dataset: DatasetConfig,
    pub artifacts: ArtifactPaths,
    pub split: SplitConfig,
    pub validation: ValidationMode,
    pub training: TrainingConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let config: AppConfig = serde_json::from_slice(&bytes)?;
        tracing::debug!(path = %path.display(), "config loaded");
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.dataset.delimiter.is_ascii() {
            return Err(Co2Error::Config(format!(
                "delimiter must be a single ASCII character, got '{}'",
                self.dataset.delimiter
            )));
        }
        if !(self.split.test_fraction > 0.0 && self.split.test_fraction < 1.0) {
            return Err(Co2Error::Config(format!(
                "split.test_fraction must be in (0, 1), got {}",
                self.split.test_fraction
            )));
        }
        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.dataset.delimiter as u8
    }
}
