use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::config::ArtifactPaths;
use crate::error::Result;
use crate::model::ModelBundle;

pub fn save_artifact<T: Serialize>(path: impl AsRef<Path>, artifact: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let data = bincode::serialize(artifact)?;
    std::fs::write(path, data)?;
    tracing::info!(path = %path.display(), "artifact saved");
    Ok(())
}

pub fn load_artifact<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let artifact = bincode::deserialize(&data)?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "artifact loaded");
    Ok(artifact)
}

pub fn save_models(paths: &ArtifactPaths, models: &ModelBundle) -> Result<()> {
    save_artifact(&paths.decision_tree, &models.tree)?;
    save_artifact(&paths.neural_network, &models.network)?;
    save_artifact(&paths.segmented, &models.segmented)
}

pub fn load_models(paths: &ArtifactPaths) -> Result<ModelBundle> {
    Ok(ModelBundle {
        tree: load_artifact(&paths.decision_tree)?,
        network: load_artifact(&paths.neural_network)?,
        segmented: load_artifact(&paths.segmented)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::segmented::{FuelSegmentedRegressor, RegressionParameters};

    #[test]
    fn missing_artifact_is_io_error() {
        let err = load_artifact::<FuelSegmentedRegressor>("does/not/exist.bin").unwrap_err();
        assert!(matches!(err, crate::error::Co2Error::Io(_)));
    }

    #[test]
    fn saved_regressor_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/segmented.bin");
        let model = FuelSegmentedRegressor::new(RegressionParameters::new([(1.0, 2.0); 5]));
        save_artifact(&path, &model).unwrap();
        let loaded: FuelSegmentedRegressor = load_artifact(&path).unwrap();
        assert_eq!(loaded, model);
    }
}
