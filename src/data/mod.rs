pub mod dataset;
pub mod explore;
pub mod fuel;
pub mod preprocessing;

pub use dataset::{CleanedDataset, ControlBounds, RawTable, VehicleInput, VehicleRecord};
pub use fuel::{remap_fuel_code, FuelCategory};
pub use preprocessing::{FeatureEncodings, FeatureSet, StandardScaler, TrainTestSplit};
