pub mod history;
pub mod trainer;

pub use history::TrainingHistory;
pub use trainer::{train_models, TrainedModels};
