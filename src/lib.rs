//! Vehicle CO2 emissions: dataset preparation, three regression models and their
//! evaluation.

pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod training;
pub mod utils;

pub use app::{AppContext, Evaluation, ExampleCar};
pub use config::AppConfig;
pub use error::{Co2Error, DataIssue, IssueReport, Result, ValidationMode};
pub use evaluation::RegressionMetrics;
pub use model::{ModelBundle, ModelKind, Predictor, Regressor};
