//! Error types and the data-issue taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Co2Error>;

#[derive(Error, Debug)]
pub enum Co2Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Column not found in header: {0}")]
    MissingColumn(String),

    #[error("Dataset has no usable rows")]
    EmptyDataset,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Plot error: {0}")]
    Plot(String),

    #[error("Rejected input: {0}")]
    Rejected(DataIssue),
}

impl From<serde_json::Error> for Co2Error {
    fn from(e: serde_json::Error) -> Self {
        Co2Error::Config(e.to_string())
    }
}

/// Something wrong with an input row or vector that permissive mode lets through.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataIssue {
    #[error("line {line}: malformed row ({reason})")]
    MalformedRow { line: u64, reason: String },

    #[error("line {line}: fuel label '{label}' is not a known category")]
    UnmappedCategory { line: u64, label: String },

    #[error("line {line}: missing value for '{column}'")]
    MissingField { line: u64, column: String },

    #[error("row {row}: indicator vector {values:?} is not one-hot")]
    InvalidIndicatorVector { row: usize, values: Vec<f64> },
}

impl DataIssue {
    pub fn kind(&self) -> &'static str {
        match self {
            DataIssue::MalformedRow { .. } => "malformed_row",
            DataIssue::UnmappedCategory { .. } => "unmapped_category",
            DataIssue::MissingField { .. } => "missing_field",
            DataIssue::InvalidIndicatorVector { .. } => "invalid_indicator_vector",
        }
    }
}

/// How data issues are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Record the issue, log it and carry on.
    #[default]
    Permissive,
    /// Fail on the first issue.
    Strict,
}

/// Issues collected while loading or predicting in permissive mode.
#[derive(Debug, Clone, Default)]
pub struct IssueReport {
    issues: Vec<DataIssue>,
}

impl IssueReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `issue`, or turn it into an error when `mode` is strict.
    pub fn raise(&mut self, mode: ValidationMode, issue: DataIssue) -> Result<()> {
        match mode {
            ValidationMode::Strict => Err(Co2Error::Rejected(issue)),
            ValidationMode::Permissive => {
                tracing::debug!(kind = issue.kind(), "{}", issue);
                self.issues.push(issue);
                Ok(())
            }
        }
    }

    pub fn issues(&self) -> &[DataIssue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.issues.iter().filter(|i| i.kind() == kind).count()
    }

    pub fn extend(&mut self, other: IssueReport) {
        self.issues.extend(other.issues);
    }

    /// Emit one warning summarising the collected issues.
    pub fn log_summary(&self, stage: &str) {
        if self.is_empty() {
            return;
        }
        tracing::warn!(
            stage,
            malformed_rows = self.count("malformed_row"),
            unmapped_categories = self.count("unmapped_category"),
            missing_fields = self.count("missing_field"),
            invalid_indicators = self.count("invalid_indicator_vector"),
            "data issues skipped"
        );
    }
}

impl fmt::Display for IssueReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Malformed rows      : {}", self.count("malformed_row"))?;
        writeln!(f, "Unmapped categories : {}", self.count("unmapped_category"))?;
        writeln!(f, "Missing fields      : {}", self.count("missing_field"))?;
        write!(f, "Invalid indicators  : {}", self.count("invalid_indicator_vector"))
    }
}
