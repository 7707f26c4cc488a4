//! Loading the raw emissions table and cleaning it into typed records.

use csv::{ReaderBuilder, StringRecord};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::data::fuel::{remap_fuel_code, FuelCategory};
use crate::error::{Co2Error, DataIssue, IssueReport, Result, ValidationMode};

pub const CONSUMPTION: &str = "Consommation mixte (l/100km)";
pub const FUEL: &str = "Carburant";
pub const CO2: &str = "CO2 (g/km)";
pub const POWER: &str = "Puissance administrative";
pub const MASS: &str = "masse vide euro min (kg)";

/// One parsed row of the raw table. Any field may still be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub line: u64,
    pub consumption: Option<f64>,
    pub fuel: Option<String>,
    pub co2: Option<f64>,
    pub power: Option<f64>,
    pub mass: Option<f64>,
}

/// Raw table restricted to the selected columns.
#[derive(Debug, Clone)]
pub struct RawTable {
    headers: Vec<String>,
    records: Vec<RawRecord>,
    issues: IssueReport,
}

struct ColumnIndex {
    consumption: usize,
    fuel: usize,
    co2: usize,
    power: usize,
    mass: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &[String]) -> Result<Self> {
        let lookup: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect();
        let find = |name: &str| {
            lookup
                .get(name)
                .copied()
                .ok_or_else(|| Co2Error::MissingColumn(name.to_string()))
        };
        Ok(Self {
            consumption: find(CONSUMPTION)?,
            fuel: find(FUEL)?,
            co2: find(CO2)?,
            power: find(POWER)?,
            mass: find(MASS)?,
        })
    }
}

/// Null spellings read as missing, compared case-insensitively.
const NULL_TOKENS: &[&str] = &[
    "na", "nan", "-nan", "+nan", "n/a", "#n/a", "#n/a n/a", "#na", "<na>", "null", "none",
    "-1.#ind", "1.#ind", "-1.#qnan", "1.#qnan",
];

fn is_missing(field: &str) -> bool {
    let field = field.trim();
    field.is_empty() || NULL_TOKENS.iter().any(|t| field.eq_ignore_ascii_case(t))
}

fn parse_numeric(record: &StringRecord, idx: usize, column: &str) -> std::result::Result<Option<f64>, String> {
    let field = record.get(idx).unwrap_or("");
    if is_missing(field) {
        return Ok(None);
    }
    let value = field
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("'{}' is not a number in column '{}'", field.trim(), column))?;
    // inf and signed NaN parse successfully but carry no measurement
    Ok(value.is_finite().then_some(value))
}

fn parse_row(record: &StringRecord, columns: &ColumnIndex, line: u64) -> std::result::Result<RawRecord, String> {
    let fuel = record
        .get(columns.fuel)
        .filter(|f| !is_missing(f))
        .map(|f| f.trim().to_string());
    Ok(RawRecord {
        line,
        consumption: parse_numeric(record, columns.consumption, CONSUMPTION)?,
        fuel,
        co2: parse_numeric(record, columns.co2, CO2)?,
        power: parse_numeric(record, columns.power, POWER)?,
        mass: parse_numeric(record, columns.mass, MASS)?,
    })
}

impl RawTable {
    pub fn from_path(path: impl AsRef<Path>, delimiter: u8, mode: ValidationMode) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "loading dataset");
        let file = File::open(path)?;
        Self::from_reader(file, delimiter, mode)
    }

    /// Read a delimited table with headers. Rows that cannot be parsed are skipped.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8, mode: ValidationMode) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        let columns = ColumnIndex::from_headers(&headers)?;

        let mut records = Vec::new();
        let mut issues = IssueReport::new();

        for result in rdr.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    if let csv::ErrorKind::Io(_) = e.kind() {
                        return Err(e.into());
                    }
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    issues.raise(mode, DataIssue::MalformedRow { line, reason: e.to_string() })?;
                    continue;
                }
            };
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            match parse_row(&record, &columns, line) {
                Ok(raw) => records.push(raw),
                Err(reason) => issues.raise(mode, DataIssue::MalformedRow { line, reason })?,
            }
        }

        tracing::info!(rows = records.len(), columns = headers.len(), "raw table loaded");
        issues.log_summary("load");

        Ok(Self { headers, records, issues })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn issues(&self) -> &IssueReport {
        &self.issues
    }
}

/// A fully populated row with a canonical fuel category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub consumption: f64,
    pub fuel: FuelCategory,
    pub co2: f64,
    pub power: f64,
    pub mass: f64,
}

/// Cleaned, fixed-schema dataset. Row order follows the raw table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedDataset {
    records: Vec<VehicleRecord>,
}

impl CleanedDataset {
    /// Drop incomplete rows and rows with a non-canonical fuel label.
    pub fn from_raw(raw: &RawTable, mode: ValidationMode) -> Result<(Self, IssueReport)> {
        let mut issues = IssueReport::new();
        let mut records = Vec::with_capacity(raw.len());

        for row in raw.records() {
            let missing: Vec<&str> = [
                (CONSUMPTION, row.consumption.is_none()),
                (FUEL, row.fuel.is_none()),
                (CO2, row.co2.is_none()),
                (POWER, row.power.is_none()),
                (MASS, row.mass.is_none()),
            ]
            .iter()
            .filter(|(_, absent)| *absent)
            .map(|(name, _)| *name)
            .collect();

            for column in &missing {
                issues.raise(
                    mode,
                    DataIssue::MissingField { line: row.line, column: column.to_string() },
                )?;
            }

            let (Some(consumption), Some(fuel), Some(co2), Some(power), Some(mass)) =
                (row.consumption, row.fuel.as_deref(), row.co2, row.power, row.mass)
            else {
                continue;
            };

            let label = remap_fuel_code(fuel);
            let Some(fuel) = FuelCategory::from_label(&label) else {
                issues.raise(mode, DataIssue::UnmappedCategory { line: row.line, label })?;
                continue;
            };

            records.push(VehicleRecord { consumption, fuel, co2, power, mass });
        }

        if records.is_empty() {
            return Err(Co2Error::EmptyDataset);
        }

        tracing::info!(kept = records.len(), dropped = raw.len() - records.len(), "dataset cleaned");
        issues.log_summary("clean");

        Ok((Self { records }, issues))
    }

    pub fn from_records(records: Vec<VehicleRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(Co2Error::EmptyDataset);
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[VehicleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column(&self, f: impl Fn(&VehicleRecord) -> f64) -> Array1<f64> {
        self.records.iter().map(f).collect()
    }

    pub fn target(&self) -> Array1<f64> {
        self.column(|r| r.co2)
    }
}

/// A user-chosen vehicle configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleInput {
    pub consumption: f64,
    pub fuel: FuelCategory,
    pub power: f64,
    pub mass: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl FeatureRange {
    fn of(values: &Array1<f64>) -> Self {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self { min, max, mean: values.mean().unwrap_or(0.0) }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl fmt::Display for FeatureRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.2}, {:.2}] (mean {:.2})", self.min, self.max, self.mean)
    }
}

/// Bounds of the manual prediction controls, observed on the historical data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlBounds {
    pub consumption: FeatureRange,
    pub power: FeatureRange,
    pub mass: FeatureRange,
}

impl ControlBounds {
    pub fn from_dataset(dataset: &CleanedDataset) -> Self {
        Self {
            consumption: FeatureRange::of(&dataset.column(|r| r.consumption)),
            power: FeatureRange::of(&dataset.column(|r| r.power)),
            mass: FeatureRange::of(&dataset.column(|r| r.mass)),
        }
    }

    /// Clamp every numeric control into its observed range.
    pub fn clamp(&self, input: &VehicleInput) -> VehicleInput {
        let clamped = VehicleInput {
            consumption: self.consumption.clamp(input.consumption),
            fuel: input.fuel,
            power: self.power.clamp(input.power),
            mass: self.mass.clamp(input.mass),
        };
        if clamped != *input {
            tracing::warn!(?input, ?clamped, "input outside observed bounds, clamped");
        }
        clamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Marque,Consommation mixte (l/100km),Carburant,CO2 (g/km),Puissance administrative,masse vide euro min (kg)\n";

    fn table(body: &str) -> RawTable {
        let csv = format!("{}{}", HEADER, body);
        RawTable::from_reader(csv.as_bytes(), b',', ValidationMode::Permissive).unwrap()
    }

    #[test]
    fn loads_selected_columns() {
        let raw = table("RENAULT,5.5,GO,144,6,1400\nPEUGEOT,6.1,ES,139,5,1200\n");
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.headers().len(), 6);
        assert_eq!(raw.records()[0].consumption, Some(5.5));
        assert_eq!(raw.records()[1].fuel.as_deref(), Some("ES"));
    }

    #[test]
    fn missing_column_is_an_error() {
        let csv = "Consommation mixte (l/100km),Carburant\n5.0,GO\n";
        let err = RawTable::from_reader(csv.as_bytes(), b',', ValidationMode::Permissive).unwrap_err();
        assert!(matches!(err, Co2Error::MissingColumn(ref c) if c == CO2));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let raw = table("RENAULT,5.5,GO,144,6,1400\nBROKEN,1,2\nPEUGEOT,abc,ES,139,5,1200\n");
        assert_eq!(raw.len(), 1);
        assert_eq!(raw.issues().count("malformed_row"), 2);
    }

    #[test]
    fn strict_mode_rejects_malformed_rows() {
        let csv = format!("{}BROKEN,1,2\n", HEADER);
        let err = RawTable::from_reader(csv.as_bytes(), b',', ValidationMode::Strict).unwrap_err();
        assert!(matches!(err, Co2Error::Rejected(DataIssue::MalformedRow { .. })));
    }

    #[test]
    fn row_missing_mass_is_dropped() {
        let raw = table("A,5.5,GO,144,6,1400\nB,6.1,ES,139,5,\nC,7.0,ES,160,7,1500\n");
        let (clean, issues) = CleanedDataset::from_raw(&raw, ValidationMode::Permissive).unwrap();
        assert_eq!(clean.len(), 2);
        assert!(clean.records().iter().all(|r| r.mass != 0.0));
        assert_eq!(clean.records()[1].co2, 160.0);
        assert_eq!(
            issues.issues(),
            &[DataIssue::MissingField { line: 3, column: MASS.to_string() }]
        );
    }

    #[test]
    fn non_canonical_fuel_is_dropped() {
        let raw = table("A,5.5,GO,144,6,1400\nB,0.0,EL,0,3,1600\nC,6.0,XX,150,5,1300\n");
        let (clean, issues) = CleanedDataset::from_raw(&raw, ValidationMode::Permissive).unwrap();
        assert_eq!(clean.len(), 1);
        assert_eq!(issues.count("unmapped_category"), 2);
        assert_eq!(clean.records()[0].fuel, FuelCategory::Gazole);
    }

    #[test]
    fn empty_after_cleaning_is_an_error() {
        let raw = table("A,,GO,144,6,1400\n");
        let err = CleanedDataset::from_raw(&raw, ValidationMode::Permissive).unwrap_err();
        assert!(matches!(err, Co2Error::EmptyDataset));
    }

    #[test]
    fn invalid_utf8_row_is_malformed() {
        let mut bytes = HEADER.as_bytes().to_vec();
        bytes.extend_from_slice(b"RENAULT,5.5,GO,144,6,1400\n");
        bytes.extend_from_slice(b"CITRO\xff\xfeN,6.1,ES,139,5,1200\n");
        let raw = RawTable::from_reader(bytes.as_slice(), b',', ValidationMode::Permissive).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw.issues().count("malformed_row"), 1);
        assert_eq!(raw.records()[0].line, 2);
    }

    #[test]
    fn null_tokens_are_missing_in_any_case() {
        let raw = table("A,NA,GO,144,6,1400\nB,5.0,nan,139,5,1200\nC,5.0,GO,NaN,5,1200\nD,5.0,GO,130,N/A,1200\nE,5.0,GO,130,6,NULL\n");
        assert_eq!(raw.len(), 5);
        assert!(raw.issues().is_empty());
        assert_eq!(raw.records()[0].consumption, None);
        assert_eq!(raw.records()[1].fuel, None);
        assert_eq!(raw.records()[2].co2, None);
        assert_eq!(raw.records()[3].power, None);
        assert_eq!(raw.records()[4].mass, None);
    }

    #[test]
    fn non_finite_cells_are_dropped() {
        let body = "A,5.0,GO,130,6,1300\nB,6.0,ES,140,5,-nan\nC,7.0,GO,182,8,1600\nD,inf,ES,185,9,1700\nE,8.0,ES,185,9,1700\n";
        let csv = format!("{}{}", HEADER, body);
        let raw = RawTable::from_reader(csv.as_bytes(), b',', ValidationMode::Permissive).unwrap();
        let (clean, issues) = CleanedDataset::from_raw(&raw, ValidationMode::Permissive).unwrap();
        assert_eq!(clean.len(), 3);
        assert_eq!(issues.count("missing_field"), 2);
        assert!(clean.records().iter().all(|r| r.consumption.is_finite() && r.mass.is_finite()));

        let encodings = crate::data::preprocessing::FeatureEncodings::build(&clean).unwrap();
        assert!(encodings.label_scaler.mean.iter().all(|m| m.is_finite()));
        assert!(encodings.label.features.iter().all(|v| v.is_finite()));

        let strict = RawTable::from_reader(csv.as_bytes(), b',', ValidationMode::Strict).unwrap();
        let err = CleanedDataset::from_raw(&strict, ValidationMode::Strict).unwrap_err();
        assert!(matches!(err, Co2Error::Rejected(DataIssue::MissingField { line: 3, .. })));
    }

    #[test]
    fn bounds_clamp_inputs() {
        let raw = table("A,4.0,GO,100,4,1000\nB,8.0,ES,200,8,2000\n");
        let (clean, _) = CleanedDataset::from_raw(&raw, ValidationMode::Permissive).unwrap();
        let bounds = ControlBounds::from_dataset(&clean);
        assert_eq!(bounds.consumption.min, 4.0);
        assert_eq!(bounds.mass.max, 2000.0);
        assert_eq!(bounds.power.mean, 6.0);

        let input = VehicleInput { consumption: 12.0, fuel: FuelCategory::Essence, power: 5.0, mass: 500.0 };
        let clamped = bounds.clamp(&input);
        assert_eq!(clamped.consumption, 8.0);
        assert_eq!(clamped.power, 5.0);
        assert_eq!(clamped.mass, 1000.0);
    }
}
