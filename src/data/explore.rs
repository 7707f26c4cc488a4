//! Summary statistics for the exploration view.

use ndarray::{Array1, Array2};
use std::collections::BTreeMap;
use std::fmt;

use crate::data::dataset::{CleanedDataset, RawRecord, RawTable, CO2, CONSUMPTION, FUEL, MASS, POWER};
use crate::data::fuel::{remap_fuel_code, FuelCategory};

/// Numeric columns covered by the correlation matrix, in display order.
pub const NUMERIC_COLUMNS: [&str; 4] = [CONSUMPTION, POWER, MASS, CO2];

/// Count, moments and quartiles of one numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; NaN below two values.
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Linearly interpolated quantile of already sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

impl ColumnStats {
    /// `None` for an empty column.
    pub fn describe(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let std = if n > 1 {
            (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            f64::NAN
        };

        Some(Self {
            count: n,
            mean,
            std,
            min: sorted[0],
            q1: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q3: quantile(&sorted, 0.75),
            max: sorted[n - 1],
        })
    }

    /// Box-plot whiskers: 1.5 interquartile ranges beyond the quartiles.
    pub fn fences(&self) -> (f64, f64) {
        let iqr = self.q3 - self.q1;
        (self.q1 - 1.5 * iqr, self.q3 + 1.5 * iqr)
    }
}

/// CO2 distribution of one fuel category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelDistribution {
    pub fuel: FuelCategory,
    pub co2: ColumnStats,
    /// Rows outside [`ColumnStats::fences`].
    pub outliers: usize,
}

impl FuelDistribution {
    fn compute(fuel: FuelCategory, values: &[f64]) -> Option<Self> {
        let co2 = ColumnStats::describe(values)?;
        let (low, high) = co2.fences();
        let outliers = values.iter().filter(|&&v| v < low || v > high).count();
        Some(Self { fuel, co2, outliers })
    }
}

fn raw_column(records: &[RawRecord], f: impl Fn(&RawRecord) -> Option<f64>) -> Vec<f64> {
    records.iter().filter_map(f).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub raw_rows: usize,
    pub columns: usize,
    pub cleaned_rows: usize,
    pub skipped_rows: usize,
    /// Missing values per selected column, over the raw rows.
    pub missing: Vec<(&'static str, usize)>,
    /// Raw rows per remapped fuel label, non-canonical labels included.
    pub fuel_counts: BTreeMap<String, usize>,
    /// Statistics of [`NUMERIC_COLUMNS`] over the non-missing raw values.
    pub describe: Vec<(&'static str, Option<ColumnStats>)>,
    /// CO2 per fuel category over the cleaned rows, for the categories present.
    pub co2_by_fuel: Vec<FuelDistribution>,
    /// Pearson correlation of [`NUMERIC_COLUMNS`] over the cleaned rows.
    pub correlation: Array2<f64>,
}

/// Pearson correlation; NaN when either side is constant.
pub fn pearson(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    let (Some(ma), Some(mb)) = (a.mean(), b.mean()) else {
        return f64::NAN;
    };
    let da = a - ma;
    let db = b - mb;
    let cov = (&da * &db).sum();
    let denom = (da.mapv(|v| v * v).sum() * db.mapv(|v| v * v).sum()).sqrt();
    cov / denom
}

impl DatasetSummary {
    pub fn compute(raw: &RawTable, cleaned: &CleanedDataset) -> Self {
        let records = raw.records();
        let missing = vec![
            (CONSUMPTION, records.iter().filter(|r| r.consumption.is_none()).count()),
            (FUEL, records.iter().filter(|r| r.fuel.is_none()).count()),
            (CO2, records.iter().filter(|r| r.co2.is_none()).count()),
            (POWER, records.iter().filter(|r| r.power.is_none()).count()),
            (MASS, records.iter().filter(|r| r.mass.is_none()).count()),
        ];

        let mut fuel_counts = BTreeMap::new();
        for fuel in records.iter().filter_map(|r| r.fuel.as_deref()) {
            *fuel_counts.entry(remap_fuel_code(fuel)).or_insert(0) += 1;
        }

        let describe = vec![
            (CONSUMPTION, ColumnStats::describe(&raw_column(records, |r| r.consumption))),
            (POWER, ColumnStats::describe(&raw_column(records, |r| r.power))),
            (MASS, ColumnStats::describe(&raw_column(records, |r| r.mass))),
            (CO2, ColumnStats::describe(&raw_column(records, |r| r.co2))),
        ];

        let co2_by_fuel = FuelCategory::ALL
            .iter()
            .filter_map(|&fuel| {
                let values: Vec<f64> = cleaned
                    .records()
                    .iter()
                    .filter(|r| r.fuel == fuel)
                    .map(|r| r.co2)
                    .collect();
                FuelDistribution::compute(fuel, &values)
            })
            .collect();

        let columns: Vec<Array1<f64>> = vec![
            cleaned.column(|r| r.consumption),
            cleaned.column(|r| r.power),
            cleaned.column(|r| r.mass),
            cleaned.target(),
        ];
        let k = columns.len();
        let correlation = Array2::from_shape_fn((k, k), |(i, j)| {
            if i == j {
                1.0
            } else {
                pearson(&columns[i], &columns[j])
            }
        });

        Self {
            raw_rows: raw.len(),
            columns: raw.headers().len(),
            cleaned_rows: cleaned.len(),
            skipped_rows: raw.issues().issues().len(),
            missing,
            fuel_counts,
            describe,
            co2_by_fuel,
            correlation,
        }
    }

    /// Correlation of each explanatory column with CO2, strongest first.
    pub fn target_correlations(&self) -> Vec<(&'static str, f64)> {
        let target = NUMERIC_COLUMNS.len() - 1;
        let mut out: Vec<(&'static str, f64)> = (0..target)
            .map(|i| (NUMERIC_COLUMNS[i], self.correlation[[i, target]]))
            .collect();
        out.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap_or(std::cmp::Ordering::Equal));
        out
    }
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} observations, {} columns ({} unreadable rows skipped)",
            self.raw_rows, self.columns, self.skipped_rows
        )?;
        writeln!(f, "{} complete observations after cleaning", self.cleaned_rows)?;

        writeln!(
            f,
            "\n  {:<32} {:>8} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
            "", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
        )?;
        for (column, stats) in &self.describe {
            match stats {
                Some(s) => writeln!(
                    f,
                    "  {:<32} {:>8} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>9.2}",
                    column, s.count, s.mean, s.std, s.min, s.q1, s.median, s.q3, s.max
                )?,
                None => writeln!(f, "  {:<32} {:>8}", column, 0)?,
            }
        }

        writeln!(f, "\nMissing values:")?;
        for (column, count) in &self.missing {
            writeln!(f, "  {:<32} {}", column, count)?;
        }

        writeln!(f, "\nFuel types:")?;
        let total: usize = self.fuel_counts.values().sum();
        for (label, count) in &self.fuel_counts {
            let share = if total > 0 { *count as f64 / total as f64 * 100.0 } else { 0.0 };
            writeln!(f, "  {:<32} {:>8} ({:.1}%)", label, count, share)?;
        }

        writeln!(f, "\n{} by fuel type:", CO2)?;
        writeln!(
            f,
            "  {:<32} {:>8} {:>9} {:>9} {:>9} {:>9} {:>9} {:>8}",
            "", "count", "min", "25%", "50%", "75%", "max", "outliers"
        )?;
        for dist in &self.co2_by_fuel {
            let s = &dist.co2;
            writeln!(
                f,
                "  {:<32} {:>8} {:>9.1} {:>9.1} {:>9.1} {:>9.1} {:>9.1} {:>8}",
                dist.fuel.label(), s.count, s.min, s.q1, s.median, s.q3, s.max, dist.outliers
            )?;
        }

        writeln!(f, "\nCorrelation with {}:", CO2)?;
        for (column, r) in self.target_correlations() {
            writeln!(f, "  {:<32} {:.2}", column, r)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationMode;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn pearson_of_linear_relation() {
        let a = array![1.0, 2.0, 3.0, 4.0];
        assert_abs_diff_eq!(pearson(&a, &(&a * 2.0 + 1.0)), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pearson(&a, &(&a * -3.0)), -1.0, epsilon = 1e-12);
        assert!(pearson(&a, &array![5.0, 5.0, 5.0, 5.0]).is_nan());
    }

    #[test]
    fn summary_counts() {
        let csv = "Consommation mixte (l/100km),Carburant,CO2 (g/km),Puissance administrative,masse vide euro min (kg)\n\
                   5.0,GO,130,6,1300\n\
                   6.0,ES,140,5,\n\
                   7.0,GO,182,8,1600\n\
                   ,EL,0,3,1500\n\
                   8.0,ES,185,9,1700\n";
        let raw = RawTable::from_reader(csv.as_bytes(), b',', ValidationMode::Permissive).unwrap();
        let (clean, _) = CleanedDataset::from_raw(&raw, ValidationMode::Permissive).unwrap();
        let summary = DatasetSummary::compute(&raw, &clean);

        assert_eq!(summary.raw_rows, 5);
        assert_eq!(summary.columns, 5);
        assert_eq!(summary.cleaned_rows, 3);
        assert_eq!(summary.missing[0], (CONSUMPTION, 1));
        assert_eq!(summary.missing[4], (MASS, 1));
        assert_eq!(summary.fuel_counts["Gazole"], 2);
        assert_eq!(summary.fuel_counts["Electrique"], 1);
        assert_eq!(summary.correlation.dim(), (4, 4));
        assert_eq!(summary.correlation[[2, 2]], 1.0);

        let consumption = summary.describe[0].1.unwrap();
        assert_eq!(summary.describe[0].0, CONSUMPTION);
        assert_eq!(consumption.count, 4);
        assert_eq!(consumption.min, 5.0);
        assert_eq!(consumption.max, 8.0);
        let mass = summary.describe[2].1.unwrap();
        assert_eq!(mass.count, 4);

        let fuels: Vec<FuelCategory> = summary.co2_by_fuel.iter().map(|d| d.fuel).collect();
        assert_eq!(fuels, vec![FuelCategory::Essence, FuelCategory::Gazole]);
        assert_eq!(summary.co2_by_fuel[0].co2.count, 1);
        assert_eq!(summary.co2_by_fuel[1].co2.median, 156.0);

        let text = summary.to_string();
        assert!(text.contains("CO2 (g/km) by fuel type:"));
        assert!(text.contains("outliers"));

        let top = summary.target_correlations();
        assert_eq!(top.len(), 3);
        assert!(top[0].1.abs() >= top[1].1.abs());
    }

    #[test]
    fn describe_matches_interpolated_quartiles() {
        let stats = ColumnStats::describe(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, 2.5);
        assert_abs_diff_eq!(stats.std, (5.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_eq!((stats.min, stats.max), (1.0, 4.0));
        assert_eq!(stats.q1, 1.75);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.q3, 3.25);

        let single = ColumnStats::describe(&[7.0]).unwrap();
        assert!(single.std.is_nan());
        assert_eq!(single.q1, 7.0);
        assert!(ColumnStats::describe(&[]).is_none());
    }

    #[test]
    fn fuel_distribution_counts_outliers() {
        let dist = FuelDistribution::compute(FuelCategory::Gazole, &[10.0, 11.0, 12.0, 13.0, 100.0]).unwrap();
        assert_eq!(dist.co2.q1, 11.0);
        assert_eq!(dist.co2.q3, 13.0);
        assert_eq!(dist.co2.fences(), (8.0, 16.0));
        assert_eq!(dist.outliers, 1);
    }
}
