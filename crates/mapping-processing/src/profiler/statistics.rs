//! Per-sensor summary statistics and spot identification.

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::matrix::{SensorColumn, SensorMatrix};
use crate::types::SensorKind;
use crate::utils::{live_value, mean, round_to, sample_std};

/// Summary of one sensor's readings.
///
/// `mean` and `std` are rounded to 4 decimals; `std` uses the sample
/// (n - 1) denominator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorStatistics {
    pub column: String,
    pub sensor: String,
    pub kind: SensorKind,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl SensorStatistics {
    pub fn from_column(column: &SensorColumn, zero_is_missing: bool) -> Self {
        let values: Vec<f64> = column
            .values
            .iter()
            .filter_map(|v| live_value(*v, zero_is_missing))
            .collect();

        Self {
            column: column.name.clone(),
            sensor: column.label(),
            kind: column.kind,
            count: values.len(),
            mean: mean(&values).map(|m| round_to(m, 4)),
            std: sample_std(&values).map(|s| round_to(s, 4)),
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
        }
    }

    /// Statistics for every column of a matrix, in column order.
    pub fn for_matrix(matrix: &SensorMatrix, zero_is_missing: bool) -> Vec<Self> {
        matrix
            .columns()
            .iter()
            .map(|c| Self::from_column(c, zero_is_missing))
            .collect()
    }
}

/// A sensor singled out by its mean reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub column: String,
    pub sensor: String,
    pub mean: f64,
}

/// Hot/cold spots (temperature) and wet/dry spots (humidity).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotSummary {
    pub hot: Option<Spot>,
    pub cold: Option<Spot>,
    pub wet: Option<Spot>,
    pub dry: Option<Spot>,
}

impl SpotSummary {
    /// Highest and lowest mean per kind. Ties go to the first sensor listed.
    pub fn identify(stats: &[SensorStatistics]) -> Self {
        Self {
            hot: extreme(stats, SensorKind::Temperature, |a, b| a > b),
            cold: extreme(stats, SensorKind::Temperature, |a, b| a < b),
            wet: extreme(stats, SensorKind::Humidity, |a, b| a > b),
            dry: extreme(stats, SensorKind::Humidity, |a, b| a < b),
        }
    }

    /// Labelled entries in display order, skipping absent ones.
    pub fn entries(&self) -> Vec<(&'static str, &Spot)> {
        [
            ("Hot Spot", &self.hot),
            ("Cold Spot", &self.cold),
            ("Wet Spot", &self.wet),
            ("Dry Spot", &self.dry),
        ]
        .into_iter()
        .filter_map(|(label, spot)| spot.as_ref().map(|s| (label, s)))
        .collect()
    }
}

fn extreme(
    stats: &[SensorStatistics],
    kind: SensorKind,
    better: impl Fn(f64, f64) -> bool,
) -> Option<Spot> {
    let mut best: Option<(&SensorStatistics, f64)> = None;
    for s in stats.iter().filter(|s| s.kind == kind) {
        let Some(m) = s.mean else { continue };
        if best.is_none_or(|(_, current)| better(m, current)) {
            best = Some((s, m));
        }
    }
    best.map(|(s, m)| Spot {
        column: s.column.clone(),
        sensor: s.sensor.clone(),
        mean: m,
    })
}

/// Lay statistics out as a table: one row per statistic (`mean`, `std`,
/// `min`, `max`), one column per sensor.
pub fn statistics_to_dataframe(stats: &[SensorStatistics]) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(stats.len() + 1);
    columns.push(Column::new(
        "statistic".into(),
        ["mean", "std", "min", "max"],
    ));
    for s in stats {
        columns.push(Column::new(
            s.column.as_str().into(),
            [s.mean, s.std, s.min, s.max],
        ));
    }
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn col(name: &str, kind: SensorKind, values: &[f64]) -> SensorColumn {
        SensorColumn::new(name, kind, values.iter().map(|v| Some(*v)).collect())
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    #[test]
    fn test_statistics_basic() {
        let stats = SensorStatistics::from_column(
            &col("TempSensor1", SensorKind::Temperature, &[1.0, 2.0, 3.0, 4.0]),
            true,
        );
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, Some(2.5));
        assert_eq!(stats.std, Some(1.291));
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(4.0));
        assert_eq!(stats.sensor, "1");
    }

    #[test]
    fn test_statistics_skip_missing() {
        let column = SensorColumn::new(
            "TempSensor2",
            SensorKind::Temperature,
            vec![Some(10.0), None, Some(0.0), Some(20.0)],
        );
        let stats = SensorStatistics::from_column(&column, true);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean, Some(15.0));

        let stats = SensorStatistics::from_column(&column, false);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, Some(0.0));
    }

    #[test]
    fn test_statistics_empty_column() {
        let column = SensorColumn::new("TempSensor3", SensorKind::Temperature, vec![None, None]);
        let stats = SensorStatistics::from_column(&column, true);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.mean, None);
        assert_eq!(stats.std, None);
        assert_eq!(stats.min, None);
    }

    // ========================================================================
    // Spots
    // ========================================================================

    #[test]
    fn test_identify_spots() {
        let matrix = SensorMatrix::new(
            None,
            vec![
                col("TempSensor1", SensorKind::Temperature, &[20.0, 20.0]),
                col("TempSensor2", SensorKind::Temperature, &[24.0, 24.0]),
                col("TempSensor3", SensorKind::Temperature, &[18.0, 18.0]),
                col("RHSensor1", SensorKind::Humidity, &[50.0, 50.0]),
                col("RHSensor2", SensorKind::Humidity, &[40.0, 40.0]),
            ],
        )
        .unwrap();

        let stats = SensorStatistics::for_matrix(&matrix, true);
        let spots = SpotSummary::identify(&stats);

        assert_eq!(spots.hot.as_ref().unwrap().column, "TempSensor2");
        assert_eq!(spots.cold.as_ref().unwrap().column, "TempSensor3");
        assert_eq!(spots.wet.as_ref().unwrap().column, "RHSensor1");
        assert_eq!(spots.dry.as_ref().unwrap().column, "RHSensor2");
        assert_eq!(spots.entries().len(), 4);
    }

    #[test]
    fn test_spot_ties_keep_first() {
        let stats = vec![
            SensorStatistics::from_column(&col("TempSensor5", SensorKind::Temperature, &[20.0]), true),
            SensorStatistics::from_column(&col("TempSensor6", SensorKind::Temperature, &[20.0]), true),
        ];
        let spots = SpotSummary::identify(&stats);
        assert_eq!(spots.hot.unwrap().column, "TempSensor5");
        assert_eq!(spots.cold.unwrap().column, "TempSensor5");
        assert!(spots.wet.is_none());
    }

    #[test]
    fn test_statistics_to_dataframe() {
        let stats = vec![SensorStatistics::from_column(
            &col("TempSensor1", SensorKind::Temperature, &[1.0, 3.0]),
            true,
        )];
        let df = statistics_to_dataframe(&stats).unwrap();
        assert_eq!(df.shape(), (4, 2));
        let values = df.column("TempSensor1").unwrap().f64().unwrap();
        assert_eq!(values.get(0), Some(2.0));
        assert_eq!(values.get(2), Some(1.0));
        assert_eq!(values.get(3), Some(3.0));
    }
}
