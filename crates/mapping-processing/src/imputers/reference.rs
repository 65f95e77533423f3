use chrono::Duration;

use crate::matrix::{SensorColumn, SensorMatrix};
use crate::utils::{is_missing, live_value};

/// Rows used to learn how a target sensor relates to its neighbors.
///
/// Only rows where the target is valid are included. With a time axis the
/// window is further limited to rows at or after
/// `latest valid timestamp - reference period`; rows with an unknown
/// timestamp then fall outside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceWindow {
    rows: Vec<usize>,
}

impl ReferenceWindow {
    pub fn build(
        matrix: &SensorMatrix,
        target: &SensorColumn,
        period_hours: f64,
        zero_is_missing: bool,
    ) -> Self {
        let valid: Vec<usize> = (0..target.len())
            .filter(|&i| !is_missing(target.values[i], zero_is_missing))
            .collect();

        if matrix.timestamps().is_none() {
            return Self { rows: valid };
        }

        let latest = valid.iter().filter_map(|&i| matrix.timestamp(i)).max();
        let Some(latest) = latest else {
            return Self { rows: valid };
        };

        // A period reaching past the representable calendar has no lower bound.
        let start = Duration::try_milliseconds((period_hours * 3_600_000.0) as i64)
            .and_then(|period| latest.checked_sub_signed(period));
        let Some(start) = start else {
            return Self { rows: valid };
        };

        let rows = valid
            .into_iter()
            .filter(|&i| matrix.timestamp(i).is_some_and(|ts| ts >= start))
            .collect();
        Self { rows }
    }

    /// Window over an explicit row set.
    pub fn from_rows(rows: Vec<usize>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Jointly valid `(target, neighbor)` readings inside the window.
    pub fn paired(
        &self,
        target: &SensorColumn,
        neighbor: &SensorColumn,
        zero_is_missing: bool,
    ) -> (Vec<f64>, Vec<f64>) {
        self.rows
            .iter()
            .filter_map(|&i| {
                let t = live_value(target.values[i], zero_is_missing)?;
                let n = live_value(neighbor.values[i], zero_is_missing)?;
                Some((t, n))
            })
            .unzip()
    }
}
