//! Typed sensor matrix.
//!
//! A [`SensorMatrix`] is an optional timestamp column plus an ordered list of
//! sensor columns, each carrying its kind and index alongside its values.
//! Cells are `Option<f64>`; whether an exact zero also counts as missing is a
//! caller policy (see [`crate::utils::is_missing`]).

mod frame;
mod naming;
mod selection;

pub use frame::{PLAN_COLUMNS, from_dataframe, plans_from_dataframe, to_dataframe};
pub use naming::{SensorNaming, parse_sensor_index};
pub use selection::{RoomPlan, SensorSelection, TimeWindow};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{MappingError, Result};
use crate::types::SensorKind;
use crate::utils::is_missing;

/// One sensor's readings, aligned with the matrix rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorColumn {
    pub name: String,
    pub kind: SensorKind,
    /// Numeric sensor index, when the name carries one.
    pub index: Option<u32>,
    pub values: Vec<Option<f64>>,
}

impl SensorColumn {
    /// Create a column, parsing the index from the name.
    pub fn new(name: impl Into<String>, kind: SensorKind, values: Vec<Option<f64>>) -> Self {
        let name = name.into();
        let index = parse_sensor_index(&name);
        Self {
            name,
            kind,
            index,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Row positions whose value is missing.
    pub fn missing_rows(&self, zero_is_missing: bool) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| is_missing(**v, zero_is_missing))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn missing_count(&self, zero_is_missing: bool) -> usize {
        self.values
            .iter()
            .filter(|v| is_missing(**v, zero_is_missing))
            .count()
    }

    /// Label used in audit lines: the index if known, else the name.
    pub fn label(&self) -> String {
        match self.index {
            Some(i) => i.to_string(),
            None => self.name.clone(),
        }
    }
}

/// Time-ordered table of sensor columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorMatrix {
    timestamps: Option<Vec<Option<NaiveDateTime>>>,
    columns: Vec<SensorColumn>,
    height: usize,
}

impl SensorMatrix {
    /// Build a matrix, checking that every column has one value per row.
    ///
    /// `timestamps` is `None` when the source has no usable time axis; an
    /// individual `None` entry is a row whose timestamp failed to parse.
    pub fn new(
        timestamps: Option<Vec<Option<NaiveDateTime>>>,
        columns: Vec<SensorColumn>,
    ) -> Result<Self> {
        let height = match (&timestamps, columns.first()) {
            (Some(ts), _) => ts.len(),
            (None, Some(first)) => first.len(),
            (None, None) => 0,
        };

        for column in &columns {
            if column.len() != height {
                return Err(MappingError::ShapeMismatch {
                    column: column.name.clone(),
                    expected: height,
                    actual: column.len(),
                });
            }
        }

        let mut seen = std::collections::HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(MappingError::Internal(format!(
                    "Duplicate sensor column '{}'",
                    column.name
                )));
            }
        }

        Ok(Self {
            timestamps,
            columns,
            height,
        })
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of sensor columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn timestamps(&self) -> Option<&[Option<NaiveDateTime>]> {
        self.timestamps.as_deref()
    }

    pub fn timestamp(&self, row: usize) -> Option<NaiveDateTime> {
        self.timestamps.as_ref()?.get(row).copied().flatten()
    }

    pub fn columns(&self) -> &[SensorColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&SensorColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns of one kind, in matrix order.
    pub fn group(&self, kind: SensorKind) -> Vec<&SensorColumn> {
        self.columns.iter().filter(|c| c.kind == kind).collect()
    }

    pub fn missing_count(&self, zero_is_missing: bool) -> usize {
        self.columns
            .iter()
            .map(|c| c.missing_count(zero_is_missing))
            .sum()
    }

    /// Copy of this matrix with the given columns swapped in by name.
    ///
    /// Columns not present in `replacements` are kept as they are.
    pub fn with_replaced(&self, replacements: Vec<SensorColumn>) -> Result<Self> {
        let mut by_name: HashMap<String, SensorColumn> = replacements
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();

        let columns = self
            .columns
            .iter()
            .map(|c| by_name.remove(&c.name).unwrap_or_else(|| c.clone()))
            .collect();

        if let Some(extra) = by_name.keys().next() {
            return Err(MappingError::ColumnNotFound(extra.clone()));
        }

        Self::new(self.timestamps.clone(), columns)
    }

    /// Keep only the named columns, in the order given. Names that are not
    /// in the matrix are ignored.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let mut seen = std::collections::HashSet::new();
        let columns = names
            .iter()
            .filter(|n| seen.insert(n.as_ref().to_string()))
            .filter_map(|n| self.column(n.as_ref()).cloned())
            .collect();
        Self {
            timestamps: self.timestamps.clone(),
            columns,
            height: self.height,
        }
    }

    /// Keep only the rows for which `keep` returns true.
    pub fn filter_rows(&self, keep: impl Fn(usize) -> bool) -> Self {
        let rows: Vec<usize> = (0..self.height).filter(|&i| keep(i)).collect();
        self.take_rows(&rows)
    }

    /// Keep rows whose timestamp falls inside `window`.
    ///
    /// Rows with an unknown timestamp never match, so a matrix without a
    /// time axis comes back empty.
    pub fn slice_window(&self, window: &TimeWindow) -> Self {
        if self.timestamps.is_none() {
            tracing::warn!("Time window applied to a matrix without timestamps; no rows kept");
        }
        self.filter_rows(|i| self.timestamp(i).is_some_and(|ts| window.contains(ts)))
    }

    fn take_rows(&self, rows: &[usize]) -> Self {
        let timestamps = self
            .timestamps
            .as_ref()
            .map(|ts| rows.iter().map(|&i| ts[i]).collect());
        let columns = self
            .columns
            .iter()
            .map(|c| SensorColumn {
                name: c.name.clone(),
                kind: c.kind,
                index: c.index,
                values: rows.iter().map(|&i| c.values[i]).collect(),
            })
            .collect();
        Self {
            timestamps,
            columns,
            height: rows.len(),
        }
    }

    /// Concatenate ingested parts into one matrix.
    ///
    /// Columns are the union of all parts in first-seen order; cells a part
    /// does not provide are `None`. Rows are stably sorted by timestamp with
    /// unknown timestamps last. The result has a time axis if any part has one.
    pub fn merge(parts: Vec<SensorMatrix>) -> Result<Self> {
        let mut order: Vec<(String, SensorKind, Option<u32>)> = Vec::new();
        for part in &parts {
            for column in &part.columns {
                match order.iter().find(|(name, _, _)| *name == column.name) {
                    Some((_, kind, _)) if *kind != column.kind => {
                        return Err(MappingError::Internal(format!(
                            "Column '{}' has conflicting kinds across inputs",
                            column.name
                        )));
                    }
                    Some(_) => {}
                    None => order.push((column.name.clone(), column.kind, column.index)),
                }
            }
        }

        let has_time = parts.iter().any(|p| p.timestamps.is_some());
        let total: usize = parts.iter().map(|p| p.height).sum();

        let mut timestamps: Vec<Option<NaiveDateTime>> = Vec::with_capacity(total);
        let mut values: Vec<Vec<Option<f64>>> =
            order.iter().map(|_| Vec::with_capacity(total)).collect();

        for part in &parts {
            for row in 0..part.height {
                timestamps.push(part.timestamp(row));
            }
            for ((name, _, _), out) in order.iter().zip(values.iter_mut()) {
                match part.column(name) {
                    Some(c) => out.extend_from_slice(&c.values),
                    None => out.extend(std::iter::repeat_n(None, part.height)),
                }
            }
        }

        let mut rows: Vec<usize> = (0..total).collect();
        if has_time {
            // `None` sorts before `Some`, so key on presence first.
            rows.sort_by_key(|&i| (timestamps[i].is_none(), timestamps[i]));
        }

        let columns = order
            .into_iter()
            .zip(values)
            .map(|((name, kind, index), vals)| SensorColumn {
                name,
                kind,
                index,
                values: rows.iter().map(|&i| vals[i]).collect(),
            })
            .collect();

        let timestamps = has_time.then(|| rows.iter().map(|&i| timestamps[i]).collect());

        tracing::debug!(parts = parts.len(), rows = total, "Merged sensor inputs");
        Self::new(timestamps, columns)
    }

    /// Minutes between the first and last known timestamp, plus one sample
    /// minute. `None` without at least one known timestamp.
    pub fn observed_span_minutes(&self) -> Option<f64> {
        let ts = self.timestamps.as_ref()?;
        let first = ts.iter().flatten().min()?;
        let last = ts.iter().flatten().max()?;
        Some((*last - *first).num_seconds() as f64 / 60.0 + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn at(minute: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, minute, 0)
    }

    fn temp(name: &str, values: &[f64]) -> SensorColumn {
        SensorColumn::new(
            name,
            SensorKind::Temperature,
            values.iter().map(|v| Some(*v)).collect(),
        )
    }

    // ========================================================================
    // Construction
    // ========================================================================

    #[test]
    fn test_new_rejects_shape_mismatch() {
        let err = SensorMatrix::new(
            Some(vec![at(0), at(1), at(2)]),
            vec![temp("TempSensor1", &[1.0, 2.0])],
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "SHAPE_MISMATCH");
    }

    #[test]
    fn test_new_rejects_duplicate_columns() {
        let result = SensorMatrix::new(
            None,
            vec![temp("TempSensor1", &[1.0]), temp("TempSensor1", &[2.0])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_column_metadata() {
        let column = temp("TempSensor12", &[0.0, 21.0]);
        assert_eq!(column.index, Some(12));
        assert_eq!(column.label(), "12");
        assert_eq!(column.missing_rows(true), vec![0]);
        assert_eq!(column.missing_count(false), 0);
    }

    // ========================================================================
    // Row and column selection
    // ========================================================================

    #[test]
    fn test_select_keeps_requested_order() {
        let matrix = SensorMatrix::new(
            None,
            vec![
                temp("TempSensor1", &[1.0]),
                temp("TempSensor2", &[2.0]),
                temp("TempSensor3", &[3.0]),
            ],
        )
        .unwrap();

        let selected = matrix.select(&["TempSensor3", "TempSensor9", "TempSensor1"]);
        assert_eq!(selected.column_names(), vec!["TempSensor3", "TempSensor1"]);
        assert_eq!(selected.height(), 1);
    }

    #[test]
    fn test_slice_window_is_inclusive() {
        let matrix = SensorMatrix::new(
            Some(vec![at(0), at(1), None, at(2), at(3)]),
            vec![temp("TempSensor1", &[1.0, 2.0, 3.0, 4.0, 5.0])],
        )
        .unwrap();

        let window = TimeWindow::new(at(1).unwrap(), at(2).unwrap()).unwrap();
        let sliced = matrix.slice_window(&window);
        assert_eq!(sliced.height(), 2);
        assert_eq!(
            sliced.column("TempSensor1").unwrap().values,
            vec![Some(2.0), Some(4.0)]
        );
    }

    #[test]
    fn test_with_replaced_unknown_column() {
        let matrix = SensorMatrix::new(None, vec![temp("TempSensor1", &[1.0])]).unwrap();
        let err = matrix
            .with_replaced(vec![temp("TempSensor2", &[1.0])])
            .unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    // ========================================================================
    // Merge
    // ========================================================================

    #[test]
    fn test_merge_unions_columns_and_sorts() {
        let later = SensorMatrix::new(
            Some(vec![at(2), at(3)]),
            vec![temp("TempSensor1", &[3.0, 4.0]), temp("TempSensor2", &[30.0, 40.0])],
        )
        .unwrap();
        let earlier = SensorMatrix::new(
            Some(vec![None, at(0), at(1)]),
            vec![temp("TempSensor1", &[9.0, 1.0, 2.0])],
        )
        .unwrap();

        let merged = SensorMatrix::merge(vec![later, earlier]).unwrap();
        assert_eq!(merged.height(), 5);
        assert_eq!(merged.column_names(), vec!["TempSensor1", "TempSensor2"]);
        assert_eq!(
            merged.column("TempSensor1").unwrap().values,
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(9.0)]
        );
        assert_eq!(
            merged.column("TempSensor2").unwrap().values,
            vec![None, None, Some(30.0), Some(40.0), None]
        );
        assert_eq!(merged.timestamp(4), None);
    }

    #[test]
    fn test_merge_rejects_conflicting_kinds() {
        let a = SensorMatrix::new(None, vec![temp("Sensor1", &[1.0])]).unwrap();
        let b = SensorMatrix::new(
            None,
            vec![SensorColumn::new("Sensor1", SensorKind::Humidity, vec![Some(50.0)])],
        )
        .unwrap();
        assert!(SensorMatrix::merge(vec![a, b]).is_err());
    }

    #[test]
    fn test_observed_span() {
        let matrix = SensorMatrix::new(
            Some(vec![at(0), None, at(9)]),
            vec![temp("TempSensor1", &[1.0, 2.0, 3.0])],
        )
        .unwrap();
        assert_eq!(matrix.observed_span_minutes(), Some(10.0));
    }
}
