//! Sensor and time selection for one analysis request.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{SensorMatrix, SensorNaming};
use crate::error::{MappingError, Result};
use crate::types::SensorKind;
use crate::utils::parse_timestamp;

/// Widest sensor index range a selection may span.
pub const MAX_SELECTION_SPAN: u32 = 100_000;

/// Sensors to analyse: an inclusive index range, extended with extra
/// indices and reduced by excluded ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSelection {
    pub start: u32,
    pub end: u32,
    #[serde(default)]
    pub additional: Vec<u32>,
    #[serde(default)]
    pub excluded: Vec<u32>,
}

impl SensorSelection {
    pub fn range(start: u32, end: u32) -> Self {
        Self {
            start,
            end,
            additional: Vec::new(),
            excluded: Vec::new(),
        }
    }

    pub fn with_additional(mut self, indices: impl IntoIterator<Item = u32>) -> Self {
        self.additional.extend(indices);
        self
    }

    pub fn with_excluded(mut self, indices: impl IntoIterator<Item = u32>) -> Self {
        self.excluded.extend(indices);
        self
    }

    /// Resolve to concrete sensor indices.
    ///
    /// Order is the range followed by the additions; repeated indices keep
    /// their first position.
    pub fn resolve(&self) -> Result<Vec<u32>> {
        if self.start > self.end {
            return Err(MappingError::InvalidSelection(format!(
                "sensor start {} is after sensor stop {}",
                self.start, self.end
            )));
        }

        if self.end - self.start >= MAX_SELECTION_SPAN {
            return Err(MappingError::InvalidSelection(format!(
                "sensor range {}..={} spans more than {MAX_SELECTION_SPAN} sensors",
                self.start, self.end
            )));
        }

        let excluded: HashSet<u32> = self.excluded.iter().copied().collect();
        let mut seen = HashSet::new();
        Ok((self.start..=self.end)
            .chain(self.additional.iter().copied())
            .filter(|i| !excluded.contains(i) && seen.insert(*i))
            .collect())
    }

    /// Column names for one kind, in resolved order.
    pub fn column_names(&self, naming: &SensorNaming, kind: SensorKind) -> Result<Vec<String>> {
        Ok(self
            .resolve()?
            .into_iter()
            .map(|i| naming.column_name(kind, i))
            .collect())
    }

    /// Temperature columns followed by humidity columns.
    pub fn all_column_names(&self, naming: &SensorNaming) -> Result<Vec<String>> {
        let mut names = self.column_names(naming, SensorKind::Temperature)?;
        names.extend(self.column_names(naming, SensorKind::Humidity)?);
        Ok(names)
    }
}

/// Inclusive time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            return Err(MappingError::InvalidSelection(format!(
                "time window start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse both ends from text.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let start = parse_timestamp(start)
            .ok_or_else(|| MappingError::InvalidTimestamp(start.to_string()))?;
        let end =
            parse_timestamp(end).ok_or_else(|| MappingError::InvalidTimestamp(end.to_string()))?;
        Self::new(start, end)
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts <= self.end
    }

    pub fn duration_minutes(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 60.0
    }
}

/// One row of a mapping plan: a room and the sensors and period that cover it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomPlan {
    pub room_number: String,
    pub room_name: String,
    /// `None` analyses every row.
    pub window: Option<TimeWindow>,
    pub selection: SensorSelection,
}

impl RoomPlan {
    /// Restrict a matrix to this plan's period and sensors.
    ///
    /// Selected sensors that are not in the matrix are skipped.
    pub fn apply(&self, matrix: &SensorMatrix, naming: &SensorNaming) -> Result<SensorMatrix> {
        let names = self.selection.all_column_names(naming)?;
        let selected = matrix.select(&names);

        let missing: Vec<&String> = names
            .iter()
            .filter(|n| selected.column(n).is_none())
            .collect();
        if !missing.is_empty() {
            tracing::debug!(
                room = %self.room_number,
                skipped = missing.len(),
                "Selected sensors not present in input"
            );
        }

        Ok(match &self.window {
            Some(window) => selected.slice_window(window),
            None => selected,
        })
    }

    /// Stem for output files: `{room_number}_{room_name}`.
    pub fn file_stem(&self) -> String {
        let sanitize = |s: &str| {
            s.trim()
                .chars()
                .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
                .collect::<String>()
        };
        format!("{}_{}", sanitize(&self.room_number), sanitize(&self.room_name))
    }
}
