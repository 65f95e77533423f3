use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::profiler::{SensorStatistics, SpotSummary};

/// Physical quantity measured by a sensor column.
///
/// Imputation never mixes kinds: a temperature column only borrows from
/// other temperature columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    Humidity,
}

impl SensorKind {
    /// All kinds, in processing order.
    pub const ALL: [SensorKind; 2] = [SensorKind::Temperature, SensorKind::Humidity];

    /// Get a human-readable display name for the kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
        }
    }

    /// Unit the readings are recorded in.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Humidity => "%RH",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Gap Audit Types
// ============================================================================

/// A maximal run of missing samples for one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// `(end - start)` in minutes, plus one sample minute.
    pub duration_minutes: f64,
}

impl Gap {
    /// Create a gap spanning `start..=end`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let seconds = (end - start).num_milliseconds() as f64 / 1000.0;
        Self {
            start,
            end,
            duration_minutes: seconds / 60.0 + 1.0,
        }
    }
}

/// Loss audit for one sensor column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorLoss {
    /// Column name in the matrix.
    pub column: String,
    /// Label used in report lines (the sensor index, or the column name
    /// when no index can be parsed).
    pub sensor: String,
    pub gaps: Vec<Gap>,
    pub total_duration_minutes: f64,
    pub percentage: f64,
    /// Missing rows skipped because their timestamp is unknown.
    pub dropped_rows: usize,
}

impl SensorLoss {
    /// Whether any gap was found.
    pub fn has_loss(&self) -> bool {
        !self.gaps.is_empty()
    }

    /// Longest single gap, in minutes.
    pub fn longest_gap_minutes(&self) -> f64 {
        self.gaps
            .iter()
            .map(|g| g.duration_minutes)
            .fold(0.0, f64::max)
    }
}

/// Output of the gap detector: ordered report lines, triggered warnings and
/// the structured per-sensor audit they were rendered from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GapReport {
    pub lines: Vec<String>,
    pub warnings: Vec<String>,
    pub sensors: Vec<SensorLoss>,
}

impl GapReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Total number of gaps across all audited sensors.
    pub fn gap_count(&self) -> usize {
        self.sensors.iter().map(|s| s.gaps.len()).sum()
    }
}

// ============================================================================
// Repair Audit Types
// ============================================================================

/// Which tier of neighbor selection produced the neighbor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionTier {
    /// Ranked by absolute Pearson correlation over the reference window.
    Correlation,
    /// No usable correlation; ranked by distance between sensor indices.
    IndexProximity,
    /// No parseable indices either; first candidates in listing order.
    ListingOrder,
}

impl SelectionTier {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Correlation => "Correlation",
            Self::IndexProximity => "Index Proximity",
            Self::ListingOrder => "Listing Order",
        }
    }
}

/// Why a column skipped the neighbor path and was interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum FallbackReason {
    /// The reference window held fewer rows than required.
    InsufficientReference { rows: usize },
    /// The sensor group has no other member.
    NoNeighborCandidates,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientReference { rows } => {
                write!(f, "insufficient reference window ({rows} rows)")
            }
            Self::NoNeighborCandidates => f.write_str("no neighbor candidates"),
        }
    }
}

/// How a column was repaired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum RepairMethod {
    /// Nothing was missing.
    Untouched,
    /// The whole column was interpolated.
    Interpolated { reason: FallbackReason },
    /// Missing cells were estimated from neighbors, residue interpolated.
    Neighbors {
        neighbors: Vec<String>,
        tier: SelectionTier,
        /// Mean `target - neighbor` offset for each neighbor with enough overlap.
        deltas: BTreeMap<String, f64>,
    },
}

impl RepairMethod {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Untouched => "Untouched",
            Self::Interpolated { .. } => "Interpolation",
            Self::Neighbors { .. } => "VTN",
        }
    }
}

/// Per-column repair audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRepair {
    pub column: String,
    pub kind: SensorKind,
    /// Cells matching the missing predicate before repair.
    pub missing_cells: usize,
    pub resolved_by_neighbors: usize,
    pub resolved_by_interpolation: usize,
    /// Cells still missing after repair (only when no valid value exists).
    pub unresolved: usize,
    pub method: RepairMethod,
}

impl ColumnRepair {
    /// Audit entry for a column with nothing to repair.
    pub fn untouched(column: impl Into<String>, kind: SensorKind) -> Self {
        Self {
            column: column.into(),
            kind,
            missing_cells: 0,
            resolved_by_neighbors: 0,
            resolved_by_interpolation: 0,
            unresolved: 0,
            method: RepairMethod::Untouched,
        }
    }

    pub fn repaired_cells(&self) -> usize {
        self.resolved_by_neighbors + self.resolved_by_interpolation
    }

    /// Percentage of missing cells that received a value.
    pub fn repair_percentage(&self) -> f64 {
        if self.missing_cells == 0 {
            100.0
        } else {
            self.repaired_cells() as f64 / self.missing_cells as f64 * 100.0
        }
    }
}

/// Result of one pipeline run over a sensor matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingResult {
    pub rows: usize,
    pub columns: usize,
    pub gap_report: GapReport,
    pub repairs: Vec<ColumnRepair>,
    pub statistics: Vec<SensorStatistics>,
    pub spots: SpotSummary,
    pub duration_ms: u64,
}

impl MappingResult {
    pub fn missing_cells(&self) -> usize {
        self.repairs.iter().map(|r| r.missing_cells).sum()
    }

    pub fn repaired_cells(&self) -> usize {
        self.repairs.iter().map(|r| r.repaired_cells()).sum()
    }

    pub fn unresolved_cells(&self) -> usize {
        self.repairs.iter().map(|r| r.unresolved).sum()
    }
}

// ============================================================================
// Tests
// ============================================================================
