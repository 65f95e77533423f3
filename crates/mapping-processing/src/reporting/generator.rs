use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::config::RepairConfig;
use crate::matrix::RoomPlan;
use crate::profiler::{SensorStatistics, SpotSummary};
use crate::types::{ColumnRepair, GapReport, MappingResult, RepairMethod, SensorKind};

// ============================================================================
// Report Types
// ============================================================================

/// Serializable record of one mapping run.
///
/// Used for `--json` output, the `--emit-report` file, and library callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingReport {
    /// Local time the report was generated
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomInfo>,
    pub rows: usize,
    pub columns: usize,
    pub config: RepairConfig,
    pub gap_report: GapReport,
    pub repairs: Vec<ColumnRepair>,
    pub totals: RepairTotals,
    pub statistics: Vec<SensorStatistics>,
    pub spots: SpotSummary,
    pub duration_ms: u64,
}

/// The room a report covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_number: String,
    pub room_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    pub sensors: Vec<u32>,
}

/// Cell counts across all columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairTotals {
    pub missing_cells: usize,
    pub repaired_cells: usize,
    pub unresolved_cells: usize,
}

// ============================================================================
// Generator
// ============================================================================

/// Builds and renders mapping reports. Performs no I/O.
pub struct ReportGenerator;

impl ReportGenerator {
    pub fn build_report(
        result: &MappingResult,
        plan: Option<&RoomPlan>,
        config: &RepairConfig,
    ) -> MappingReport {
        let room = plan.map(|p| RoomInfo {
            room_number: p.room_number.clone(),
            room_name: p.room_name.clone(),
            start: p.window.map(|w| w.start.to_string()),
            end: p.window.map(|w| w.end.to_string()),
            sensors: p.selection.resolve().unwrap_or_default(),
        });

        MappingReport {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            room,
            rows: result.rows,
            columns: result.columns,
            config: config.clone(),
            gap_report: result.gap_report.clone(),
            repairs: result.repairs.clone(),
            totals: RepairTotals {
                missing_cells: result.missing_cells(),
                repaired_cells: result.repaired_cells(),
                unresolved_cells: result.unresolved_cells(),
            },
            statistics: result.statistics.clone(),
            spots: result.spots.clone(),
            duration_ms: result.duration_ms,
        }
    }

    /// Plain-text audit report.
    pub fn render_text(report: &MappingReport) -> String {
        let mut out = String::new();
        let rule = "=".repeat(80);

        let _ = writeln!(out, "{rule}");
        match &report.room {
            Some(room) => {
                let _ = writeln!(
                    out,
                    "MAPPING REPORT: {} {}",
                    room.room_number, room.room_name
                );
                if let (Some(start), Some(end)) = (&room.start, &room.end) {
                    let _ = writeln!(out, "Period: {start} to {end}");
                }
            }
            None => {
                let _ = writeln!(out, "MAPPING REPORT");
            }
        }
        let _ = writeln!(out, "Generated: {}", report.generated_at);
        let _ = writeln!(
            out,
            "Rows: {}  Sensors: {}",
            report.rows, report.columns
        );
        let _ = writeln!(out, "{rule}");

        let _ = writeln!(out, "\nDATA LOSS");
        if report.gap_report.lines.is_empty() {
            let _ = writeln!(out, "  No audited sensors.");
        }
        for line in &report.gap_report.lines {
            let _ = writeln!(out, "  {line}");
        }

        if !report.gap_report.warnings.is_empty() {
            let _ = writeln!(out, "\nWARNINGS");
            for warning in &report.gap_report.warnings {
                let _ = writeln!(out, "  {warning}");
            }
        }

        let _ = writeln!(out, "\nREPAIRS");
        let _ = writeln!(
            out,
            "  {} missing cells, {} repaired, {} unresolved",
            report.totals.missing_cells,
            report.totals.repaired_cells,
            report.totals.unresolved_cells
        );
        for repair in report.repairs.iter().filter(|r| r.missing_cells > 0) {
            let _ = writeln!(out, "  {}", Self::describe_repair(repair));
        }

        for kind in SensorKind::ALL {
            let rows: Vec<&SensorStatistics> = report
                .statistics
                .iter()
                .filter(|s| s.kind == kind)
                .collect();
            if rows.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n{} STATISTICS ({})", kind.display_name().to_uppercase(), kind.unit());
            let _ = writeln!(
                out,
                "  {:<14} {:>10} {:>10} {:>10} {:>10}",
                "Sensor", "Mean", "Std", "Min", "Max"
            );
            for s in rows {
                let _ = writeln!(
                    out,
                    "  {:<14} {:>10} {:>10} {:>10} {:>10}",
                    s.column,
                    fmt_opt(s.mean),
                    fmt_opt(s.std),
                    fmt_opt(s.min),
                    fmt_opt(s.max)
                );
            }
        }

        let entries = report.spots.entries();
        if !entries.is_empty() {
            let _ = writeln!(out, "\nSPOTS");
            for (label, spot) in entries {
                let _ = writeln!(
                    out,
                    "  {label}: Sensor {} (mean {:.4})",
                    spot.sensor, spot.mean
                );
            }
        }

        out
    }

    /// One-line description of how a column was repaired.
    pub fn describe_repair(repair: &ColumnRepair) -> String {
        let how = match &repair.method {
            RepairMethod::Untouched => "untouched".to_string(),
            RepairMethod::Interpolated { reason } => format!("interpolated ({reason})"),
            RepairMethod::Neighbors {
                neighbors, tier, ..
            } => format!(
                "neighbors [{}] by {}",
                neighbors.join(", "),
                tier.display_name().to_lowercase()
            ),
        };
        format!(
            "{}: {} missing, {} from neighbors, {} interpolated, {} unresolved; {}",
            repair.column,
            repair.missing_cells,
            repair.resolved_by_neighbors,
            repair.resolved_by_interpolation,
            repair.unresolved,
            how
        )
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}
