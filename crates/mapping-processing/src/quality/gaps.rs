use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::config::{LossWindow, RepairConfig, SEVEN_DAYS_MINUTES};
use crate::matrix::{SensorColumn, SensorMatrix};
use crate::types::{Gap, GapReport, SensorLoss};
use crate::utils::is_missing;

/// Finds and measures runs of missing readings per sensor.
///
/// Missing rows are clustered into [`Gap`]s: a new gap starts whenever the
/// time to the previous missing row exceeds the continuity threshold. Rows
/// with an unknown timestamp are dropped before clustering.
pub struct GapDetector;

impl GapDetector {
    /// Audit every column whose kind is in `config.audited_kinds`.
    ///
    /// Produces one line per gap and a summary line per sensor (or a single
    /// "No data loss detected." line), plus the warnings triggered by the
    /// single-gap and total-loss limits.
    pub fn detect(matrix: &SensorMatrix, config: &RepairConfig) -> GapReport {
        let denominator = Self::loss_denominator(matrix, config.loss_window);
        let mut report = GapReport::default();

        for column in matrix.columns() {
            if !config.audits(column.kind) {
                continue;
            }

            let loss = Self::audit_column(matrix, column, config, denominator);
            let label = &loss.sensor;

            if loss.gaps.is_empty() {
                report
                    .lines
                    .push(format!("Sensor {label}: No data loss detected."));
                report.sensors.push(loss);
                continue;
            }

            for gap in &loss.gaps {
                report.lines.push(format!(
                    "Sensor {label}: {} to {} -> Duration: {:.2} minutes",
                    gap.start, gap.end, gap.duration_minutes
                ));
                if gap.duration_minutes > config.limit_time_minutes {
                    warn!(
                        sensor = %label,
                        minutes = gap.duration_minutes,
                        "Gap exceeds duration limit"
                    );
                    report.warnings.push(format!(
                        "Warning: Sensor {label} has data loss exceeding {} minutes",
                        config.limit_time_minutes
                    ));
                }
            }

            report.lines.push(format!(
                "Sensor {label}: Total Duration: {:.2} minutes = {:.4}%",
                loss.total_duration_minutes, loss.percentage
            ));

            let limit = config.limit_percentage * 100.0;
            if loss.percentage > limit {
                warn!(sensor = %label, percentage = loss.percentage, "Total loss exceeds limit");
                report.warnings.push(format!(
                    "Warning: Sensor {label} has total data loss exceeding {limit:.1}%"
                ));
            }

            report.sensors.push(loss);
        }

        info!(
            sensors = report.sensors.len(),
            gaps = report.gap_count(),
            warnings = report.warnings.len(),
            "Gap detection complete"
        );
        report
    }

    /// Measure one column. The column need not be of an audited kind.
    pub fn audit_column(
        matrix: &SensorMatrix,
        column: &SensorColumn,
        config: &RepairConfig,
        denominator_minutes: f64,
    ) -> SensorLoss {
        let mut stamps: Vec<NaiveDateTime> = Vec::new();
        let mut dropped_rows = 0;

        for row in column.missing_rows(config.zero_is_missing) {
            match matrix.timestamp(row) {
                Some(ts) => stamps.push(ts),
                None => dropped_rows += 1,
            }
        }

        if dropped_rows > 0 {
            debug!(
                column = %column.name,
                dropped_rows,
                "Missing rows without a timestamp skipped"
            );
        }

        let gaps = cluster_gaps(&stamps, config.continuity_threshold_secs);
        let total_duration_minutes: f64 = gaps.iter().map(|g| g.duration_minutes).sum();

        SensorLoss {
            column: column.name.clone(),
            sensor: column.label(),
            gaps,
            total_duration_minutes,
            percentage: total_duration_minutes / denominator_minutes * 100.0,
            dropped_rows,
        }
    }

    /// Minutes the loss percentage is quoted against.
    pub fn loss_denominator(matrix: &SensorMatrix, window: LossWindow) -> f64 {
        match window {
            LossWindow::FixedMinutes(minutes) => minutes,
            LossWindow::ObservedSpan => matrix.observed_span_minutes().unwrap_or_else(|| {
                debug!("No timestamps to measure span; using seven days");
                SEVEN_DAYS_MINUTES
            }),
        }
    }
}

/// Split missing-sample timestamps into gaps.
///
/// Timestamps are taken in row order; a step greater than
/// `threshold_secs` closes the current gap.
pub fn cluster_gaps(stamps: &[NaiveDateTime], threshold_secs: i64) -> Vec<Gap> {
    let Some((&first, rest)) = stamps.split_first() else {
        return Vec::new();
    };

    let threshold_ms = threshold_secs.saturating_mul(1000);
    let mut gaps = Vec::new();
    let mut start = first;
    let mut prev = first;

    for &ts in rest {
        if (ts - prev).num_milliseconds() > threshold_ms {
            gaps.push(Gap::new(start, prev));
            start = ts;
        }
        prev = ts;
    }
    gaps.push(Gap::new(start, prev));
    gaps
}
