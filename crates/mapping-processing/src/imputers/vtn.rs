use rayon::prelude::*;
use tracing::{debug, info};

use super::{
    DeltaCalculator, NeighborSelector, ReferenceWindow, interpolate_linear, interpolation_axis,
};
use crate::config::RepairConfig;
use crate::error::Result;
use crate::matrix::{SensorColumn, SensorMatrix};
use crate::types::{ColumnRepair, FallbackReason, RepairMethod, SensorKind};
use crate::utils::{is_missing, live_value, mean};

/// Stored for a resolved cell whose estimate is exactly zero while zero
/// readings mark missing data.
pub const RESOLVED_ZERO: f64 = 1e-6;

/// Virtual temporal neighbor imputer.
///
/// Each missing reading is estimated from the simultaneous readings of the
/// target's most correlated same-kind sensors, shifted by the offset learned
/// over a reference window. Cells no neighbor can cover are interpolated.
///
/// Columns are repaired independently from the immutable input, so they are
/// processed in parallel; the input matrix is never modified.
pub struct VtnImputer<'a> {
    config: &'a RepairConfig,
}

impl<'a> VtnImputer<'a> {
    pub fn new(config: &'a RepairConfig) -> Self {
        Self { config }
    }

    /// Repair every sensor column, group by group.
    ///
    /// Returns the repaired matrix (same shape and column order) and one
    /// audit entry per column.
    pub fn impute(&self, matrix: &SensorMatrix) -> Result<(SensorMatrix, Vec<ColumnRepair>)> {
        let axis = interpolation_axis(matrix);
        let mut repaired_columns = Vec::with_capacity(matrix.width());
        let mut repairs = Vec::with_capacity(matrix.width());

        for kind in SensorKind::ALL {
            let group = matrix.group(kind);
            if group.is_empty() {
                continue;
            }

            let results: Vec<(SensorColumn, ColumnRepair)> = group
                .par_iter()
                .map(|target| self.repair_column(matrix, target, &group, &axis))
                .collect();

            for (column, repair) in results {
                repaired_columns.push(column);
                repairs.push(repair);
            }

            debug!(kind = %kind, columns = group.len(), "Sensor group repaired");
        }

        let output = matrix.with_replaced(repaired_columns)?;

        // Keep audit entries in matrix column order.
        repairs.sort_by_key(|r| {
            matrix
                .columns()
                .iter()
                .position(|c| c.name == r.column)
                .unwrap_or(usize::MAX)
        });

        info!(
            columns = repairs.len(),
            missing = repairs.iter().map(|r| r.missing_cells).sum::<usize>(),
            by_neighbors = repairs.iter().map(|r| r.resolved_by_neighbors).sum::<usize>(),
            by_interpolation = repairs.iter().map(|r| r.resolved_by_interpolation).sum::<usize>(),
            "Imputation complete"
        );

        Ok((output, repairs))
    }

    /// Repair one column against its sensor group.
    ///
    /// `group` may include `target` itself; it is skipped as a candidate.
    /// Neighbor readings always come from `matrix`, never from other repaired
    /// columns.
    pub fn repair_column(
        &self,
        matrix: &SensorMatrix,
        target: &SensorColumn,
        group: &[&SensorColumn],
        axis: &[f64],
    ) -> (SensorColumn, ColumnRepair) {
        let zero = self.config.zero_is_missing;
        let missing_rows = target.missing_rows(zero);

        if missing_rows.is_empty() {
            return (
                target.clone(),
                ColumnRepair::untouched(&target.name, target.kind),
            );
        }

        let window = ReferenceWindow::build(
            matrix,
            target,
            self.config.reference_period_hours,
            zero,
        );

        if window.len() < self.config.min_reference_rows {
            return self.interpolate_fallback(
                target,
                &missing_rows,
                axis,
                FallbackReason::InsufficientReference { rows: window.len() },
            );
        }

        let candidates: Vec<&SensorColumn> = group
            .iter()
            .copied()
            .filter(|c| c.name != target.name)
            .collect();

        let selector = NeighborSelector::new(
            self.config.n_neighbors,
            self.config.min_overlap_rows,
            zero,
        );
        let Some(selection) = selector.select(target, &candidates, &window) else {
            return self.interpolate_fallback(
                target,
                &missing_rows,
                axis,
                FallbackReason::NoNeighborCandidates,
            );
        };

        let neighbors: Vec<&SensorColumn> = selection
            .neighbors
            .iter()
            .filter_map(|name| candidates.iter().copied().find(|c| &c.name == name))
            .collect();

        let deltas = DeltaCalculator::new(self.config.min_overlap_rows, zero)
            .calculate(target, &neighbors, &window);

        let mut values = target.values.clone();
        let mut resolved_by_neighbors = 0;

        for &row in &missing_rows {
            let estimates: Vec<f64> = neighbors
                .iter()
                .filter_map(|n| {
                    let reading = live_value(n.values[row], zero)?;
                    deltas.get(&n.name).map(|d| reading + d)
                })
                .collect();

            values[row] = mean(&estimates);
            if values[row].is_some() {
                resolved_by_neighbors += 1;
            }
        }

        let pending = missing_rows.len() - resolved_by_neighbors;
        let values = if pending > 0 {
            interpolate_linear(&values, axis)
        } else {
            values
        };
        let values = settle(values, zero);
        let unresolved = count_missing(&values, zero);

        debug!(
            target = %target.name,
            tier = selection.tier.display_name(),
            neighbors = ?selection.neighbors,
            deltas = deltas.len(),
            resolved_by_neighbors,
            "Column repaired from neighbors"
        );

        let repair = ColumnRepair {
            column: target.name.clone(),
            kind: target.kind,
            missing_cells: missing_rows.len(),
            resolved_by_neighbors,
            resolved_by_interpolation: pending.saturating_sub(unresolved),
            unresolved,
            method: RepairMethod::Neighbors {
                neighbors: selection.neighbors,
                tier: selection.tier,
                deltas,
            },
        };

        (with_values(target, values), repair)
    }

    fn interpolate_fallback(
        &self,
        target: &SensorColumn,
        missing_rows: &[usize],
        axis: &[f64],
        reason: FallbackReason,
    ) -> (SensorColumn, ColumnRepair) {
        debug!(target = %target.name, %reason, "Falling back to interpolation");

        let mut values = target.values.clone();
        for &row in missing_rows {
            values[row] = None;
        }
        let values = settle(interpolate_linear(&values, axis), self.config.zero_is_missing);
        let unresolved = count_missing(&values, self.config.zero_is_missing);

        let repair = ColumnRepair {
            column: target.name.clone(),
            kind: target.kind,
            missing_cells: missing_rows.len(),
            resolved_by_neighbors: 0,
            resolved_by_interpolation: missing_rows.len().saturating_sub(unresolved),
            unresolved,
            method: RepairMethod::Interpolated { reason },
        };

        (with_values(target, values), repair)
    }
}

/// Cells still without a value.
fn count_missing(values: &[Option<f64>], zero_is_missing: bool) -> usize {
    values.iter().filter(|v| is_missing(**v, zero_is_missing)).count()
}

/// NaN becomes an explicit absence. Under the zero policy live input cells
/// are never zero, so any zero left here is an estimate and is stored as
/// [`RESOLVED_ZERO`].
fn settle(values: Vec<Option<f64>>, zero_is_missing: bool) -> Vec<Option<f64>> {
    values
        .into_iter()
        .map(|v| {
            v.filter(|x| !x.is_nan())
                .map(|x| if zero_is_missing && x == 0.0 { RESOLVED_ZERO } else { x })
        })
        .collect()
}

fn with_values(target: &SensorColumn, values: Vec<Option<f64>>) -> SensorColumn {
    SensorColumn {
        name: target.name.clone(),
        kind: target.kind,
        index: target.index,
        values,
    }
}
