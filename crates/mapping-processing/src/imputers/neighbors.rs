use tracing::debug;

use super::ReferenceWindow;
use crate::matrix::SensorColumn;
use crate::types::SelectionTier;
use crate::utils::pearson_correlation;

/// Neighbors chosen for one target column.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborSelection {
    /// Neighbor column names, most preferred first.
    pub neighbors: Vec<String>,
    pub tier: SelectionTier,
    /// Absolute correlation per chosen neighbor (correlation tier only).
    pub scores: Vec<f64>,
}

/// Ranks same-kind sensors as stand-ins for a target sensor.
///
/// Three tiers, first one that yields anything wins:
/// 1. absolute Pearson correlation over the reference window, descending;
/// 2. distance between sensor indices, ascending;
/// 3. listing order.
pub struct NeighborSelector {
    n_neighbors: usize,
    min_overlap_rows: usize,
    zero_is_missing: bool,
}

impl NeighborSelector {
    pub fn new(n_neighbors: usize, min_overlap_rows: usize, zero_is_missing: bool) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            min_overlap_rows,
            zero_is_missing,
        }
    }

    /// Pick up to `n_neighbors` candidates for `target`.
    ///
    /// Returns `None` only when `candidates` is empty.
    pub fn select(
        &self,
        target: &SensorColumn,
        candidates: &[&SensorColumn],
        window: &ReferenceWindow,
    ) -> Option<NeighborSelection> {
        if candidates.is_empty() {
            return None;
        }

        let scored = self.correlations(target, candidates, window);
        if !scored.is_empty() {
            let (neighbors, scores) = scored
                .into_iter()
                .take(self.n_neighbors)
                .map(|(c, r)| (c.name.clone(), r))
                .unzip();
            return Some(NeighborSelection {
                neighbors,
                tier: SelectionTier::Correlation,
                scores,
            });
        }

        if let Some(neighbors) = self.by_index_proximity(target, candidates) {
            debug!(target = %target.name, "No usable correlation; ranking by sensor index");
            return Some(NeighborSelection {
                neighbors,
                tier: SelectionTier::IndexProximity,
                scores: Vec::new(),
            });
        }

        debug!(target = %target.name, "No sensor indices; using listing order");
        Some(NeighborSelection {
            neighbors: candidates
                .iter()
                .take(self.n_neighbors)
                .map(|c| c.name.clone())
                .collect(),
            tier: SelectionTier::ListingOrder,
            scores: Vec::new(),
        })
    }

    /// Candidates with a defined correlation, strongest first. Ties keep
    /// listing order.
    pub fn correlations<'a>(
        &self,
        target: &SensorColumn,
        candidates: &[&'a SensorColumn],
        window: &ReferenceWindow,
    ) -> Vec<(&'a SensorColumn, f64)> {
        let mut scored: Vec<(&SensorColumn, f64)> = candidates
            .iter()
            .filter_map(|&candidate| {
                let (t, n) = window.paired(target, candidate, self.zero_is_missing);
                if t.len() < self.min_overlap_rows {
                    return None;
                }
                pearson_correlation(&t, &n).map(|r| (candidate, r.abs()))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }

    /// Candidates closest by sensor index. `None` if the target has no index
    /// or no candidate has one.
    fn by_index_proximity(
        &self,
        target: &SensorColumn,
        candidates: &[&SensorColumn],
    ) -> Option<Vec<String>> {
        let target_index = i64::from(target.index?);

        let mut ranked: Vec<(&SensorColumn, i64)> = candidates
            .iter()
            .filter_map(|&c| c.index.map(|i| (c, (i64::from(i) - target_index).abs())))
            .collect();
        if ranked.is_empty() {
            return None;
        }

        ranked.sort_by_key(|(_, distance)| *distance);
        Some(
            ranked
                .into_iter()
                .take(self.n_neighbors)
                .map(|(c, _)| c.name.clone())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SensorKind;
    use pretty_assertions::assert_eq;

    fn temp(name: &str, values: &[f64]) -> SensorColumn {
        SensorColumn::new(
            name,
            SensorKind::Temperature,
            values.iter().map(|v| Some(*v)).collect(),
        )
    }

    fn window(n: usize) -> ReferenceWindow {
        ReferenceWindow::from_rows((0..n).collect())
    }

    // ========================================================================
    // Correlation tier
    // ========================================================================

    #[test]
    fn test_ranks_by_absolute_correlation() {
        let target = temp("TempSensor1", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let inverse = temp("TempSensor2", &[12.0, 10.0, 8.0, 6.0, 4.0, 2.0]);
        let noisy = temp("TempSensor3", &[1.0, 3.0, 2.0, 5.0, 4.0, 6.0]);

        let selector = NeighborSelector::new(4, 5, true);
        let selection = selector
            .select(&target, &[&noisy, &inverse], &window(6))
            .unwrap();

        assert_eq!(selection.tier, SelectionTier::Correlation);
        assert_eq!(selection.neighbors, vec!["TempSensor2", "TempSensor3"]);
        assert!((selection.scores[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_truncates_to_n_neighbors() {
        let target = temp("TempSensor1", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let a = temp("TempSensor2", &[2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = temp("TempSensor3", &[3.0, 4.0, 5.0, 6.0, 7.0]);

        let selector = NeighborSelector::new(1, 5, true);
        let selection = selector.select(&target, &[&a, &b], &window(5)).unwrap();
        // Equal scores keep listing order.
        assert_eq!(selection.neighbors, vec!["TempSensor2"]);
    }

    #[test]
    fn test_requires_minimum_overlap() {
        let target = temp("TempSensor1", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let sparse = temp("TempSensor2", &[1.0, 2.0, 0.0, 4.0, 5.0]);

        let selector = NeighborSelector::new(4, 5, true);
        assert!(selector.correlations(&target, &[&sparse], &window(5)).is_empty());
    }

    #[test]
    fn test_constant_neighbor_has_no_correlation() {
        let target = temp("TempSensor1", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let flat = temp("TempSensor2", &[7.0; 5]);

        let selector = NeighborSelector::new(4, 5, true);
        assert!(selector.correlations(&target, &[&flat], &window(5)).is_empty());
    }

    // ========================================================================
    // Fallback tiers
    // ========================================================================

    #[test]
    fn test_index_proximity_fallback() {
        let target = temp("TempSensor5", &[1.0, 2.0]);
        let far = temp("TempSensor9", &[1.0, 2.0]);
        let near = temp("TempSensor4", &[1.0, 2.0]);
        let unnamed = temp("TempSensorX", &[1.0, 2.0]);
        let mid = temp("TempSensor7", &[1.0, 2.0]);

        let selector = NeighborSelector::new(2, 5, true);
        let selection = selector
            .select(&target, &[&far, &near, &unnamed, &mid], &window(2))
            .unwrap();

        assert_eq!(selection.tier, SelectionTier::IndexProximity);
        assert_eq!(selection.neighbors, vec!["TempSensor4", "TempSensor7"]);
    }

    #[test]
    fn test_listing_order_fallback_when_target_has_no_index() {
        let target = temp("TempSensorMain", &[1.0]);
        let a = temp("TempSensor3", &[1.0]);
        let b = temp("TempSensor1", &[1.0]);
        let c = temp("TempSensor2", &[1.0]);

        let selector = NeighborSelector::new(2, 5, true);
        let selection = selector.select(&target, &[&a, &b, &c], &window(1)).unwrap();

        assert_eq!(selection.tier, SelectionTier::ListingOrder);
        assert_eq!(selection.neighbors, vec!["TempSensor3", "TempSensor1"]);
    }

    #[test]
    fn test_no_candidates() {
        let target = temp("TempSensor1", &[1.0]);
        let selector = NeighborSelector::new(4, 5, true);
        assert!(selector.select(&target, &[], &window(1)).is_none());
    }
}
