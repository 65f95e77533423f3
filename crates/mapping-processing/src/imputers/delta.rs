use std::collections::BTreeMap;

use super::ReferenceWindow;
use crate::matrix::SensorColumn;
use crate::utils::mean;

/// Learns the constant offset between a target and each of its neighbors.
pub struct DeltaCalculator {
    min_overlap_rows: usize,
    zero_is_missing: bool,
}

impl DeltaCalculator {
    pub fn new(min_overlap_rows: usize, zero_is_missing: bool) -> Self {
        Self {
            min_overlap_rows,
            zero_is_missing,
        }
    }

    /// `mean(target - neighbor)` over the window for every neighbor with
    /// enough jointly valid rows. Neighbors without enough overlap are left
    /// out of the map.
    pub fn calculate(
        &self,
        target: &SensorColumn,
        neighbors: &[&SensorColumn],
        window: &ReferenceWindow,
    ) -> BTreeMap<String, f64> {
        neighbors
            .iter()
            .filter_map(|neighbor| {
                let (t, n) = window.paired(target, neighbor, self.zero_is_missing);
                if t.len() < self.min_overlap_rows {
                    return None;
                }
                let diffs: Vec<f64> = t.iter().zip(&n).map(|(a, b)| a - b).collect();
                mean(&diffs).map(|d| (neighbor.name.clone(), d))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SensorKind;

    fn temp(name: &str, values: &[f64]) -> SensorColumn {
        SensorColumn::new(
            name,
            SensorKind::Temperature,
            values.iter().map(|v| Some(*v)).collect(),
        )
    }

    #[test]
    fn test_constant_offset() {
        let target = temp("TempSensor1", &[20.0, 20.5, 21.0, 21.5, 22.0]);
        let neighbor = temp("TempSensor2", &[21.5, 22.0, 22.5, 23.0, 23.5]);
        let window = ReferenceWindow::from_rows((0..5).collect());

        let deltas = DeltaCalculator::new(5, true).calculate(&target, &[&neighbor], &window);
        assert!((deltas["TempSensor2"] + 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_short_overlap_is_omitted() {
        let target = temp("TempSensor1", &[20.0, 20.0, 20.0, 20.0, 20.0]);
        let good = temp("TempSensor2", &[19.0, 19.0, 19.0, 19.0, 19.0]);
        let gappy = temp("TempSensor3", &[19.0, 0.0, 19.0, 19.0, 19.0]);
        let window = ReferenceWindow::from_rows((0..5).collect());

        let deltas =
            DeltaCalculator::new(5, true).calculate(&target, &[&good, &gappy], &window);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas["TempSensor2"], 1.0);
    }

    #[test]
    fn test_only_window_rows_are_used() {
        let target = temp("TempSensor1", &[0.0, 10.0, 10.0, 10.0, 10.0, 10.0, 99.0]);
        let neighbor = temp("TempSensor2", &[5.0, 8.0, 8.0, 8.0, 8.0, 8.0, 1.0]);
        let window = ReferenceWindow::from_rows(vec![1, 2, 3, 4, 5]);

        let deltas = DeltaCalculator::new(5, true).calculate(&target, &[&neighbor], &window);
        assert_eq!(deltas["TempSensor2"], 2.0);
    }
}
