//! Column name adapter.
//!
//! Logger exports name their columns `TempSensor{n}` / `RHSensor{n}`. The
//! adapter maps names to a [`SensorKind`] and sensor index once, at ingestion,
//! so downstream code reads the metadata off [`SensorColumn`](super::SensorColumn)
//! instead of re-parsing names.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::SensorKind;

static DIGIT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("Invalid regex: digit runs"));

/// Extract the numeric sensor index from a column name.
///
/// Every digit in the name is concatenated, so `TempSensor12` yields 12 and
/// `Room2Sensor5` yields 25. Names without digits, or whose digits overflow,
/// yield `None`.
pub fn parse_sensor_index(name: &str) -> Option<u32> {
    let digits: String = DIGIT_RUNS.find_iter(name).map(|m| m.as_str()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Prefix convention mapping column names to sensor kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorNaming {
    pub temperature_prefix: String,
    pub humidity_prefix: String,
}

impl Default for SensorNaming {
    fn default() -> Self {
        Self {
            temperature_prefix: "TempSensor".to_string(),
            humidity_prefix: "RHSensor".to_string(),
        }
    }
}

impl SensorNaming {
    pub fn new(temperature_prefix: impl Into<String>, humidity_prefix: impl Into<String>) -> Self {
        Self {
            temperature_prefix: temperature_prefix.into(),
            humidity_prefix: humidity_prefix.into(),
        }
    }

    pub fn prefix(&self, kind: SensorKind) -> &str {
        match kind {
            SensorKind::Temperature => &self.temperature_prefix,
            SensorKind::Humidity => &self.humidity_prefix,
        }
    }

    /// Kind of a column, or `None` if the name matches neither prefix.
    pub fn kind_of(&self, name: &str) -> Option<SensorKind> {
        // Check the longer prefix first so that one prefix extending the
        // other cannot shadow it.
        let mut kinds = SensorKind::ALL;
        kinds.sort_by_key(|k| std::cmp::Reverse(self.prefix(*k).len()));
        kinds
            .into_iter()
            .find(|k| name.starts_with(self.prefix(*k)))
    }

    /// Kind and index of a column. The index is `None` when no digits follow.
    pub fn parse(&self, name: &str) -> Option<(SensorKind, Option<u32>)> {
        let kind = self.kind_of(name)?;
        Some((kind, parse_sensor_index(name)))
    }

    /// Column name for a sensor index.
    pub fn column_name(&self, kind: SensorKind, index: u32) -> String {
        format!("{}{}", self.prefix(kind), index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sensor_index() {
        assert_eq!(parse_sensor_index("TempSensor1"), Some(1));
        assert_eq!(parse_sensor_index("RHSensor12"), Some(12));
        assert_eq!(parse_sensor_index("Room2Sensor5"), Some(25));
        assert_eq!(parse_sensor_index("TempSensor"), None);
        assert_eq!(parse_sensor_index("TempSensor99999999999"), None);
    }

    #[test]
    fn test_kind_of() {
        let naming = SensorNaming::default();
        assert_eq!(naming.kind_of("TempSensor3"), Some(SensorKind::Temperature));
        assert_eq!(naming.kind_of("RHSensor3"), Some(SensorKind::Humidity));
        assert_eq!(naming.kind_of("timestamp"), None);
    }

    #[test]
    fn test_parse_without_index() {
        let naming = SensorNaming::default();
        assert_eq!(
            naming.parse("TempSensorA"),
            Some((SensorKind::Temperature, None))
        );
    }

    #[test]
    fn test_overlapping_prefixes() {
        let naming = SensorNaming::new("T", "TRH");
        assert_eq!(naming.kind_of("TRH4"), Some(SensorKind::Humidity));
        assert_eq!(naming.kind_of("T4"), Some(SensorKind::Temperature));
    }

    #[test]
    fn test_column_name() {
        let naming = SensorNaming::default();
        assert_eq!(naming.column_name(SensorKind::Temperature, 7), "TempSensor7");
        assert_eq!(naming.column_name(SensorKind::Humidity, 7), "RHSensor7");
    }
}
