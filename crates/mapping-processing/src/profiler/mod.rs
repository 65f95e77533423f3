//! Sensor profiling.
//!
//! This module summarises repaired readings per sensor and picks out the
//! hot, cold, wet and dry spots of a mapped room.

mod statistics;

pub use statistics::{SensorStatistics, Spot, SpotSummary, statistics_to_dataframe};
