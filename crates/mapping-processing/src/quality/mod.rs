//! Data loss auditing.
//!
//! This module measures how much of each sensor's record is missing and
//! raises warnings when a single outage or the total loss exceeds its limit.

mod gaps;

pub use gaps::{GapDetector, cluster_gaps};
