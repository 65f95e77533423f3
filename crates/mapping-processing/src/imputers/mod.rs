//! Missing-value repair for sensor columns.
//!
//! This module provides:
//! - Reference window construction
//! - Neighbor selection (correlation, index proximity, listing order)
//! - Delta offset estimation
//! - VTN imputation with a linear interpolation fallback

mod delta;
mod interpolation;
mod neighbors;
mod reference;
mod vtn;

pub use delta::DeltaCalculator;
pub use interpolation::{interpolate_linear, interpolation_axis};
pub use neighbors::{NeighborSelection, NeighborSelector};
pub use reference::ReferenceWindow;
pub use vtn::{RESOLVED_ZERO, VtnImputer};
