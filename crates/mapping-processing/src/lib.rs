//! Temperature/Humidity Mapping Library
//!
//! Gap auditing and missing-reading repair for temperature and humidity
//! mapping studies, built with Rust and Polars.
//!
//! # Overview
//!
//! A mapping study logs many sensors across a room at a fixed cadence
//! (typically one reading per minute for a week). This library:
//!
//! - **Audits data loss**: clusters missing readings into gaps, measures them
//!   in minutes and flags sensors whose outages exceed configured limits
//! - **Repairs readings**: estimates each missing value from the sensor's most
//!   correlated same-kind neighbors plus a learned offset (virtual temporal
//!   neighbors), falling back to linear interpolation
//! - **Summarises sensors**: per-sensor statistics and hot/cold/wet/dry spots
//! - **Reports progress**: stage updates with cancellation support
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mapping_processing::{from_dataframe, MappingPipeline, RepairConfig, SensorNaming};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("week.csv".into()))?
//!     .finish()?;
//! let matrix = from_dataframe(&df, Some("timestamp"), &SensorNaming::default())?;
//!
//! let output = MappingPipeline::builder()
//!     .config(RepairConfig::builder().n_neighbors(4).build()?)
//!     .build()?
//!     .process(&matrix)?;
//!
//! for line in &output.result.gap_report.lines {
//!     println!("{line}");
//! }
//! println!("Repaired {} readings", output.result.repaired_cells());
//! ```
//!
//! # Rooms
//!
//! A [`RoomPlan`] restricts a run to a sensor range and a time window, the
//! way one row of a mapping plan sheet does:
//!
//! ```rust,ignore
//! use mapping_processing::{RoomPlan, SensorSelection, TimeWindow};
//!
//! let plan = RoomPlan {
//!     room_number: "101".into(),
//!     room_name: "Cold Room".into(),
//!     window: Some(TimeWindow::parse("2024-03-01 08:00:00", "2024-03-08 08:00:00")?),
//!     selection: SensorSelection::range(1, 12).with_excluded([7]),
//! };
//!
//! let output = pipeline.analyze(&matrix, &plan)?;
//! ```
//!
//! # Configuration
//!
//! Use [`RepairConfig`] to tune the repair and the loss limits:
//!
//! ```rust,ignore
//! use mapping_processing::config::*;
//! use mapping_processing::SensorKind;
//!
//! let config = RepairConfig::builder()
//!     .n_neighbors(3)                      // Neighbors per missing reading
//!     .reference_period_hours(4.0)         // Look-back for correlations
//!     .limit_time_minutes(30.0)            // Warn on a single longer gap
//!     .limit_percentage(0.2)               // Warn above 20% total loss
//!     .loss_window(LossWindow::ObservedSpan)
//!     .audited_kinds([SensorKind::Temperature, SensorKind::Humidity])
//!     .build()?;
//! ```

pub mod config;
pub mod error;
pub mod imputers;
pub mod matrix;
pub mod pipeline;
pub mod profiler;
pub mod quality;
pub mod reporting;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{ConfigValidationError, LossWindow, RepairConfig, RepairConfigBuilder};
pub use error::{MappingError, ResultExt};
pub use imputers::{DeltaCalculator, NeighborSelection, NeighborSelector, VtnImputer};
pub use matrix::{
    RoomPlan, SensorColumn, SensorMatrix, SensorNaming, SensorSelection, TimeWindow,
    from_dataframe, plans_from_dataframe, to_dataframe,
};
pub use pipeline::{
    CancellationToken, ClosureProgressReporter, IngestCache, MappingOutput, MappingPipeline,
    MappingPipelineBuilder, MappingStage, ProgressReporter, ProgressUpdate, SourceKey,
};
pub use profiler::{SensorStatistics, SpotSummary, statistics_to_dataframe};
pub use quality::GapDetector;
pub use reporting::{MappingReport, ReportGenerator};
pub use types::{
    ColumnRepair, FallbackReason, Gap, GapReport, MappingResult, RepairMethod, SelectionTier,
    SensorKind, SensorLoss,
};
