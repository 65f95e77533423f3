//! Report generation.
//!
//! [`MappingReport`] gathers everything a run produced: the data loss audit,
//! per-column repairs, statistics and spots. It serves both as the
//! `--json` / `--emit-report` payload and as the input for the plain-text
//! audit report.
//!
//! # Example
//!
//! ```rust,ignore
//! use mapping_processing::reporting::ReportGenerator;
//!
//! let report = ReportGenerator::build_report(&output.result, Some(&plan), &config);
//! println!("{}", ReportGenerator::render_text(&report));
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```

mod generator;

pub use generator::{MappingReport, RepairTotals, ReportGenerator, RoomInfo};
