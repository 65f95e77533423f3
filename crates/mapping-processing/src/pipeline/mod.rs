//! Pipeline module.
//!
//! This module provides the mapping pipeline, its progress reporting, and the
//! ingestion cache used when several rooms share the same input files.

mod builder;
pub mod cache;
pub mod progress;

pub use builder::{MappingOutput, MappingPipeline, MappingPipelineBuilder};
pub use cache::{IngestCache, SourceIdentity, SourceKey};
pub use progress::{
    CancellationToken, ClosureProgressReporter, MappingStage, ProgressReporter, ProgressUpdate,
};
