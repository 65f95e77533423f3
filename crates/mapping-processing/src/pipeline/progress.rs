//! Progress reporting and cancellation for mapping runs.
//!
//! A run over a week of minute data with dozens of sensors can take a while;
//! callers get stage updates through a [`ProgressReporter`] and can stop the
//! run between stages with a [`CancellationToken`].
//!
//! # Example
//!
//! ```rust,ignore
//! use mapping_processing::{CancellationToken, MappingPipeline};
//!
//! let token = CancellationToken::new();
//! let token_clone = token.clone();
//!
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     token_clone.cancel();
//! });
//!
//! let result = MappingPipeline::builder()
//!     .cancellation_token(token)
//!     .on_progress(|update| {
//!         println!("[{:?}] {}", update.stage, update.message);
//!     })
//!     .build()?
//!     .process(&matrix);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stages of a mapping run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStage {
    /// Validating input
    Initializing,
    /// Restricting the matrix to a room's sensors and period
    Filtering,
    /// Auditing data loss per sensor
    GapDetection,
    /// Repairing missing readings
    Imputation,
    /// Summarising repaired readings
    Statistics,
    /// Assembling the report
    ReportGeneration,
    Complete,
    Cancelled,
    Failed,
}

impl MappingStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Filtering => "Filtering Sensors",
            Self::GapDetection => "Detecting Gaps",
            Self::Imputation => "Imputing Values",
            Self::Statistics => "Computing Statistics",
            Self::ReportGeneration => "Generating Report",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall run this stage typically takes (0.0 - 1.0).
    ///
    /// The non-terminal stages sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.05,
            Self::Filtering => 0.10,
            Self::GapDetection => 0.20,
            Self::Imputation => 0.45,
            Self::Statistics => 0.10,
            Self::ReportGeneration => 0.10,
            Self::Complete | Self::Cancelled | Self::Failed => 0.0,
        }
    }

    /// Returns the cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Initializing => 0.0,
            Self::Filtering => 0.05,
            Self::GapDetection => 0.15,
            Self::Imputation => 0.35,
            Self::Statistics => 0.80,
            Self::ReportGeneration => 0.90,
            Self::Complete => 1.0,
            Self::Cancelled | Self::Failed => 0.0,
        }
    }
}

/// Progress update emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: MappingStage,

    /// Optional detail, e.g. "Group: Humidity" or a room number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: MappingStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            sub_stage: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Update for one item out of `total` within a stage.
    pub fn with_items(
        stage: MappingStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            sub_stage: Some(sub_stage.into()),
            items_processed: Some(current),
            items_total: Some(total),
            ..Self::new(stage, stage_progress, message)
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(MappingStage::Complete, 1.0, message)
    }

    pub fn cancelled() -> Self {
        Self::new(MappingStage::Cancelled, 0.0, "Mapping run cancelled")
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(MappingStage::Failed, 0.0, message)
    }
}

/// Receives progress updates from a [`MappingPipeline`](super::MappingPipeline).
///
/// Implementations must be `Send + Sync`; updates may arrive from whichever
/// thread runs the pipeline.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Shared flag for stopping a run from another thread.
///
/// The pipeline checks the token between stages and returns
/// [`MappingError::Cancelled`](crate::error::MappingError::Cancelled) once it
/// is set. A stage already running is allowed to finish.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel()`](Self::cancel) has been called on this
    /// token or any clone of it.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be used for another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancellation_token_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();
        assert!(!token2.is_cancelled());

        token1.cancel();
        assert!(token2.is_cancelled());

        token2.reset();
        assert!(!token1.is_cancelled());
    }

    #[test]
    fn test_progress_update_with_items() {
        let update = ProgressUpdate::with_items(
            MappingStage::Imputation,
            "Group: Temperature",
            1,
            2,
            "Repairing temperature sensors",
        );
        assert_eq!(update.stage, MappingStage::Imputation);
        assert_eq!(update.stage_progress, 0.5);
        assert_eq!(update.items_total, Some(2));
        assert!((update.progress - (0.35 + 0.45 * 0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_progress_update_terminal_states() {
        assert_eq!(ProgressUpdate::complete("Done").progress, 1.0);
        assert_eq!(ProgressUpdate::cancelled().stage, MappingStage::Cancelled);
        assert_eq!(ProgressUpdate::failed("boom").message, "boom");
    }

    #[test]
    fn test_stage_weights_sum() {
        let stages = [
            MappingStage::Initializing,
            MappingStage::Filtering,
            MappingStage::GapDetection,
            MappingStage::Imputation,
            MappingStage::Statistics,
            MappingStage::ReportGeneration,
        ];

        let total_weight: f32 = stages.iter().map(|s| s.weight()).sum();
        assert!((total_weight - 1.0).abs() < 0.01, "Weights should sum to ~1.0");

        for pair in stages.windows(2) {
            let end = pair[0].base_progress() + pair[0].weight();
            assert!((end - pair[1].base_progress()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_closure_progress_reporter_across_threads() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = Arc::new(ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let reporter_clone = reporter.clone();
        let handle = std::thread::spawn(move || {
            reporter_clone.report(ProgressUpdate::new(MappingStage::GapDetection, 0.5, "Test"));
        });
        handle.join().expect("Thread should not panic");
        reporter.report(ProgressUpdate::complete("Done"));

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stage_json_values() {
        let json = serde_json::to_string(&MappingStage::GapDetection).unwrap();
        assert_eq!(json, "\"gap_detection\"");
        let json = serde_json::to_string(&MappingStage::ReportGeneration).unwrap();
        assert_eq!(json, "\"report_generation\"");
    }
}
