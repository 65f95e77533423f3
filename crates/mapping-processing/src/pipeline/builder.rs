//! Main mapping pipeline module.
//!
//! This module provides the core `MappingPipeline` struct and builder for
//! orchestrating a gap audit and repair run.

use crate::config::{ConfigValidationError, RepairConfig};
use crate::error::{MappingError, Result};
use crate::imputers::VtnImputer;
use crate::matrix::{RoomPlan, SensorMatrix, SensorNaming};
use crate::pipeline::progress::{
    CancellationToken, ClosureProgressReporter, MappingStage, ProgressReporter, ProgressUpdate,
};
use crate::profiler::{SensorStatistics, SpotSummary};
use crate::quality::GapDetector;
use crate::reporting::{MappingReport, ReportGenerator};
use crate::types::MappingResult;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct MappingOutput {
    /// Input matrix with missing readings repaired
    pub repaired: SensorMatrix,
    pub result: MappingResult,
    pub report: MappingReport,
}

/// The main mapping pipeline.
///
/// Use [`MappingPipeline::builder()`] to create a new pipeline with custom
/// configuration.
///
/// # Example
///
/// ```rust,ignore
/// use mapping_processing::{CancellationToken, MappingPipeline, RepairConfig};
///
/// let token = CancellationToken::new();
///
/// let output = MappingPipeline::builder()
///     .config(RepairConfig::builder().n_neighbors(3).build()?)
///     .cancellation_token(token.clone())
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .analyze(&matrix, &plan)?;
///
/// for line in &output.result.gap_report.lines {
///     println!("{line}");
/// }
/// ```
pub struct MappingPipeline {
    config: RepairConfig,
    naming: SensorNaming,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
}

// Runs are moved onto worker threads by callers processing several rooms.
static_assertions::assert_impl_all!(MappingPipeline: Send, Sync);

impl MappingPipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> MappingPipelineBuilder {
        MappingPipelineBuilder::default()
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    pub fn naming(&self) -> &SensorNaming {
        &self.naming
    }

    /// Audit and repair a whole matrix.
    ///
    /// # Errors
    ///
    /// Returns `Err(MappingError::Cancelled)` if the cancellation token was set
    /// before a stage started.
    pub fn process(&self, matrix: &SensorMatrix) -> Result<MappingOutput> {
        self.finish(self.process_internal(matrix, None))
    }

    /// Restrict the matrix to one room's sensors and period, then audit and
    /// repair it.
    pub fn analyze(&self, matrix: &SensorMatrix, plan: &RoomPlan) -> Result<MappingOutput> {
        self.finish(self.process_internal(matrix, Some(plan)))
    }

    fn finish(&self, outcome: Result<MappingOutput>) -> Result<MappingOutput> {
        match outcome {
            Ok(output) => {
                self.report_progress(ProgressUpdate::complete("Mapping run completed"));
                Ok(output)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("Mapping run error: {}", e);
                Err(e)
            }
        }
    }

    /// Check if cancellation has been requested.
    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(MappingError::Cancelled);
        }
        Ok(())
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn filter(&self, matrix: &SensorMatrix, plan: &RoomPlan) -> Result<SensorMatrix> {
        self.report_progress(ProgressUpdate::new(
            MappingStage::Filtering,
            0.0,
            format!("Selecting sensors for room {}", plan.room_number),
        ));

        let filtered = plan.apply(matrix, &self.naming)?;
        info!(
            room = %plan.room_number,
            rows = filtered.height(),
            sensors = filtered.width(),
            "Filtered matrix for room"
        );
        if filtered.width() == 0 {
            warn!(room = %plan.room_number, "No selected sensors present in input");
        }

        self.report_progress(ProgressUpdate::new(
            MappingStage::Filtering,
            1.0,
            "Filtering complete",
        ));
        Ok(filtered)
    }

    fn process_internal(
        &self,
        matrix: &SensorMatrix,
        plan: Option<&RoomPlan>,
    ) -> Result<MappingOutput> {
        let start_time = Instant::now();

        info!(
            rows = matrix.height(),
            sensors = matrix.width(),
            "Starting mapping run..."
        );
        self.report_progress(ProgressUpdate::new(
            MappingStage::Initializing,
            0.0,
            "Starting mapping run...",
        ));

        self.check_cancelled()?;

        let filtered;
        let matrix = match plan {
            Some(plan) => {
                filtered = self.filter(matrix, plan)?;
                &filtered
            }
            None => matrix,
        };

        let zero_is_missing = self.config.zero_is_missing;
        let missing_before = matrix.missing_count(zero_is_missing);

        self.check_cancelled()?;

        // Step 1: Audit data loss on the unrepaired readings
        self.report_progress(ProgressUpdate::new(
            MappingStage::GapDetection,
            0.0,
            "Detecting data loss...",
        ));
        let gap_report = GapDetector::detect(matrix, &self.config);
        info!(
            gaps = gap_report.gap_count(),
            warnings = gap_report.warnings.len(),
            "Step 1: Gap detection complete"
        );

        self.check_cancelled()?;

        // Step 2: Repair missing readings
        self.report_progress(ProgressUpdate::new(
            MappingStage::Imputation,
            0.0,
            format!("Repairing {missing_before} missing readings..."),
        ));
        let (repaired, repairs) = VtnImputer::new(&self.config).impute(matrix)?;
        self.report_progress(ProgressUpdate::new(
            MappingStage::Imputation,
            1.0,
            "Imputation complete",
        ));
        info!("Step 2: Imputation complete");

        self.check_cancelled()?;

        // Step 3: Summarise repaired readings
        self.report_progress(ProgressUpdate::new(
            MappingStage::Statistics,
            0.0,
            "Computing sensor statistics...",
        ));
        let statistics = SensorStatistics::for_matrix(&repaired, zero_is_missing);
        let spots = SpotSummary::identify(&statistics);
        info!(sensors = statistics.len(), "Step 3: Statistics complete");

        self.check_cancelled()?;

        // Step 4: Report
        self.report_progress(ProgressUpdate::new(
            MappingStage::ReportGeneration,
            0.0,
            "Generating report...",
        ));
        let result = MappingResult {
            rows: repaired.height(),
            columns: repaired.width(),
            gap_report,
            repairs,
            statistics,
            spots,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };
        let report = ReportGenerator::build_report(&result, plan, &self.config);

        info!(
            missing = result.missing_cells(),
            repaired = result.repaired_cells(),
            unresolved = result.unresolved_cells(),
            duration_ms = result.duration_ms,
            "Mapping run finished"
        );

        Ok(MappingOutput {
            repaired,
            result,
            report,
        })
    }
}

/// Builder for creating a [`MappingPipeline`].
#[derive(Default)]
pub struct MappingPipelineBuilder {
    config: Option<RepairConfig>,
    naming: Option<SensorNaming>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(MappingPipelineBuilder: Send);

impl MappingPipelineBuilder {
    /// Set the repair configuration.
    pub fn config(mut self, config: RepairConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the column naming scheme used to resolve room selections.
    pub fn naming(mut self, naming: SensorNaming) -> Self {
        self.naming = Some(naming);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use mapping_processing::{ProgressReporter, ProgressUpdate};
    /// use std::sync::Arc;
    ///
    /// struct StderrReporter;
    ///
    /// impl ProgressReporter for StderrReporter {
    ///     fn report(&self, update: ProgressUpdate) {
    ///         eprintln!("{}: {}", update.stage.display_name(), update.message);
    ///     }
    /// }
    ///
    /// let pipeline = MappingPipeline::builder()
    ///     .progress_reporter(Arc::new(StderrReporter))
    ///     .build()?;
    /// ```
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token for stopping the pipeline.
    ///
    /// The token is checked between stages; a set token makes the run return
    /// [`MappingError::Cancelled`].
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<MappingPipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(MappingPipeline {
            config,
            naming: self.naming.unwrap_or_default(),
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{SensorColumn, SensorSelection};
    use crate::types::SensorKind;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn minutes(n: usize) -> Vec<Option<NaiveDateTime>> {
        let base = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| Some(base + Duration::minutes(i as i64)))
            .collect()
    }

    fn small_matrix() -> SensorMatrix {
        let t1: Vec<Option<f64>> = (0..30)
            .map(|i| if (10..13).contains(&i) { None } else { Some(20.0 + i as f64 * 0.1) })
            .collect();
        let t2: Vec<Option<f64>> = (0..30).map(|i| Some(21.0 + i as f64 * 0.1)).collect();
        let rh: Vec<Option<f64>> = (0..30).map(|i| Some(50.0 + (i % 3) as f64)).collect();
        SensorMatrix::new(
            Some(minutes(30)),
            vec![
                SensorColumn::new("TempSensor1", SensorKind::Temperature, t1),
                SensorColumn::new("TempSensor2", SensorKind::Temperature, t2),
                SensorColumn::new("RHSensor1", SensorKind::Humidity, rh),
            ],
        )
        .unwrap()
    }

    // ========================================================================
    // Builder
    // ========================================================================

    #[test]
    fn test_pipeline_builder_default() {
        let pipeline = MappingPipeline::builder().build().unwrap();
        assert_eq!(pipeline.config.n_neighbors, 4);
        assert_eq!(pipeline.naming.prefix(SensorKind::Temperature), "TempSensor");
    }

    #[test]
    fn test_pipeline_builder_rejects_invalid_config() {
        let config = RepairConfig {
            n_neighbors: 0,
            ..RepairConfig::default()
        };
        assert!(MappingPipeline::builder().config(config).build().is_err());
    }

    #[test]
    fn test_pipeline_builder_with_cancellation_token() {
        let token = CancellationToken::new();
        let token_clone = token.clone();

        let pipeline = MappingPipeline::builder()
            .cancellation_token(token)
            .build()
            .unwrap();

        assert!(!pipeline.cancellation_token.is_cancelled());
        token_clone.cancel();
        assert!(pipeline.cancellation_token.is_cancelled());
    }

    #[test]
    fn test_check_cancelled() {
        let token = CancellationToken::new();
        let pipeline = MappingPipeline::builder()
            .cancellation_token(token.clone())
            .build()
            .unwrap();

        assert!(pipeline.check_cancelled().is_ok());
        token.cancel();
        assert!(matches!(
            pipeline.check_cancelled().unwrap_err(),
            MappingError::Cancelled
        ));
    }

    // ========================================================================
    // Runs
    // ========================================================================

    #[test]
    fn test_process_reports_stages_in_order() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let stages_clone = stages.clone();

        let pipeline = MappingPipeline::builder()
            .on_progress(move |update| stages_clone.lock().push(update.stage))
            .build()
            .unwrap();

        let output = pipeline.process(&small_matrix()).unwrap();
        assert_eq!(output.result.missing_cells(), 3);
        assert_eq!(output.result.unresolved_cells(), 0);

        let mut seen = stages.lock().clone();
        seen.dedup();
        assert_eq!(
            seen,
            vec![
                MappingStage::Initializing,
                MappingStage::GapDetection,
                MappingStage::Imputation,
                MappingStage::Statistics,
                MappingStage::ReportGeneration,
                MappingStage::Complete,
            ]
        );
    }

    #[test]
    fn test_process_does_not_modify_input() {
        let matrix = small_matrix();
        let before = matrix.clone();
        let output = MappingPipeline::builder()
            .build()
            .unwrap()
            .process(&matrix)
            .unwrap();

        assert_eq!(matrix, before);
        assert_eq!(output.repaired.height(), matrix.height());
        assert_eq!(output.repaired.column_names(), matrix.column_names());
        assert_eq!(output.repaired.missing_count(true), 0);
    }

    #[test]
    fn test_cancelled_run_reports_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let last = Arc::new(Mutex::new(None));
        let last_clone = last.clone();

        let result = MappingPipeline::builder()
            .cancellation_token(token)
            .on_progress(move |update| *last_clone.lock() = Some(update.stage))
            .build()
            .unwrap()
            .process(&small_matrix());

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(*last.lock(), Some(MappingStage::Cancelled));
    }

    #[test]
    fn test_analyze_filters_to_room() {
        let plan = RoomPlan {
            room_number: "7".to_string(),
            room_name: "Lab".to_string(),
            window: None,
            selection: SensorSelection::range(2, 2),
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let output = MappingPipeline::builder()
            .on_progress(move |update| {
                if update.stage == MappingStage::Filtering {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build()
            .unwrap()
            .analyze(&small_matrix(), &plan)
            .unwrap();

        assert_eq!(output.repaired.column_names(), vec!["TempSensor2"]);
        assert_eq!(output.report.room.as_ref().unwrap().room_name, "Lab");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
