//! Configuration types for gap auditing and sensor repair.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use crate::types::SensorKind;
use serde::{Deserialize, Serialize};

/// Minutes in the seven-day study window the loss percentage is quoted against.
pub const SEVEN_DAYS_MINUTES: f64 = 7.0 * 24.0 * 60.0;

/// Denominator used when converting a sensor's total gap duration into a
/// loss percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LossWindow {
    /// A fixed number of minutes, independent of the analysed data.
    FixedMinutes(f64),
    /// The span between the first and last parseable timestamp of the
    /// matrix, in minutes (plus one sample minute).
    ObservedSpan,
}

impl Default for LossWindow {
    fn default() -> Self {
        LossWindow::FixedMinutes(SEVEN_DAYS_MINUTES)
    }
}

/// Configuration for gap detection and VTN imputation.
///
/// Use [`RepairConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use mapping_processing::config::RepairConfig;
///
/// let config = RepairConfig::builder()
///     .n_neighbors(3)
///     .reference_period_hours(4.0)
///     .limit_time_minutes(30.0)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Maximum number of correlated neighbors used per target sensor.
    /// Default: 4
    pub n_neighbors: usize,

    /// Lookback, in hours before the latest valid target reading, used to
    /// learn correlations and offsets.
    /// Default: 2.0
    pub reference_period_hours: f64,

    /// Reference windows smaller than this force the interpolation fallback.
    /// Default: 10
    pub min_reference_rows: usize,

    /// Minimum jointly-valid rows for a correlation or delta to exist.
    /// Default: 5
    pub min_overlap_rows: usize,

    /// Two missing samples further apart than this start a new gap.
    /// Default: 120 seconds
    pub continuity_threshold_secs: i64,

    /// A single gap longer than this (minutes) raises a warning.
    /// Default: 60.0
    pub limit_time_minutes: f64,

    /// Total loss above this fraction raises a warning (0.0 - 1.0).
    /// Default: 0.30
    pub limit_percentage: f64,

    /// Denominator for the loss percentage.
    /// Default: fixed seven days
    pub loss_window: LossWindow,

    /// Sensor kinds audited by the gap detector.
    /// Default: temperature only
    pub audited_kinds: Vec<SensorKind>,

    /// Whether an exact 0.0 reading is treated as a dropout.
    /// Default: true
    pub zero_is_missing: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 4,
            reference_period_hours: 2.0,
            min_reference_rows: 10,
            min_overlap_rows: 5,
            continuity_threshold_secs: 120,
            limit_time_minutes: 60.0,
            limit_percentage: 0.30,
            loss_window: LossWindow::default(),
            audited_kinds: vec![SensorKind::Temperature],
            zero_is_missing: true,
        }
    }
}

impl RepairConfig {
    /// Create a new configuration builder.
    pub fn builder() -> RepairConfigBuilder {
        RepairConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.n_neighbors == 0 {
            return Err(ConfigValidationError::InvalidNeighbors(self.n_neighbors));
        }

        if !self.reference_period_hours.is_finite() || self.reference_period_hours <= 0.0 {
            return Err(ConfigValidationError::InvalidPeriod(
                self.reference_period_hours,
            ));
        }

        if !(0.0..=1.0).contains(&self.limit_percentage) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "limit_percentage".to_string(),
                value: self.limit_percentage,
            });
        }

        if !self.limit_time_minutes.is_finite() || self.limit_time_minutes <= 0.0 {
            return Err(ConfigValidationError::InvalidLimit {
                field: "limit_time_minutes".to_string(),
                value: self.limit_time_minutes,
            });
        }

        if self.continuity_threshold_secs <= 0 {
            return Err(ConfigValidationError::InvalidLimit {
                field: "continuity_threshold_secs".to_string(),
                value: self.continuity_threshold_secs as f64,
            });
        }

        if self.min_overlap_rows < 2 {
            return Err(ConfigValidationError::InvalidLimit {
                field: "min_overlap_rows".to_string(),
                value: self.min_overlap_rows as f64,
            });
        }

        if let LossWindow::FixedMinutes(minutes) = self.loss_window
            && (!minutes.is_finite() || minutes <= 0.0)
        {
            return Err(ConfigValidationError::InvalidLimit {
                field: "loss_window".to_string(),
                value: minutes,
            });
        }

        Ok(())
    }

    /// Whether `kind` columns are scanned by the gap detector.
    pub fn audits(&self, kind: SensorKind) -> bool {
        self.audited_kinds.contains(&kind)
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid neighbor count: {0} (must be at least 1)")]
    InvalidNeighbors(usize),

    #[error("Invalid reference period: {0} hours (must be positive)")]
    InvalidPeriod(f64),

    #[error("Invalid value for '{field}': {value}")]
    InvalidLimit { field: String, value: f64 },
}

/// Builder for [`RepairConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct RepairConfigBuilder {
    n_neighbors: Option<usize>,
    reference_period_hours: Option<f64>,
    min_reference_rows: Option<usize>,
    min_overlap_rows: Option<usize>,
    continuity_threshold_secs: Option<i64>,
    limit_time_minutes: Option<f64>,
    limit_percentage: Option<f64>,
    loss_window: Option<LossWindow>,
    audited_kinds: Option<Vec<SensorKind>>,
    zero_is_missing: Option<bool>,
}

impl RepairConfigBuilder {
    /// Set the maximum number of neighbors per target sensor.
    pub fn n_neighbors(mut self, n: usize) -> Self {
        self.n_neighbors = Some(n);
        self
    }

    /// Set the reference lookback in hours.
    pub fn reference_period_hours(mut self, hours: f64) -> Self {
        self.reference_period_hours = Some(hours);
        self
    }

    /// Set the minimum reference window size.
    pub fn min_reference_rows(mut self, rows: usize) -> Self {
        self.min_reference_rows = Some(rows);
        self
    }

    /// Set the minimum overlap for correlation and delta estimation.
    pub fn min_overlap_rows(mut self, rows: usize) -> Self {
        self.min_overlap_rows = Some(rows);
        self
    }

    /// Set the gap continuity threshold in seconds.
    pub fn continuity_threshold_secs(mut self, secs: i64) -> Self {
        self.continuity_threshold_secs = Some(secs);
        self
    }

    /// Set the single-gap warning threshold in minutes.
    pub fn limit_time_minutes(mut self, minutes: f64) -> Self {
        self.limit_time_minutes = Some(minutes);
        self
    }

    /// Set the total-loss warning threshold.
    ///
    /// # Arguments
    /// * `fraction` - Value between 0.0 and 1.0 (e.g., 0.3 = 30%)
    pub fn limit_percentage(mut self, fraction: f64) -> Self {
        self.limit_percentage = Some(fraction);
        self
    }

    /// Set the loss percentage denominator.
    pub fn loss_window(mut self, window: LossWindow) -> Self {
        self.loss_window = Some(window);
        self
    }

    /// Set which sensor kinds the gap detector audits.
    pub fn audited_kinds(mut self, kinds: impl Into<Vec<SensorKind>>) -> Self {
        self.audited_kinds = Some(kinds.into());
        self
    }

    /// Treat exact zero readings as dropouts (the default) or as genuine values.
    pub fn zero_is_missing(mut self, zero_is_missing: bool) -> Self {
        self.zero_is_missing = Some(zero_is_missing);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `RepairConfig` or an error if validation fails.
    pub fn build(self) -> Result<RepairConfig, ConfigValidationError> {
        let defaults = RepairConfig::default();
        let config = RepairConfig {
            n_neighbors: self.n_neighbors.unwrap_or(defaults.n_neighbors),
            reference_period_hours: self
                .reference_period_hours
                .unwrap_or(defaults.reference_period_hours),
            min_reference_rows: self
                .min_reference_rows
                .unwrap_or(defaults.min_reference_rows),
            min_overlap_rows: self.min_overlap_rows.unwrap_or(defaults.min_overlap_rows),
            continuity_threshold_secs: self
                .continuity_threshold_secs
                .unwrap_or(defaults.continuity_threshold_secs),
            limit_time_minutes: self
                .limit_time_minutes
                .unwrap_or(defaults.limit_time_minutes),
            limit_percentage: self.limit_percentage.unwrap_or(defaults.limit_percentage),
            loss_window: self.loss_window.unwrap_or(defaults.loss_window),
            audited_kinds: self.audited_kinds.unwrap_or(defaults.audited_kinds),
            zero_is_missing: self.zero_is_missing.unwrap_or(defaults.zero_is_missing),
        };

        config.validate()?;
        Ok(config)
    }
}
