//! Custom error types for the mapping pipeline.
//!
//! Only structural failures are errors here. Policy branches such as an
//! insufficient reference window or an unparseable timestamp are recorded on
//! the audit types in [`crate::types`] and never surface as `Err`.
//!
//! Errors are serializable so they can be forwarded to a frontend as
//! `{ "code": ..., "message": ... }`.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the mapping pipeline.
#[derive(Error, Debug)]
pub enum MappingError {
    /// Pipeline was cancelled by the caller.
    #[error("Pipeline cancelled")]
    Cancelled,

    /// A required column was not found.
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    /// The timestamp column was not found in the input frame.
    #[error("Timestamp column '{0}' not found in input")]
    TimestampColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Sensor selection cannot be resolved.
    #[error("Invalid sensor selection: {0}")]
    InvalidSelection(String),

    /// A column does not have one value per timestamp row.
    #[error("Column '{column}' has {actual} values, expected {expected}")]
    ShapeMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// A user-supplied timestamp could not be parsed.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Internal error (e.g., worker pool failure).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<MappingError>,
    },
}

impl MappingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        MappingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::TimestampColumnNotFound(_) => "TIMESTAMP_COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidSelection(_) => "INVALID_SELECTION",
            Self::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            Self::InvalidTimestamp(_) => "INVALID_TIMESTAMP",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Check if the caller can fix the request and retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Cancelled
                | Self::InvalidConfig(_)
                | Self::InvalidSelection(_)
                | Self::InvalidTimestamp(_)
        )
    }
}

impl From<crate::config::ConfigValidationError> for MappingError {
    fn from(err: crate::config::ConfigValidationError) -> Self {
        MappingError::InvalidConfig(err.to_string())
    }
}

impl Serialize for MappingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("MappingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for mapping operations.
pub type Result<T> = std::result::Result<T, MappingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| MappingError::Polars(e).with_context(context))
    }
}
