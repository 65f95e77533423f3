//! Shared utilities for the mapping pipeline.
//!
//! Numeric helpers used by the correlation, delta and statistics code, plus
//! dtype checks and timestamp parsing used by the polars adapter.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _) | DataType::Date)
}

// =============================================================================
// Missing Value Predicate
// =============================================================================

/// Whether a cell counts as missing.
///
/// `None` and `NaN` are always missing. An exact `0.0` is missing when
/// `zero_is_missing` is set, which reproduces the dropout convention of the
/// loggers these files come from.
#[inline]
pub fn is_missing(value: Option<f64>, zero_is_missing: bool) -> bool {
    match value {
        None => true,
        Some(v) if v.is_nan() => true,
        Some(v) => zero_is_missing && v == 0.0,
    }
}

/// The value of a cell if it is live under the given zero policy.
#[inline]
pub fn live_value(value: Option<f64>, zero_is_missing: bool) -> Option<f64> {
    if is_missing(value, zero_is_missing) {
        None
    } else {
        value
    }
}

// =============================================================================
// Numeric Utilities
// =============================================================================

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator), `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Pearson correlation of two equally long samples.
///
/// Returns `None` when the samples differ in length, hold fewer than two
/// points, or either side is constant (the coefficient is undefined).
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let mx = mean(x)?;
    let my = mean(y)?;

    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }

    let r = cov / (vx.sqrt() * vy.sqrt());
    // Rounding can push a perfect fit marginally past 1.
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Round to a fixed number of decimal places.
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// =============================================================================
// Timestamp Parsing
// =============================================================================

/// Datetime layouts accepted from logger exports and plan sheets.
const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a timestamp string, returning `None` for anything unrecognised.
///
/// A bare date parses as midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
