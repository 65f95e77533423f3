//! Conversion between polars `DataFrame`s and [`SensorMatrix`].

use chrono::NaiveDateTime;
use polars::prelude::*;
use tracing::{debug, warn};

use super::{RoomPlan, SensorColumn, SensorMatrix, SensorNaming, SensorSelection, TimeWindow};
use crate::error::{MappingError, Result, ResultExt};
use crate::utils::{is_datetime_dtype, is_numeric_dtype, parse_timestamp};

/// Output layout for timestamps written back to CSV.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Build a sensor matrix from a parsed table.
///
/// Columns whose name matches a [`SensorNaming`] prefix become sensor
/// columns (cast to `Float64`, unparseable cells become `None`); all other
/// columns are ignored. With `timestamp_column = None` the matrix has no
/// time axis. Naming a timestamp column that is absent is an error.
pub fn from_dataframe(
    df: &DataFrame,
    timestamp_column: Option<&str>,
    naming: &SensorNaming,
) -> Result<SensorMatrix> {
    let timestamps = match timestamp_column {
        Some(name) => {
            let column = df
                .column(name)
                .map_err(|_| MappingError::TimestampColumnNotFound(name.to_string()))?;
            Some(parse_timestamp_column(column.as_materialized_series())?)
        }
        None => None,
    };

    if let Some(ts) = &timestamps {
        let unparsed = ts.iter().filter(|t| t.is_none()).count();
        if unparsed > 0 {
            warn!(rows = unparsed, "Timestamps could not be parsed");
        }
    }

    let mut columns = Vec::new();
    for column in df.get_columns() {
        let name = column.name().as_str();
        if Some(name) == timestamp_column {
            continue;
        }
        let Some((kind, _)) = naming.parse(name) else {
            debug!(column = name, "Skipping non-sensor column");
            continue;
        };

        if !is_numeric_dtype(column.dtype()) && column.dtype() != &DataType::String {
            warn!(column = name, dtype = %column.dtype(), "Sensor column has unexpected dtype");
        }

        let cast = column
            .cast(&DataType::Float64)
            .context(format!("Casting '{name}' to Float64"))?;
        let values: Vec<Option<f64>> = cast.f64()?.into_iter().collect();

        columns.push(SensorColumn::new(name, kind, values));
    }

    debug!(
        rows = df.height(),
        sensors = columns.len(),
        "Built sensor matrix from DataFrame"
    );
    SensorMatrix::new(timestamps, columns)
}

fn parse_timestamp_column(series: &Series) -> Result<Vec<Option<NaiveDateTime>>> {
    // Datetime columns are rendered through their string form so that every
    // time unit goes through the same parser.
    let as_text = if series.dtype() != &DataType::String {
        if !is_datetime_dtype(series.dtype()) {
            debug!(dtype = %series.dtype(), "Timestamp column is neither text nor datetime");
        }
        series.cast(&DataType::String)?
    } else {
        series.clone()
    };

    Ok(as_text
        .str()?
        .into_iter()
        .map(|v| v.and_then(parse_timestamp))
        .collect())
}

/// Render a sensor matrix as a `DataFrame`.
///
/// The timestamp column comes first (formatted as `%Y-%m-%d %H:%M:%S`),
/// followed by the sensor columns in matrix order.
pub fn to_dataframe(matrix: &SensorMatrix, timestamp_column: &str) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(matrix.width() + 1);

    if let Some(ts) = matrix.timestamps() {
        let formatted: Vec<Option<String>> = ts
            .iter()
            .map(|t| t.map(|t| t.format(TIMESTAMP_FORMAT).to_string()))
            .collect();
        columns.push(Column::new(timestamp_column.into(), formatted));
    }

    for column in matrix.columns() {
        columns.push(Column::new(column.name.as_str().into(), column.values.clone()));
    }

    Ok(DataFrame::new(columns)?)
}

/// Columns a mapping plan sheet must carry.
pub const PLAN_COLUMNS: [&str; 7] = [
    "room number",
    "room name",
    "Start date",
    "End date",
    "Time",
    "Sensor start",
    "Sensor stop",
];

/// Read a mapping plan sheet into one [`RoomPlan`] per room.
///
/// The window runs from `Start date` + `Time` to `End date` + `Time`. Rows
/// without a room number, room name or sensor range are skipped; a row whose
/// dates cannot be parsed analyses every row of the input.
pub fn plans_from_dataframe(df: &DataFrame) -> Result<Vec<RoomPlan>> {
    let missing: Vec<&str> = PLAN_COLUMNS
        .iter()
        .copied()
        .filter(|c| df.column(c).is_err())
        .collect();
    if !missing.is_empty() {
        return Err(MappingError::ColumnNotFound(missing.join(", ")));
    }

    let room_numbers = text_values(df, "room number")?;
    let room_names = text_values(df, "room name")?;
    let start_dates = text_values(df, "Start date")?;
    let end_dates = text_values(df, "End date")?;
    let times = text_values(df, "Time")?;
    let sensor_starts = index_values(df, "Sensor start")?;
    let sensor_stops = index_values(df, "Sensor stop")?;

    let mut plans = Vec::new();
    for row in 0..df.height() {
        let (Some(room_number), Some(room_name)) = (&room_numbers[row], &room_names[row]) else {
            debug!(row, "Skipping plan row without room");
            continue;
        };
        let (Some(start), Some(end)) = (sensor_starts[row], sensor_stops[row]) else {
            warn!(row, room = %room_number, "Skipping plan row without sensor range");
            continue;
        };

        let at = |date: &Option<String>| {
            let date = date.as_deref()?;
            match times[row].as_deref() {
                Some(time) => parse_timestamp(&format!("{date} {time}")),
                None => parse_timestamp(date),
            }
        };
        let window = match (at(&start_dates[row]), at(&end_dates[row])) {
            (Some(start), Some(end)) => Some(TimeWindow::new(start, end)?),
            _ => {
                warn!(row, room = %room_number, "Plan dates unparseable; using full period");
                None
            }
        };

        plans.push(RoomPlan {
            room_number: room_number.clone(),
            room_name: room_name.clone(),
            window,
            selection: SensorSelection::range(start, end),
        });
    }

    debug!(rooms = plans.len(), "Parsed mapping plan");
    Ok(plans)
}

fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map(str::trim).filter(|v| !v.is_empty()).map(String::from))
        .collect())
}

fn index_values(df: &DataFrame, name: &str) -> Result<Vec<Option<u32>>> {
    let column = df
        .column(name)?
        .cast(&DataType::Float64)
        .context(format!("Casting '{name}' to Float64"))?;
    Ok(column
        .f64()?
        .into_iter()
        .map(|v| v.filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u32))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SensorKind;
    use pretty_assertions::assert_eq;

    fn sample_df() -> DataFrame {
        df!(
            "timestamp" => ["2024-03-01 08:00:00", "2024-03-01 08:01:00", "garbage"],
            "TempSensor1" => [Some(21.5), Some(0.0), None],
            "RHSensor1" => [55i64, 56, 57],
            "Notes" => ["a", "b", "c"]
        )
        .unwrap()
    }

    #[test]
    fn test_from_dataframe_reads_sensor_columns() {
        let df = sample_df();
        let matrix = from_dataframe(&df, Some("timestamp"), &SensorNaming::default()).unwrap();

        assert_eq!(matrix.height(), 3);
        assert_eq!(matrix.column_names(), vec!["TempSensor1", "RHSensor1"]);

        let temp = matrix.column("TempSensor1").unwrap();
        assert_eq!(temp.kind, SensorKind::Temperature);
        assert_eq!(temp.index, Some(1));
        assert_eq!(temp.values, vec![Some(21.5), Some(0.0), None]);

        let rh = matrix.column("RHSensor1").unwrap();
        assert_eq!(rh.kind, SensorKind::Humidity);
        assert_eq!(rh.values, vec![Some(55.0), Some(56.0), Some(57.0)]);
    }

    #[test]
    fn test_from_dataframe_unparseable_timestamp_is_none() {
        let df = sample_df();
        let matrix = from_dataframe(&df, Some("timestamp"), &SensorNaming::default()).unwrap();
        assert!(matrix.timestamp(0).is_some());
        assert!(matrix.timestamp(2).is_none());
    }

    #[test]
    fn test_from_dataframe_missing_timestamp_column() {
        let df = sample_df();
        let err = from_dataframe(&df, Some("time"), &SensorNaming::default()).unwrap_err();
        assert_eq!(err.error_code(), "TIMESTAMP_COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_from_dataframe_without_time_axis() {
        let df = df!("TempSensor2" => [1.0, 2.0]).unwrap();
        let matrix = from_dataframe(&df, None, &SensorNaming::default()).unwrap();
        assert!(matrix.timestamps().is_none());
        assert_eq!(matrix.height(), 2);
    }

    #[test]
    fn test_string_values_are_cast() {
        let df = df!(
            "timestamp" => ["2024-03-01 08:00:00", "2024-03-01 08:01:00"],
            "TempSensor1" => ["21.5", "n/a"]
        )
        .unwrap();
        let matrix = from_dataframe(&df, Some("timestamp"), &SensorNaming::default()).unwrap();
        assert_eq!(
            matrix.column("TempSensor1").unwrap().values,
            vec![Some(21.5), None]
        );
    }

    #[test]
    fn test_to_dataframe_layout() {
        let df = sample_df();
        let matrix = from_dataframe(&df, Some("timestamp"), &SensorNaming::default()).unwrap();
        let out = to_dataframe(&matrix, "timestamp").unwrap();

        let names: Vec<String> = out
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["timestamp", "TempSensor1", "RHSensor1"]);

        let ts = out.column("timestamp").unwrap().str().unwrap();
        assert_eq!(ts.get(1), Some("2024-03-01 08:01:00"));
        assert_eq!(ts.get(2), None);

        let temp = out.column("TempSensor1").unwrap().f64().unwrap();
        assert_eq!(temp.get(0), Some(21.5));
        assert_eq!(temp.get(2), None);
    }
    // ========================================================================
    // Plan sheets
    // ========================================================================

    #[test]
    fn test_plans_from_dataframe() {
        let df = df!(
            "room number" => [Some("101"), None, Some("102")],
            "room name" => [Some("Cold Room"), Some("x"), Some("Store")],
            "Start date" => ["2024-03-01", "2024-03-01", "bad"],
            "End date" => ["2024-03-08", "2024-03-08", "bad"],
            "Time" => ["08:00:00", "08:00:00", "08:00:00"],
            "Sensor start" => [1i64, 1, 5],
            "Sensor stop" => [4i64, 4, 8]
        )
        .unwrap();

        let plans = plans_from_dataframe(&df).unwrap();
        assert_eq!(plans.len(), 2);

        let first = &plans[0];
        assert_eq!(first.room_number, "101");
        assert_eq!(first.selection, SensorSelection::range(1, 4));
        let window = first.window.unwrap();
        assert_eq!(window.start.to_string(), "2024-03-01 08:00:00");
        assert_eq!(window.end.to_string(), "2024-03-08 08:00:00");

        assert_eq!(plans[1].room_name, "Store");
        assert!(plans[1].window.is_none());
    }

    #[test]
    fn test_plans_missing_columns() {
        let df = df!("room number" => ["101"], "room name" => ["Cold Room"]).unwrap();
        let err = plans_from_dataframe(&df).unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
        assert!(err.to_string().contains("Sensor start"));
    }
}
