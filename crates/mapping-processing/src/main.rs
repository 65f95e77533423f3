//! CLI entry point for the mapping pipeline.

use anyhow::{Result, anyhow, bail};
use clap::{Parser, ValueEnum};
use mapping_processing::{
    IngestCache, LossWindow, MappingOutput, MappingPipeline, MappingReport, RepairConfig,
    ReportGenerator, RoomPlan, SensorKind, SensorMatrix, SensorNaming, SensorSelection,
    SourceKey, TimeWindow, from_dataframe, plans_from_dataframe, statistics_to_dataframe,
    to_dataframe,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// CLI-compatible loss window enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLossWindow {
    /// Quote loss against a fixed seven-day study
    Fixed,
    /// Quote loss against the span actually covered by the input
    Observed,
}

impl From<CliLossWindow> for LossWindow {
    fn from(cli: CliLossWindow) -> Self {
        match cli {
            CliLossWindow::Fixed => LossWindow::default(),
            CliLossWindow::Observed => LossWindow::ObservedSpan,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Temperature/humidity mapping: data loss audit and sensor repair",
    long_about = "Audits missing readings in temperature/humidity logger exports and repairs \
                  them from correlated neighboring sensors.\n\n\
                  EXAMPLES:\n  \
                  # Whole input, default limits\n  \
                  mapping-processing -i exports/\n\n  \
                  # One room from an ad-hoc selection\n  \
                  mapping-processing -i week.csv --sensor-start 1 --sensor-stop 12 --exclude 7 \\\n      \
                  --from '2024-03-01 08:00' --to '2024-03-08 08:00' --room-number 101 --room-name 'Cold Room'\n\n  \
                  # Every room of a plan sheet\n  \
                  mapping-processing -i exports/ --plan plan.csv -o results/ --emit-report"
)]
struct Args {
    /// CSV files or directories of CSV files to read
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Name of the timestamp column in the input files
    #[arg(long, default_value = "timestamp")]
    timestamp_column: String,

    /// Mapping plan sheet (CSV) with one row per room
    ///
    /// Required columns: room number, room name, Start date, End date, Time,
    /// Sensor start, Sensor stop
    #[arg(long, conflicts_with_all = ["sensor_start", "sensor_stop"])]
    plan: Option<PathBuf>,

    /// First sensor index of an ad-hoc room
    #[arg(long, requires = "sensor_stop")]
    sensor_start: Option<u32>,

    /// Last sensor index of an ad-hoc room
    #[arg(long, requires = "sensor_start")]
    sensor_stop: Option<u32>,

    /// Extra sensor indices to include (comma separated)
    #[arg(long, value_delimiter = ',')]
    add: Vec<u32>,

    /// Sensor indices to leave out (comma separated)
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<u32>,

    /// Start of the analysed period
    #[arg(long, requires = "to")]
    from: Option<String>,

    /// End of the analysed period (inclusive)
    #[arg(long, requires = "from")]
    to: Option<String>,

    /// Room number of an ad-hoc room
    #[arg(long, default_value = "room")]
    room_number: String,

    /// Room name of an ad-hoc room
    #[arg(long, default_value = "mapping")]
    room_name: String,

    /// Number of neighbors used per missing reading
    #[arg(long, default_value = "4")]
    neighbors: usize,

    /// Look-back period (hours) for correlations and offsets
    #[arg(long, default_value = "2.0")]
    reference_hours: f64,

    /// Warn when a single gap exceeds this many minutes
    #[arg(long, default_value = "60")]
    limit_time: f64,

    /// Warn when total loss exceeds this fraction of the loss window (0.30 = 30%)
    #[arg(long, default_value = "0.30")]
    limit_percentage: f64,

    /// Denominator of the loss percentage
    #[arg(long, value_enum, default_value = "fixed")]
    loss_window: CliLossWindow,

    /// Audit humidity sensors as well as temperature sensors
    #[arg(long)]
    audit_humidity: bool,

    /// Treat an exact 0.0 reading as a real value rather than missing
    #[arg(long)]
    keep_zeros: bool,

    /// Output directory for results
    #[arg(short, long, default_value = "./outputs")]
    output: PathBuf,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON report(s).
    #[arg(long)]
    json: bool,

    /// Write a detailed JSON report per room to the output directory
    #[arg(short = 'r', long)]
    emit_report: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and final result)
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    let paths = collect_input_files(&args.input)?;
    info!("Found {} input file(s)", paths.len());

    if !args.output.exists() {
        std::fs::create_dir_all(&args.output)?;
        info!("Created output directory: {}", args.output.display());
    }

    let config = build_config(&args)?;
    let pipeline = build_pipeline(&args, config)?;
    let plans = load_plans(&args)?;

    let cache = IngestCache::new();
    let key = SourceKey::from_paths(&paths)?;
    let naming = pipeline.naming().clone();

    let mut reports: Vec<MappingReport> = Vec::new();

    if plans.is_empty() {
        let matrix = cache.get_or_load(&key, || load_matrix(&paths, &args.timestamp_column, &naming))?;
        let stem = extract_file_stem(&paths[0]);

        info!("{}", "=".repeat(80));
        info!("Processing all sensors ({} rows)", matrix.height());
        info!("{}", "=".repeat(80));

        let output = pipeline.process(&matrix)?;
        write_outputs(&output, &stem, &args)?;
        reports.push(output.report);
    } else {
        for plan in &plans {
            let matrix =
                cache.get_or_load(&key, || load_matrix(&paths, &args.timestamp_column, &naming))?;

            info!("{}", "=".repeat(80));
            info!("Room {} - {}", plan.room_number, plan.room_name);
            info!("{}", "=".repeat(80));

            match pipeline.analyze(&matrix, plan) {
                Ok(output) => {
                    write_outputs(&output, &plan.file_stem(), &args)?;
                    reports.push(output.report);
                }
                Err(e) if e.is_recoverable() && plans.len() > 1 => {
                    error!("Room {} failed: {}", plan.room_number, e);
                }
                Err(e) => return Err(anyhow!("Room {} failed: {}", plan.room_number, e)),
            }
        }
    }

    if args.json {
        if let [report] = reports.as_slice() {
            println!("{}", serde_json::to_string_pretty(report)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        return Ok(());
    }

    for report in &reports {
        println!();
        print!("{}", ReportGenerator::render_text(report));
    }
    println!("{}", "=".repeat(80));
    println!("Results written to: {}", args.output.display());

    Ok(())
}

/// Translate CLI flags into a validated [`RepairConfig`].
fn build_config(args: &Args) -> Result<RepairConfig> {
    let kinds: Vec<SensorKind> = if args.audit_humidity {
        SensorKind::ALL.to_vec()
    } else {
        vec![SensorKind::Temperature]
    };

    Ok(RepairConfig::builder()
        .n_neighbors(args.neighbors)
        .reference_period_hours(args.reference_hours)
        .limit_time_minutes(args.limit_time)
        .limit_percentage(args.limit_percentage)
        .loss_window(args.loss_window.into())
        .audited_kinds(kinds)
        .zero_is_missing(!args.keep_zeros)
        .build()?)
}

fn build_pipeline(args: &Args, config: RepairConfig) -> Result<MappingPipeline> {
    let mut builder = MappingPipeline::builder().config(config);

    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            debug!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }

    Ok(builder.build()?)
}

/// Rooms to analyse: every row of `--plan`, one ad-hoc room, or none (whole input).
fn load_plans(args: &Args) -> Result<Vec<RoomPlan>> {
    if let Some(path) = &args.plan {
        info!("Loading mapping plan from: {}", path.display());
        let df = read_csv(path)?;
        let plans = plans_from_dataframe(&df)?;
        if plans.is_empty() {
            bail!("Mapping plan {} contains no usable rooms", path.display());
        }
        return Ok(plans);
    }

    let (Some(start), Some(stop)) = (args.sensor_start, args.sensor_stop) else {
        if !args.add.is_empty() || !args.exclude.is_empty() || args.from.is_some() {
            warn!("--add/--exclude/--from/--to need --sensor-start and --sensor-stop; ignoring");
        }
        return Ok(Vec::new());
    };

    let window = match (&args.from, &args.to) {
        (Some(from), Some(to)) => Some(TimeWindow::parse(from, to)?),
        _ => None,
    };

    Ok(vec![RoomPlan {
        room_number: args.room_number.clone(),
        room_name: args.room_name.clone(),
        window,
        selection: SensorSelection::range(start, stop)
            .with_additional(args.add.iter().copied())
            .with_excluded(args.exclude.iter().copied()),
    }])
}

/// Expand directories into the `.csv` files they contain.
fn collect_input_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
                })
                .collect();
            found.sort();
            debug!("{} CSV file(s) in {}", found.len(), input.display());
            files.extend(found);
        } else if input.exists() {
            files.push(input.clone());
        } else {
            bail!("Input not found: {}", input.display());
        }
    }

    if files.is_empty() {
        bail!("No CSV files found in the given inputs");
    }
    Ok(files)
}

fn read_csv(path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
}

/// Read every input file and merge them into one time-ordered matrix.
fn load_matrix(
    paths: &[PathBuf],
    timestamp_column: &str,
    naming: &SensorNaming,
) -> mapping_processing::error::Result<SensorMatrix> {
    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        info!("Loading sensor data from: {}", path.display());
        let df = read_csv(path)?;
        debug!("{} loaded: {:?}", path.display(), df.shape());
        parts.push(from_dataframe(&df, Some(timestamp_column), naming)?);
    }
    SensorMatrix::merge(parts)
}

/// Write the repaired matrix, the statistics table and optionally the JSON
/// report for one run.
fn write_outputs(output: &MappingOutput, stem: &str, args: &Args) -> Result<()> {
    let mut processed = to_dataframe(&output.repaired, &args.timestamp_column)?;
    let processed_path = args.output.join(format!("{stem}_processed_data.csv"));
    write_csv(&mut processed, &processed_path)?;
    info!("Processed data written to: {}", processed_path.display());

    if !output.result.statistics.is_empty() {
        let mut stats = statistics_to_dataframe(&output.result.statistics)?;
        let stats_path = args.output.join(format!("{stem}_statistic_report.csv"));
        write_csv(&mut stats, &stats_path)?;
        info!("Statistics written to: {}", stats_path.display());
    }

    if args.emit_report {
        let report_path = args.output.join(format!("{stem}_report.json"));
        std::fs::write(&report_path, serde_json::to_string_pretty(&output.report)?)?;
        info!("Report written to: {}", report_path.display());
    }

    for warning in &output.result.gap_report.warnings {
        warn!("{}", warning);
    }

    Ok(())
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;
    Ok(())
}

/// Extract the file stem (name without extension) from a path.
fn extract_file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}
