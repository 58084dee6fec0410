//! Datalens CLI Module
//!
//! Command-line interface over the analysis engine. Results are printed to
//! stdout as JSON; progress lines go to stderr.

use clap::{Parser, Subcommand};
use colored::*;
use serde_json::{json, Value as JsonValue};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::anomaly::ANOMALY_COLUMN;
use crate::config::EngineConfig;
use crate::data::{ColumnValues, ProcessedDataset};
use crate::engine::AnalysisEngine;
use crate::timeseries::Frequency;

/// Feature importances listed by `predict`
const TOP_FEATURES: usize = 10;
/// Rows shown in the profile preview
const PREVIEW_ROWS: usize = 5;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn step_run(msg: &str) {
    eprint!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    eprintln!("{} {}", ok("done"), dim(detail));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "datalens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Profile, clean and analyse tabular data files")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON engine config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clean a file and report column types, cleaning counts and summary statistics
    Profile {
        /// Input data file (CSV, XLS or XLSX)
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Generate insight statements
    Insights {
        #[arg(short, long)]
        data: PathBuf,

        /// Run anomaly detection first so the anomaly rule can fire
        #[arg(long)]
        with_anomalies: bool,
    },

    /// Train a predictor for a target column and report held-out metrics
    Predict {
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name (after normalization)
        #[arg(short, long)]
        target: String,
    },

    /// Forecast future values of a numeric column
    Forecast {
        #[arg(short, long)]
        data: PathBuf,

        /// Date column name
        #[arg(long)]
        date: String,

        /// Value column name
        #[arg(long)]
        value: String,

        /// Number of future periods
        #[arg(short, long)]
        periods: Option<usize>,

        /// Period frequency (H, D, W, M, Q, Y)
        #[arg(short, long)]
        frequency: Option<String>,
    },

    /// Flag anomalous rows
    Anomalies {
        #[arg(short, long)]
        data: PathBuf,

        /// Expected fraction of anomalies, within [0, 0.5]
        #[arg(short, long)]
        contamination: Option<f64>,
    },

    /// Category and date pivot tables
    Pivots {
        #[arg(short, long)]
        data: PathBuf,
    },
}

impl Commands {
    fn data_path(&self) -> &Path {
        match self {
            Commands::Profile { data }
            | Commands::Insights { data, .. }
            | Commands::Predict { data, .. }
            | Commands::Forecast { data, .. }
            | Commands::Anomalies { data, .. }
            | Commands::Pivots { data } => data,
        }
    }
}

// ─── Data loading ──────────────────────────────────────────────────────────────

/// Engine from an optional config file, or defaults
pub fn build_engine(config_path: Option<&Path>) -> anyhow::Result<AnalysisEngine> {
    let config = match config_path {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    Ok(AnalysisEngine::new(config)?)
}

pub fn load_processed(engine: &AnalysisEngine, path: &Path) -> anyhow::Result<ProcessedDataset> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("not a file path: {}", path.display()))?;

    step_run("Loading data");
    let start = Instant::now();
    let bytes = std::fs::read(path)?;
    let processed = engine.process_dataset(&bytes, file_name)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        processed.dataset.n_rows(),
        processed.dataset.n_cols(),
        start.elapsed()
    ));
    Ok(processed)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Run a command and return its JSON report
pub fn execute(engine: &AnalysisEngine, command: &Commands) -> anyhow::Result<JsonValue> {
    let processed = load_processed(engine, command.data_path())?;

    match command {
        Commands::Profile { .. } => cmd_profile(engine, &processed),
        Commands::Insights { with_anomalies, .. } => cmd_insights(engine, &processed, *with_anomalies),
        Commands::Predict { target, .. } => cmd_predict(engine, &processed, target),
        Commands::Forecast {
            date,
            value,
            periods,
            frequency,
            ..
        } => {
            let frequency = frequency.as_deref().map(str::parse::<Frequency>).transpose()?;
            cmd_forecast(engine, &processed, date, value, *periods, frequency)
        }
        Commands::Anomalies { contamination, .. } => cmd_anomalies(engine, &processed, *contamination),
        Commands::Pivots { .. } => Ok(json!({ "pivots": engine.pivot_tables(&processed) })),
    }
}

pub fn cmd_profile(engine: &AnalysisEngine, processed: &ProcessedDataset) -> anyhow::Result<JsonValue> {
    let dataset = &processed.dataset;
    Ok(json!({
        "rows": dataset.n_rows(),
        "columns": dataset.column_names(),
        "numeric_columns": processed.numeric_columns(),
        "categorical_columns": processed.categorical_columns(),
        "date_columns": processed.date_columns(),
        "cleaning": processed.stats,
        "summary": engine.summary_statistics(processed),
        "preview": dataset.records(0..PREVIEW_ROWS),
    }))
}

pub fn cmd_insights(
    engine: &AnalysisEngine,
    processed: &ProcessedDataset,
    with_anomalies: bool,
) -> anyhow::Result<JsonValue> {
    let dataset = if with_anomalies {
        engine.detect_anomalies(processed.dataset.clone(), processed.numeric_columns(), None)?
    } else {
        processed.dataset.clone()
    };

    let insights = engine.generate_insights(&dataset, processed.numeric_columns(), processed.date_columns());
    Ok(json!({ "insights": insights }))
}

pub fn cmd_predict(engine: &AnalysisEngine, processed: &ProcessedDataset, target: &str) -> anyhow::Result<JsonValue> {
    step_run(&format!("Training predictor for {}", target.cyan()));
    let (trained, metrics) = engine.train_predictor(&processed.dataset, target)?;
    step_done(&format!("{:.3}s", metrics.training_time_secs));

    let importances: Vec<JsonValue> = trained
        .feature_importances()
        .into_iter()
        .take(TOP_FEATURES)
        .map(|(feature, importance)| json!({ "feature": feature, "importance": importance }))
        .collect();

    Ok(json!({
        "target": trained.target(),
        "metrics": metrics,
        "classes": trained.classes(),
        "feature_importances": importances,
    }))
}

pub fn cmd_forecast(
    engine: &AnalysisEngine,
    processed: &ProcessedDataset,
    date_col: &str,
    value_col: &str,
    periods: Option<usize>,
    frequency: Option<Frequency>,
) -> anyhow::Result<JsonValue> {
    step_run("Forecasting");
    let forecast = engine.forecast_series(&processed.dataset, date_col, value_col, periods, frequency)?;

    match forecast {
        Some(forecast) => {
            step_done(&format!("{} periods", forecast.len()));
            Ok(json!({ "forecast": forecast.points, "frequency": forecast.frequency }))
        }
        None => {
            step_done("series too short");
            Ok(json!({ "forecast": JsonValue::Null, "message": "Not enough history to forecast" }))
        }
    }
}

pub fn cmd_anomalies(
    engine: &AnalysisEngine,
    processed: &ProcessedDataset,
    contamination: Option<f64>,
) -> anyhow::Result<JsonValue> {
    let flagged = engine.detect_anomalies(processed.dataset.clone(), processed.numeric_columns(), contamination)?;

    let anomalous_rows: Vec<usize> = match flagged.column(ANOMALY_COLUMN).map(|c| c.values()) {
        Some(ColumnValues::Boolean(flags)) => flags
            .iter()
            .enumerate()
            .filter(|(_, f)| **f == Some(true))
            .map(|(row, _)| row)
            .collect(),
        _ => Vec::new(),
    };

    Ok(json!({
        "rows": flagged.n_rows(),
        "anomalies": anomalous_rows.len(),
        "anomalous_rows": flagged.records(anomalous_rows.iter().copied()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Day,Units,Store").unwrap();
        for i in 0..30 {
            writeln!(file, "2024-02-{:02},{},{}", (i % 28) + 1, 10 + i, if i % 2 == 0 { "A" } else { "B" }).unwrap();
        }
        file
    }

    fn engine() -> AnalysisEngine {
        AnalysisEngine::new(EngineConfig::default().with_n_estimators(10)).unwrap()
    }

    #[test]
    fn test_cli_parses_forecast() {
        let cli = Cli::try_parse_from([
            "datalens", "forecast", "-d", "sales.csv", "--date", "day", "--value", "units", "-p", "7", "-f", "W",
        ])
        .unwrap();
        match cli.command {
            Commands::Forecast { periods, frequency, .. } => {
                assert_eq!(periods, Some(7));
                assert_eq!(frequency.as_deref(), Some("W"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_profile_report() {
        let file = csv_file();
        let report = execute(
            &engine(),
            &Commands::Profile {
                data: file.path().to_path_buf(),
            },
        )
        .unwrap();

        assert_eq!(report["rows"], 30);
        assert_eq!(report["date_columns"][0], "day");
        assert_eq!(report["summary"][0]["column"], "units");
        assert_eq!(report["preview"].as_array().map(Vec::len), Some(5));
    }

    #[test]
    fn test_forecast_report() {
        let file = csv_file();
        let report = execute(
            &engine(),
            &Commands::Forecast {
                data: file.path().to_path_buf(),
                date: "day".into(),
                value: "units".into(),
                periods: Some(3),
                frequency: Some("D".into()),
            },
        )
        .unwrap();
        assert_eq!(report["forecast"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_bad_frequency_is_an_error() {
        let file = csv_file();
        let result = execute(
            &engine(),
            &Commands::Forecast {
                data: file.path().to_path_buf(),
                date: "day".into(),
                value: "units".into(),
                periods: None,
                frequency: Some("fortnight".into()),
            },
        );
        assert!(result.is_err());
    }
}
